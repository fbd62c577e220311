//! Decoded server-sent events.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event types that mark the logical end of a provider stream.
pub const FINAL_EVENT_TYPES: &[&str] = &[
    "done",
    "response.completed",
    "response.failed",
    "response.incomplete",
    "error",
];

/// Payload of a decoded SSE frame: a JSON object, or the raw text of anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventData {
    Json(Map<String, Value>),
    Text(String),
}

/// One decoded SSE frame, in wire arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
    pub is_final: bool,
}

impl StreamEvent {
    pub fn new(event_type: impl Into<String>, data: EventData) -> Self {
        let event_type = event_type.into();
        let is_final = FINAL_EVENT_TYPES.contains(&event_type.as_str());
        Self {
            event_type,
            data,
            is_final,
        }
    }

    /// Terminal marker emitted for a `[DONE]` payload.
    pub fn done() -> Self {
        Self::new("done", EventData::Text("[DONE]".to_string()))
    }

    pub fn json(&self) -> Option<&Map<String, Value>> {
        match &self.data {
            EventData::Json(map) => Some(map),
            EventData::Text(_) => None,
        }
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.json().and_then(|m| m.get(key))
    }

    /// Incremental text carried by this event, if any.
    ///
    /// Understands both `response.output_text.delta` events and chat completion chunks
    /// (`choices[0].delta.content`).
    pub fn text_delta(&self) -> Option<&str> {
        if self.event_type == "response.output_text.delta" {
            return self.field("delta").and_then(Value::as_str);
        }
        self.field("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("delta"))
            .and_then(|d| d.get("content"))
            .and_then(Value::as_str)
    }
}

//! Unified response endpoint (`/responses`).

use super::chat::DEFAULT_CHAT_MODEL;
use super::{copy_metadata, json_object, missing_field, model_or, str_of, unexpected_input};
use super::{Adapter, WireRequest};
use crate::types::{Endpoint, ResponseEnvelope, ResponseStatus, TurnInput, WireResponse};
use crate::Result;
use serde_json::{Map, Value};

const METADATA_KEYS: &[&str] = &[
    "model",
    "usage",
    "previous_response_id",
    "created_at",
    "incomplete_details",
    "error",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct UnifiedResponseAdapter;

impl Adapter for UnifiedResponseAdapter {
    fn endpoint(&self) -> Endpoint {
        Endpoint::UnifiedResponse
    }

    fn transform_request(&self, input: &TurnInput) -> Result<WireRequest> {
        let TurnInput::Response(turn) = input else {
            return Err(unexpected_input(self.endpoint(), input));
        };
        if turn.input.is_none() && turn.instructions.is_none() {
            return Err(missing_field(
                self.endpoint(),
                "input",
                "a response turn needs `input` or `instructions`",
            ));
        }

        let mut body = Map::new();
        body.insert("model".into(), Value::String(model_or(&turn.model, DEFAULT_CHAT_MODEL)));
        // The endpoint requires `input`; instructions-only turns send an empty one.
        body.insert(
            "input".into(),
            turn.input.clone().unwrap_or_else(|| Value::String(String::new())),
        );
        if let Some(instructions) = &turn.instructions {
            body.insert("instructions".into(), Value::String(instructions.clone()));
        }
        if let Some(tools) = &turn.tools {
            body.insert("tools".into(), tools.clone());
        }
        for (k, v) in &turn.options {
            body.entry(k.clone()).or_insert_with(|| v.clone());
        }
        Ok(WireRequest::Json(Value::Object(body)))
    }

    fn transform_response(&self, wire: WireResponse) -> Result<ResponseEnvelope> {
        let body = json_object(self.endpoint(), &wire)?;
        let output = body.get("output").and_then(Value::as_array);

        let text = match str_of(body, "output_text") {
            Some(text) => text,
            None => output
                .map(|items| {
                    items
                        .iter()
                        .filter(|item| item.get("type").and_then(Value::as_str) == Some("message"))
                        .filter_map(|item| item.get("content").and_then(Value::as_array))
                        .flatten()
                        .filter(|part| {
                            part.get("type").and_then(Value::as_str) == Some("output_text")
                        })
                        .filter_map(|part| part.get("text").and_then(Value::as_str))
                        .collect::<String>()
                })
                .unwrap_or_default(),
        };

        let tool_calls: Vec<Value> = output
            .map(|items| {
                items
                    .iter()
                    .filter(|item| {
                        item.get("type").and_then(Value::as_str) == Some("function_call")
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let status = str_of(body, "status")
            .map(|s| ResponseStatus::parse(&s))
            .unwrap_or(ResponseStatus::Completed);

        let mut metadata = Map::new();
        copy_metadata(&mut metadata, body, METADATA_KEYS);
        metadata.insert(
            "tool_calls".into(),
            if tool_calls.is_empty() {
                Value::Null
            } else {
                Value::Array(tool_calls)
            },
        );

        let id = str_of(body, "id").unwrap_or_default();
        Ok(ResponseEnvelope::with_text(
            self.endpoint(),
            id,
            status,
            text,
            metadata,
            wire,
        ))
    }

    fn supports_streaming(&self) -> bool {
        true
    }
}

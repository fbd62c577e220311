//! Chat-completion endpoint (`/chat/completions`).

use super::{copy_metadata, json_object, missing_field, model_or, str_of, unexpected_input};
use super::{Adapter, WireRequest};
use crate::types::{Endpoint, ResponseEnvelope, ResponseStatus, StreamEvent, TurnInput, WireResponse};
use crate::Result;
use serde_json::{json, Map, Value};

pub(crate) const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

const METADATA_KEYS: &[&str] = &["model", "finish_reason", "usage", "tool_calls", "created"];

#[derive(Debug, Clone, Copy, Default)]
pub struct ChatCompletionAdapter;

impl Adapter for ChatCompletionAdapter {
    fn endpoint(&self) -> Endpoint {
        Endpoint::ChatCompletion
    }

    fn transform_request(&self, input: &TurnInput) -> Result<WireRequest> {
        let TurnInput::Chat(chat) = input else {
            return Err(unexpected_input(self.endpoint(), input));
        };

        let mut messages = Vec::with_capacity(chat.messages.len() + 1);
        if let Some(instructions) = &chat.instructions {
            messages.push(json!({"role": "system", "content": instructions}));
        }
        for (i, message) in chat.messages.iter().enumerate() {
            let has_role = message
                .get("role")
                .and_then(Value::as_str)
                .map(|r| !r.is_empty())
                .unwrap_or(false);
            if !has_role {
                return Err(missing_field(
                    self.endpoint(),
                    &format!("messages[{}].role", i),
                    "every chat message needs a `role`",
                ));
            }
            messages.push(message.clone());
        }
        if chat.messages.is_empty() {
            return Err(missing_field(
                self.endpoint(),
                "messages",
                "chat completion requires at least one message",
            ));
        }

        let mut body = Map::new();
        body.insert("model".into(), Value::String(model_or(&chat.model, DEFAULT_CHAT_MODEL)));
        body.insert("messages".into(), Value::Array(messages));
        for (k, v) in &chat.options {
            body.entry(k.clone()).or_insert_with(|| v.clone());
        }
        Ok(WireRequest::Json(Value::Object(body)))
    }

    fn transform_response(&self, wire: WireResponse) -> Result<ResponseEnvelope> {
        let body = json_object(self.endpoint(), &wire)?;
        let choice = body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(Value::as_object);
        let message = choice.and_then(|c| c.get("message"));

        let text = message
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .or_else(|| {
                message
                    .and_then(|m| m.get("audio"))
                    .and_then(|a| a.get("transcript"))
                    .and_then(Value::as_str)
            })
            .unwrap_or_default()
            .to_string();

        let finish_reason = choice.and_then(|c| c.get("finish_reason")).cloned();
        let status = match finish_reason.as_ref().and_then(Value::as_str) {
            Some("length") | Some("content_filter") => ResponseStatus::Incomplete,
            _ => ResponseStatus::Completed,
        };

        let mut flat = body.clone();
        flat.insert("finish_reason".into(), finish_reason.unwrap_or(Value::Null));
        flat.insert(
            "tool_calls".into(),
            message
                .and_then(|m| m.get("tool_calls"))
                .cloned()
                .unwrap_or(Value::Null),
        );
        let mut metadata = Map::new();
        copy_metadata(&mut metadata, &flat, METADATA_KEYS);

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

    /// Chunks arrive as untyped `data:` frames; label them so consumers can tell them apart.
    fn transform_stream_event(&self, event: StreamEvent) -> StreamEvent {
        if event.event_type != "message" {
            return event;
        }
        let finished = event
            .field("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("finish_reason"))
            .map(|r| !r.is_null())
            .unwrap_or(false);
        let event_type = if finished {
            "chat.completion.finish"
        } else {
            "chat.completion.chunk"
        };
        StreamEvent::new(event_type, event.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatInput, EventData};
    use crate::Error;

    fn input(messages: Vec<Value>) -> TurnInput {
        TurnInput::Chat(ChatInput {
            messages,
            instructions: Some("be terse".into()),
            options: [("temperature".to_string(), json!(0.2))].into_iter().collect(),
            ..Default::default()
        })
    }

    #[test]
    fn request_prepends_instructions_and_defaults_model() {
        let wire = ChatCompletionAdapter
            .transform_request(&input(vec![json!({"role": "user", "content": "hi"})]))
            .unwrap();
        let body = wire.as_json().unwrap();
        assert_eq!(body["model"], DEFAULT_CHAT_MODEL);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["temperature"], json!(0.2));
    }

    #[test]
    fn request_rejects_roleless_and_empty_conversations() {
        let err = ChatCompletionAdapter
            .transform_request(&input(vec![json!({"content": "hi"})]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest { .. }));
        assert!(ChatCompletionAdapter.transform_request(&input(vec![])).is_err());
    }

    #[test]
    fn response_reads_audio_transcript_and_length_cutoff() {
        let raw = json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o-audio-preview",
            "choices": [{
                "message": {"role": "assistant", "content": null, "audio": {"transcript": "hey"}},
                "finish_reason": "length"
            }]
        });
        let env = ChatCompletionAdapter
            .transform_response(WireResponse::Json(raw.clone()))
            .unwrap();
        assert_eq!(env.id(), "chatcmpl-1");
        assert_eq!(env.text(), Some("hey"));
        assert_eq!(env.status(), &ResponseStatus::Incomplete);
        assert_eq!(env.metadata()["usage"], Value::Null);
        assert_eq!(env.raw(), &WireResponse::Json(raw));
    }

    #[test]
    fn stream_chunks_are_labelled() {
        let data = match json!({"choices": [{"delta": {"content": "a"}, "finish_reason": null}]}) {
            Value::Object(m) => EventData::Json(m),
            _ => unreachable!(),
        };
        let event = ChatCompletionAdapter.transform_stream_event(StreamEvent::new("message", data));
        assert_eq!(event.event_type, "chat.completion.chunk");
        assert_eq!(event.text_delta(), Some("a"));
    }
}

//! Shape predicates over unified requests.

use crate::types::request::is_populated;
use crate::types::{Endpoint, UnifiedRequest};
use crate::{Error, ErrorContext, Result};
use serde_json::Value;

const AUDIO_PART_TYPES: &[&str] = &["input_audio", "audio"];

/// An `audio` object whose action is explicit or inferable from `file` / `text`.
///
/// Output settings alone (`{voice, format}`) belong to a conversational turn and do not count.
pub(super) fn is_standalone_audio(request: &UnifiedRequest) -> bool {
    ["action", "file", "text", "input"]
        .iter()
        .any(|k| audio_has(request, k))
}

fn audio_has(request: &UnifiedRequest, key: &str) -> bool {
    request
        .object("audio")
        .and_then(|a| a.get(key))
        .map(is_populated)
        .unwrap_or(false)
}

pub(super) fn is_standalone_image(request: &UnifiedRequest) -> bool {
    request.has("image") && request.object("image").is_some()
}

/// Audio embedded in `messages`, or in a chat-style `message` / `input` (single message or array).
pub(super) fn is_conversational_audio(request: &UnifiedRequest) -> bool {
    conversation_items(request).any(message_has_audio)
}

pub(super) fn is_structured_input(request: &UnifiedRequest) -> bool {
    match request.get("input") {
        Some(item @ Value::Object(_)) => structured_item(item),
        Some(Value::Array(items)) => !items.is_empty() && items.iter().all(structured_item),
        _ => false,
    }
}

pub(super) fn is_text(request: &UnifiedRequest) -> bool {
    ["message", "messages", "input", "instructions"]
        .iter()
        .any(|k| request.has(k))
}

fn conversation_items(request: &UnifiedRequest) -> impl Iterator<Item = &Value> {
    ["messages", "message", "input"]
        .into_iter()
        .filter_map(move |k| request.get(k))
        .flat_map(|v| match v {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            Value::Object(_) => vec![v],
            _ => Vec::new(),
        })
}

/// `{role, content[]}` with a non-empty content array.
pub fn structured_item(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    obj.get("role").and_then(Value::as_str).is_some()
        && obj
            .get("content")
            .and_then(Value::as_array)
            .map(|c| !c.is_empty())
            .unwrap_or(false)
}

/// Whether a chat-style message carries audio content, in any role.
pub fn message_has_audio(message: &Value) -> bool {
    let Some(obj) = message.as_object() else {
        return false;
    };
    if obj.get("audio").map(is_populated).unwrap_or(false) {
        return true;
    }
    obj.get("content")
        .and_then(Value::as_array)
        .map(|parts| {
            parts.iter().any(|part| {
                let typed = part
                    .get("type")
                    .and_then(Value::as_str)
                    .map(|t| AUDIO_PART_TYPES.contains(&t))
                    .unwrap_or(false);
                typed
                    || AUDIO_PART_TYPES
                        .iter()
                        .any(|k| part.get(*k).map(is_populated).unwrap_or(false))
            })
        })
        .unwrap_or(false)
}

/// Resolve `audio.action` to an endpoint.
///
/// Without an explicit action, a `file` means transcription and text means speech.
pub(super) fn audio_endpoint(request: &UnifiedRequest) -> Result<Endpoint> {
    let action = request
        .object("audio")
        .and_then(|a| a.get("action"))
        .and_then(Value::as_str);
    let has = |key: &str| audio_has(request, key);

    match action.map(|a| a.trim().to_ascii_lowercase()).as_deref() {
        Some("transcribe") | Some("transcription") => Ok(Endpoint::AudioTranscription),
        Some("translate") | Some("translation") => Ok(Endpoint::AudioTranslation),
        Some("speech") | Some("speak") | Some("tts") => Ok(Endpoint::AudioSpeech),
        Some(other) => Err(Error::invalid_request_with_context(
            format!(
                "unsupported audio action '{}'; expected transcribe, translate or speech",
                other
            ),
            ErrorContext::new()
                .with_field_path("audio.action")
                .with_source("router"),
        )),
        None if has("file") => Ok(Endpoint::AudioTranscription),
        None if has("text") || has("input") => Ok(Endpoint::AudioSpeech),
        None => Err(Error::invalid_request_with_context(
            "audio config needs an `action`, a `file` to transcribe, or `text` to speak",
            ErrorContext::new()
                .with_field_path("audio")
                .with_source("router"),
        )),
    }
}

/// `prompt` only → generation, `image` + `prompt` → edit, `image` only → variation.
pub(super) fn image_endpoint(request: &UnifiedRequest) -> Result<Endpoint> {
    let image = request.object("image");
    let has = |key: &str| {
        image
            .and_then(|i| i.get(key))
            .map(is_populated)
            .unwrap_or(false)
    };

    match (has("prompt"), has("image")) {
        (true, false) => Ok(Endpoint::ImageGeneration),
        (true, true) => Ok(Endpoint::ImageEdit),
        (false, true) => Ok(Endpoint::ImageVariation),
        (false, false) => Err(Error::invalid_request_with_context(
            "image config needs a `prompt`, an `image`, or both",
            ErrorContext::new()
                .with_field_path("image")
                .with_source("router"),
        )),
    }
}

//! Conversion of a routed unified request into typed endpoint input.
//!
//! Only type mismatches are rejected here (a number where a string belongs, ...). Missing required
//! values are left for the adapter, which owns the endpoint's validation rules.

use super::{Route, Shape};
use crate::types::request::{is_populated, json_type_name};
use crate::types::{
    ChatInput, Endpoint, ImageEditInput, ImageGenerationInput, ImageVariationInput, ResponseInput,
    SpeechInput, TranscriptionInput, TranslationInput, TurnInput, UnifiedRequest,
};
use crate::{Error, ErrorContext, Result};
use serde_json::{json, Map, Value};
use std::path::PathBuf;

const CHAT_OPTIONS: &[&str] = &[
    "temperature",
    "top_p",
    "max_tokens",
    "max_completion_tokens",
    "stop",
    "seed",
    "presence_penalty",
    "frequency_penalty",
    "tools",
    "tool_choice",
    "parallel_tool_calls",
    "response_format",
    "modalities",
    "audio",
    "user",
];

const RESPONSE_OPTIONS: &[&str] = &[
    "temperature",
    "top_p",
    "max_output_tokens",
    "tool_choice",
    "parallel_tool_calls",
    "previous_response_id",
    "metadata",
    "reasoning",
    "text",
    "store",
    "truncation",
    "include",
    "user",
];

pub(super) fn turn_input(route: &Route, request: &UnifiedRequest) -> Result<TurnInput> {
    let input = match route.endpoint {
        Endpoint::ChatCompletion => TurnInput::Chat(chat(request)?),
        Endpoint::UnifiedResponse => {
            TurnInput::Response(response(request, route.shape == Shape::StructuredInput)?)
        }
        Endpoint::AudioTranscription => TurnInput::Transcription(transcription(request)?),
        Endpoint::AudioTranslation => TurnInput::Translation(translation(request)?),
        Endpoint::AudioSpeech => TurnInput::Speech(speech(request)?),
        Endpoint::ImageGeneration => TurnInput::ImageGeneration(image_generation(request)?),
        Endpoint::ImageEdit => TurnInput::ImageEdit(image_edit(request)?),
        Endpoint::ImageVariation => TurnInput::ImageVariation(image_variation(request)?),
    };
    Ok(input)
}

/// Chat turns gather every conversation key, in `messages`, `message`, `input` order, so audio
/// found in any of them reaches the wire.
fn chat(request: &UnifiedRequest) -> Result<ChatInput> {
    let messages = ["messages", "message", "input"]
        .iter()
        .filter(|k| request.has(k))
        .filter_map(|k| request.get(k))
        .flat_map(|v| match v {
            Value::Array(items) => items.clone(),
            Value::String(text) => vec![json!({"role": "user", "content": text})],
            other => vec![other.clone()],
        })
        .collect();
    Ok(ChatInput {
        model: string(request.fields(), "model", "model")?,
        messages,
        instructions: string(request.fields(), "instructions", "instructions")?,
        options: pick(request, CHAT_OPTIONS),
    })
}

fn response(request: &UnifiedRequest, image_input: bool) -> Result<ResponseInput> {
    let input = if request.has("input") {
        request.get("input").cloned()
    } else {
        match conversation(request) {
            Some(item @ Value::Object(_)) => Some(Value::Array(vec![item])),
            other => other,
        }
    };

    let mut options = pick(request, RESPONSE_OPTIONS);
    if !options.contains_key("max_output_tokens") {
        if let Some(max) = request.get("max_tokens").filter(|v| is_populated(v)) {
            options.insert("max_output_tokens".into(), max.clone());
        }
    }

    Ok(ResponseInput {
        model: string(request.fields(), "model", "model")?,
        input,
        instructions: string(request.fields(), "instructions", "instructions")?,
        tools: request.get("tools").filter(|v| is_populated(v)).cloned(),
        image_input,
        options,
    })
}

/// The conversation carried by `messages`, `message` or `input`, first populated wins.
fn conversation(request: &UnifiedRequest) -> Option<Value> {
    ["messages", "message", "input"]
        .iter()
        .find(|k| request.has(k))
        .and_then(|k| request.get(k))
        .cloned()
}

fn audio_config(request: &UnifiedRequest) -> Map<String, Value> {
    request.object("audio").cloned().unwrap_or_default()
}

fn image_config(request: &UnifiedRequest) -> Map<String, Value> {
    request.object("image").cloned().unwrap_or_default()
}

fn transcription(request: &UnifiedRequest) -> Result<TranscriptionInput> {
    let audio = audio_config(request);
    Ok(TranscriptionInput {
        file: path(&audio, "file", "audio.file")?,
        model: string(&audio, "model", "audio.model")?,
        language: string(&audio, "language", "audio.language")?,
        prompt: string(&audio, "prompt", "audio.prompt")?,
        response_format: string(&audio, "response_format", "audio.response_format")?,
        temperature: number(&audio, "temperature", "audio.temperature")?,
    })
}

fn translation(request: &UnifiedRequest) -> Result<TranslationInput> {
    let audio = audio_config(request);
    Ok(TranslationInput {
        file: path(&audio, "file", "audio.file")?,
        model: string(&audio, "model", "audio.model")?,
        prompt: string(&audio, "prompt", "audio.prompt")?,
        response_format: string(&audio, "response_format", "audio.response_format")?,
        temperature: number(&audio, "temperature", "audio.temperature")?,
    })
}

fn speech(request: &UnifiedRequest) -> Result<SpeechInput> {
    let audio = audio_config(request);
    let text = match string(&audio, "text", "audio.text")? {
        Some(t) => Some(t),
        None => match string(&audio, "input", "audio.input")? {
            Some(t) => Some(t),
            None => request
                .str_field("message")
                .or_else(|| request.str_field("input"))
                .map(str::to_string),
        },
    };
    Ok(SpeechInput {
        text,
        model: string(&audio, "model", "audio.model")?,
        voice: string(&audio, "voice", "audio.voice")?,
        response_format: string(&audio, "response_format", "audio.response_format")?,
        speed: number(&audio, "speed", "audio.speed")?,
    })
}

fn image_generation(request: &UnifiedRequest) -> Result<ImageGenerationInput> {
    let image = image_config(request);
    Ok(ImageGenerationInput {
        prompt: string(&image, "prompt", "image.prompt")?,
        model: string(&image, "model", "image.model")?,
        n: count(&image, "n", "image.n")?,
        size: string(&image, "size", "image.size")?,
        quality: string(&image, "quality", "image.quality")?,
        style: string(&image, "style", "image.style")?,
        response_format: string(&image, "response_format", "image.response_format")?,
    })
}

fn image_edit(request: &UnifiedRequest) -> Result<ImageEditInput> {
    let image = image_config(request);
    Ok(ImageEditInput {
        image: path(&image, "image", "image.image")?,
        mask: path(&image, "mask", "image.mask")?,
        prompt: string(&image, "prompt", "image.prompt")?,
        model: string(&image, "model", "image.model")?,
        n: count(&image, "n", "image.n")?,
        size: string(&image, "size", "image.size")?,
        response_format: string(&image, "response_format", "image.response_format")?,
    })
}

fn image_variation(request: &UnifiedRequest) -> Result<ImageVariationInput> {
    let image = image_config(request);
    Ok(ImageVariationInput {
        image: path(&image, "image", "image.image")?,
        model: string(&image, "model", "image.model")?,
        n: count(&image, "n", "image.n")?,
        size: string(&image, "size", "image.size")?,
        response_format: string(&image, "response_format", "image.response_format")?,
    })
}

fn pick(request: &UnifiedRequest, keys: &[&str]) -> Map<String, Value> {
    keys.iter()
        .filter_map(|k| {
            request
                .get(k)
                .filter(|v| !v.is_null())
                .map(|v| (k.to_string(), v.clone()))
        })
        .collect()
}

fn type_error(field: &str, expected: &str, got: &Value) -> Error {
    Error::invalid_request_with_context(
        format!("`{}` must be {}, got {}", field, expected, json_type_name(got)),
        ErrorContext::new()
            .with_field_path(field)
            .with_source("router"),
    )
}

fn string(map: &Map<String, Value>, key: &str, field: &str) -> Result<Option<String>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(type_error(field, "a string", other)),
    }
}

fn path(map: &Map<String, Value>, key: &str, field: &str) -> Result<Option<PathBuf>> {
    Ok(string(map, key, field)?.map(PathBuf::from))
}

fn number(map: &Map<String, Value>, key: &str, field: &str) -> Result<Option<f64>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v @ Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| type_error(field, "a number", v)),
        Some(other) => Err(type_error(field, "a number", other)),
    }
}

fn count(map: &Map<String, Value>, key: &str, field: &str) -> Result<Option<u32>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v @ Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| type_error(field, "a non-negative integer", v)),
        Some(other) => Err(type_error(field, "a non-negative integer", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::Router;

    fn classify(v: Value) -> Result<TurnInput> {
        Router::default().classify(&UnifiedRequest::from_value(v).unwrap())
    }

    #[test]
    fn plain_message_becomes_response_input() {
        let TurnInput::Response(input) =
            classify(json!({"message": "hi", "instructions": "be brief", "max_tokens": 64}))
                .unwrap()
        else {
            panic!("expected response input");
        };
        assert_eq!(input.input, Some(json!("hi")));
        assert_eq!(input.instructions.as_deref(), Some("be brief"));
        assert_eq!(input.options["max_output_tokens"], json!(64));
        assert!(!input.image_input);
    }

    #[test]
    fn structured_input_is_tagged_for_images() {
        let TurnInput::Response(input) = classify(json!({
            "input": {"role": "user", "content": [
                {"type": "input_text", "text": "what is this?"},
                {"type": "input_image", "image_url": "https://example.com/cat.png"}
            ]}
        }))
        .unwrap() else {
            panic!("expected response input");
        };
        assert!(input.image_input);
    }

    #[test]
    fn speech_text_falls_back_to_message() {
        let TurnInput::Speech(input) =
            classify(json!({"message": "read me", "audio": {"action": "speech", "voice": "nova"}}))
                .unwrap()
        else {
            panic!("expected speech input");
        };
        assert_eq!(input.text.as_deref(), Some("read me"));
        assert_eq!(input.voice.as_deref(), Some("nova"));
    }

    #[test]
    fn chat_keeps_audio_from_every_conversation_key() {
        let TurnInput::Chat(input) = classify(json!({
            "message": "what does this say?",
            "input": {"role": "user", "content": [
                {"type": "input_audio", "input_audio": {"data": "UklGRg==", "format": "wav"}}
            ]}
        }))
        .unwrap() else {
            panic!("expected chat input");
        };
        assert_eq!(input.messages.len(), 2);
        assert_eq!(input.messages[0]["content"], "what does this say?");
        assert_eq!(input.messages[1]["content"][0]["type"], "input_audio");
    }

    #[test]
    fn chat_audio_output_settings_pass_through() {
        let TurnInput::Chat(input) = classify(json!({
            "messages": [{"role": "user", "content": [
                {"type": "input_audio", "input_audio": {"data": "UklGRg==", "format": "wav"}}
            ]}],
            "audio": {"voice": "alloy", "format": "wav"}
        }))
        .unwrap() else {
            panic!("expected chat input");
        };
        assert_eq!(input.messages.len(), 1);
        assert_eq!(input.options["audio"], json!({"voice": "alloy", "format": "wav"}));
    }

    #[test]
    fn wrong_field_type_is_rejected() {
        let err = classify(json!({"image": {"prompt": "a cat", "n": "two"}})).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("image.n")
        );
    }
}

//! Audio endpoints: transcription, translation (multipart uploads) and speech synthesis (JSON in,
//! binary audio out).

use super::files::{validate_upload, AUDIO_UPLOAD};
use super::{copy_metadata, missing_field, model_or, str_of, unexpected_input};
use super::{Adapter, MultipartBody, WireRequest};
use crate::types::{Endpoint, ResponseEnvelope, ResponseStatus, TurnInput, WireResponse};
use crate::{Error, ErrorContext, Result};
use serde_json::{json, Map, Value};
use std::path::PathBuf;

const WHISPER_MODEL: &str = "whisper-1";
const TRANSCRIPT_FORMAT: &str = "json";
const TRANSCRIPT_FORMATS: &[&str] = &["json", "text", "srt", "verbose_json", "vtt"];
const TRANSCRIPT_METADATA: &[&str] = &["language", "duration", "segments", "words"];

const SPEECH_MODEL: &str = "tts-1";
const SPEECH_VOICE: &str = "alloy";
const SPEECH_FORMAT: &str = "mp3";
const SPEECH_FORMATS: &[&str] = &["mp3", "opus", "aac", "flac", "wav", "pcm"];
const SPEECH_MAX_CHARS: usize = 4096;
const SPEECH_SPEED_RANGE: (f64, f64) = (0.25, 4.0);

/// Fields shared by transcription and translation uploads.
struct TranscriptParams<'a> {
    file: &'a Option<PathBuf>,
    model: &'a Option<String>,
    prompt: &'a Option<String>,
    response_format: &'a Option<String>,
    temperature: Option<f64>,
}

fn transcript_request(endpoint: Endpoint, params: TranscriptParams<'_>) -> Result<MultipartBody> {
    let path = params.file.as_ref().ok_or_else(|| {
        missing_field(endpoint, "audio.file", "an audio `file` is required")
    })?;
    let part = validate_upload("file", path, &AUDIO_UPLOAD)?;

    let format = params
        .response_format
        .clone()
        .unwrap_or_else(|| TRANSCRIPT_FORMAT.to_string());
    if !TRANSCRIPT_FORMATS.contains(&format.as_str()) {
        return Err(missing_field(
            endpoint,
            "audio.response_format",
            &format!(
                "unsupported response_format '{}'; expected one of: {}",
                format,
                TRANSCRIPT_FORMATS.join(", ")
            ),
        ));
    }

    let temperature = params.temperature.unwrap_or(0.0);
    if !(0.0..=1.0).contains(&temperature) {
        return Err(missing_field(
            endpoint,
            "audio.temperature",
            "temperature must be between 0 and 1",
        ));
    }

    Ok(MultipartBody::new()
        .file(part)
        .text("model", model_or(params.model, WHISPER_MODEL))
        .text("response_format", format)
        .text("temperature", temperature.to_string())
        .text_opt("prompt", params.prompt.clone()))
}

/// Transcripts come back as JSON, or as plain text / subtitles for the non-JSON formats.
fn transcript_response(endpoint: Endpoint, wire: WireResponse) -> Result<ResponseEnvelope> {
    let mut metadata = Map::new();
    let (id, text) = match &wire {
        WireResponse::Json(Value::Object(body)) => {
            copy_metadata(&mut metadata, body, TRANSCRIPT_METADATA);
            (
                str_of(body, "id").unwrap_or_default(),
                str_of(body, "text").unwrap_or_default(),
            )
        }
        WireResponse::Json(Value::String(text)) => {
            copy_metadata(&mut metadata, &Map::new(), TRANSCRIPT_METADATA);
            (String::new(), text.clone())
        }
        WireResponse::Json(_) => {
            return Err(Error::decode_with_context(
                "expected a transcript object",
                ErrorContext::new().with_source(endpoint.as_str()),
            ));
        }
        WireResponse::Binary { body, .. } => {
            copy_metadata(&mut metadata, &Map::new(), TRANSCRIPT_METADATA);
            let text = std::str::from_utf8(body).map_err(|e| {
                Error::decode_with_context(
                    format!("transcript is not valid UTF-8: {}", e),
                    ErrorContext::new().with_source(endpoint.as_str()),
                )
            })?;
            (String::new(), text.to_string())
        }
    };
    Ok(ResponseEnvelope::with_text(
        endpoint,
        id,
        ResponseStatus::Completed,
        text,
        metadata,
        wire,
    ))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TranscriptionAdapter;

impl Adapter for TranscriptionAdapter {
    fn endpoint(&self) -> Endpoint {
        Endpoint::AudioTranscription
    }

    fn transform_request(&self, input: &TurnInput) -> Result<WireRequest> {
        let TurnInput::Transcription(audio) = input else {
            return Err(unexpected_input(self.endpoint(), input));
        };
        let body = transcript_request(
            self.endpoint(),
            TranscriptParams {
                file: &audio.file,
                model: &audio.model,
                prompt: &audio.prompt,
                response_format: &audio.response_format,
                temperature: audio.temperature,
            },
        )?
        .text_opt("language", audio.language.clone());
        Ok(WireRequest::Multipart(body))
    }

    fn transform_response(&self, wire: WireResponse) -> Result<ResponseEnvelope> {
        transcript_response(self.endpoint(), wire)
    }
}

/// Translation always produces English text, so there is no `language` field.
#[derive(Debug, Clone, Copy, Default)]
pub struct TranslationAdapter;

impl Adapter for TranslationAdapter {
    fn endpoint(&self) -> Endpoint {
        Endpoint::AudioTranslation
    }

    fn transform_request(&self, input: &TurnInput) -> Result<WireRequest> {
        let TurnInput::Translation(audio) = input else {
            return Err(unexpected_input(self.endpoint(), input));
        };
        let body = transcript_request(
            self.endpoint(),
            TranscriptParams {
                file: &audio.file,
                model: &audio.model,
                prompt: &audio.prompt,
                response_format: &audio.response_format,
                temperature: audio.temperature,
            },
        )?;
        Ok(WireRequest::Multipart(body))
    }

    fn transform_response(&self, wire: WireResponse) -> Result<ResponseEnvelope> {
        transcript_response(self.endpoint(), wire)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SpeechAdapter;

impl Adapter for SpeechAdapter {
    fn endpoint(&self) -> Endpoint {
        Endpoint::AudioSpeech
    }

    fn transform_request(&self, input: &TurnInput) -> Result<WireRequest> {
        let TurnInput::Speech(speech) = input else {
            return Err(unexpected_input(self.endpoint(), input));
        };
        let endpoint = self.endpoint();

        let text = speech
            .text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| missing_field(endpoint, "audio.text", "speech requires `text` to speak"))?;
        let chars = text.chars().count();
        if chars > SPEECH_MAX_CHARS {
            return Err(missing_field(
                endpoint,
                "audio.text",
                &format!(
                    "speech text is limited to {} characters, got {}",
                    SPEECH_MAX_CHARS, chars
                ),
            ));
        }

        let format = speech
            .response_format
            .clone()
            .unwrap_or_else(|| SPEECH_FORMAT.to_string());
        if !SPEECH_FORMATS.contains(&format.as_str()) {
            return Err(missing_field(
                endpoint,
                "audio.response_format",
                &format!(
                    "unsupported speech format '{}'; expected one of: {}",
                    format,
                    SPEECH_FORMATS.join(", ")
                ),
            ));
        }

        let speed = speech.speed.unwrap_or(1.0);
        let (min, max) = SPEECH_SPEED_RANGE;
        if !(min..=max).contains(&speed) {
            return Err(missing_field(
                endpoint,
                "audio.speed",
                &format!("speed must be between {} and {}, got {}", min, max, speed),
            ));
        }

        Ok(WireRequest::Json(json!({
            "model": model_or(&speech.model, SPEECH_MODEL),
            "input": text,
            "voice": model_or(&speech.voice, SPEECH_VOICE),
            "response_format": format,
            "speed": speed,
        })))
    }

    fn transform_response(&self, wire: WireResponse) -> Result<ResponseEnvelope> {
        let (content_type, audio) = match &wire {
            WireResponse::Binary { content_type, body } if !body.is_empty() => {
                (content_type.clone(), body.clone())
            }
            WireResponse::Binary { .. } => {
                return Err(Error::decode_with_context(
                    "speech response body is empty",
                    ErrorContext::new().with_source(self.endpoint().as_str()),
                ));
            }
            WireResponse::Json(_) => {
                return Err(Error::decode_with_context(
                    "expected binary audio, got a JSON body",
                    ErrorContext::new().with_source(self.endpoint().as_str()),
                ));
            }
        };

        let mut metadata = Map::new();
        metadata.insert(
            "content_type".into(),
            content_type.map(Value::String).unwrap_or(Value::Null),
        );
        metadata.insert("size_bytes".into(), json!(audio.len()));

        Ok(ResponseEnvelope::with_audio(
            self.endpoint(),
            String::new(),
            ResponseStatus::Completed,
            audio,
            metadata,
            wire,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SpeechInput, TranscriptionInput, TranslationInput};
    use bytes::Bytes;
    use std::io::Write;

    fn mp3(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("note.mp3");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"ID3\x03\x00\x00\x00\x00\x00\x00").unwrap();
        f.write_all(&[0u8; 3000]).unwrap();
        path
    }

    #[test]
    fn transcription_applies_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let input = TurnInput::Transcription(TranscriptionInput {
            file: Some(mp3(&dir)),
            language: Some("en".into()),
            ..Default::default()
        });
        let wire = TranscriptionAdapter.transform_request(&input).unwrap();
        let body = wire.as_multipart().unwrap();
        assert_eq!(body.field("model"), Some("whisper-1"));
        assert_eq!(body.field("response_format"), Some("json"));
        assert_eq!(body.field("temperature"), Some("0"));
        assert_eq!(body.field("language"), Some("en"));
        assert_eq!(body.field("prompt"), None);
        assert_eq!(body.file_part("file").unwrap().file_name, "note.mp3");
    }

    #[test]
    fn translation_requires_a_file() {
        let err = TranslationAdapter
            .transform_request(&TurnInput::Translation(TranslationInput::default()))
            .unwrap_err();
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("audio.file")
        );
    }

    #[test]
    fn plain_text_transcript_is_passed_through() {
        let env = TranscriptionAdapter
            .transform_response(WireResponse::Binary {
                content_type: Some("text/plain".into()),
                body: Bytes::from_static(b"hello there"),
            })
            .unwrap();
        assert_eq!(env.text(), Some("hello there"));
        assert!(env.id().starts_with("transcription_"));
        assert_eq!(env.metadata()["language"], Value::Null);
    }

    #[test]
    fn speech_validates_text_speed_and_format() {
        let ok = SpeechAdapter
            .transform_request(&TurnInput::Speech(SpeechInput {
                text: Some("hi".into()),
                ..Default::default()
            }))
            .unwrap();
        let body = ok.as_json().unwrap();
        assert_eq!(body["voice"], "alloy");
        assert_eq!(body["response_format"], "mp3");
        assert_eq!(body["speed"], 1.0);

        for bad in [
            SpeechInput::default(),
            SpeechInput {
                text: Some("x".repeat(SPEECH_MAX_CHARS + 1)),
                ..Default::default()
            },
            SpeechInput {
                text: Some("hi".into()),
                speed: Some(5.0),
                ..Default::default()
            },
            SpeechInput {
                text: Some("hi".into()),
                response_format: Some("ogg".into()),
                ..Default::default()
            },
        ] {
            assert!(SpeechAdapter
                .transform_request(&TurnInput::Speech(bad))
                .unwrap_err()
                .is_validation());
        }
    }

    #[test]
    fn speech_response_must_be_binary() {
        let env = SpeechAdapter
            .transform_response(WireResponse::Binary {
                content_type: Some("audio/mpeg".into()),
                body: Bytes::from_static(b"ID3abc"),
            })
            .unwrap();
        assert!(env.is_audio());
        assert_eq!(env.metadata()["size_bytes"], 6);
        assert!(env.id().starts_with("speech_"));

        let err = SpeechAdapter
            .transform_response(WireResponse::Json(json!({"error": "nope"})))
            .unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }
}

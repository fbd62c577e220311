//! Normalized response envelope and the raw wire responses it preserves.

use super::endpoint::EndpointKind;
use base64::Engine as _;
use bytes::Bytes;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// A decoded remote response body.
///
/// JSON bodies are decoded strictly by the transport; anything else (audio bytes, plain-text
/// transcripts, subtitles) is passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WireResponse {
    Json(Value),
    Binary {
        content_type: Option<String>,
        #[serde(serialize_with = "serialize_base64")]
        body: Bytes,
    },
}

impl WireResponse {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            WireResponse::Json(v) => Some(v),
            WireResponse::Binary { .. } => None,
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        match self {
            WireResponse::Json(_) => Some("application/json"),
            WireResponse::Binary { content_type, .. } => content_type.as_deref(),
        }
    }

    /// Stable digest of the body, used to derive placeholder ids.
    pub fn digest_hex(&self) -> String {
        let mut hasher = Sha256::new();
        match self {
            WireResponse::Json(v) => hasher.update(v.to_string().as_bytes()),
            WireResponse::Binary { body, .. } => hasher.update(body),
        }
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

fn serialize_base64<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
}

fn serialize_optional_base64<S: Serializer>(
    bytes: &Option<Bytes>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match bytes {
        Some(b) => serialize_base64(b, serializer),
        None => serializer.serialize_none(),
    }
}

/// Lifecycle status reported in an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseStatus {
    Completed,
    InProgress,
    Incomplete,
    Failed,
    Cancelled,
    Queued,
    Other(String),
}

impl ResponseStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "completed" => Self::Completed,
            "in_progress" => Self::InProgress,
            "incomplete" => Self::Incomplete,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            "queued" => Self::Queued,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Completed => "completed",
            Self::InProgress => "in_progress",
            Self::Incomplete => "incomplete",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Queued => "queued",
            Self::Other(s) => s.as_str(),
        }
    }
}

impl Serialize for ResponseStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One generated image, by URL or inline base64.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b64_json: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revised_prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum Payload {
    Text(String),
    Audio(Bytes),
    Images(Vec<ImageData>),
}

/// Normalized response, identical in shape for every endpoint.
///
/// Exactly one of `text`, `audio_content` and `images` is populated, matching the endpoint kind.
/// The envelope is immutable: `raw` keeps the decoded wire response verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    id: String,
    status: ResponseStatus,
    kind: EndpointKind,
    payload: Payload,
    metadata: Map<String, Value>,
    raw: WireResponse,
}

impl ResponseEnvelope {
    pub fn with_text(
        kind: EndpointKind,
        id: String,
        status: ResponseStatus,
        text: String,
        metadata: Map<String, Value>,
        raw: WireResponse,
    ) -> Self {
        Self::build(kind, id, status, Payload::Text(text), metadata, raw)
    }

    pub fn with_audio(
        kind: EndpointKind,
        id: String,
        status: ResponseStatus,
        audio: Bytes,
        metadata: Map<String, Value>,
        raw: WireResponse,
    ) -> Self {
        Self::build(kind, id, status, Payload::Audio(audio), metadata, raw)
    }

    pub fn with_images(
        kind: EndpointKind,
        id: String,
        status: ResponseStatus,
        images: Vec<ImageData>,
        metadata: Map<String, Value>,
        raw: WireResponse,
    ) -> Self {
        Self::build(kind, id, status, Payload::Images(images), metadata, raw)
    }

    fn build(
        kind: EndpointKind,
        id: String,
        status: ResponseStatus,
        payload: Payload,
        metadata: Map<String, Value>,
        raw: WireResponse,
    ) -> Self {
        let id = if id.trim().is_empty() {
            placeholder_id(kind, &raw)
        } else {
            id
        };
        Self {
            id,
            status,
            kind,
            payload,
            metadata,
            raw,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> &ResponseStatus {
        &self.status
    }

    pub fn kind(&self) -> EndpointKind {
        self.kind
    }

    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn audio_content(&self) -> Option<&Bytes> {
        match &self.payload {
            Payload::Audio(a) => Some(a),
            _ => None,
        }
    }

    pub fn images(&self) -> Option<&[ImageData]> {
        match &self.payload {
            Payload::Images(i) => Some(i),
            _ => None,
        }
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    pub fn raw(&self) -> &WireResponse {
        &self.raw
    }

    pub fn into_raw(self) -> WireResponse {
        self.raw
    }

    /// Attach one metadata entry, overwriting any previous value.
    pub(crate) fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn is_text(&self) -> bool {
        matches!(self.payload, Payload::Text(_))
    }

    pub fn is_audio(&self) -> bool {
        matches!(self.payload, Payload::Audio(_))
    }

    pub fn is_image(&self) -> bool {
        matches!(self.payload, Payload::Images(_))
    }
}

impl Serialize for ResponseEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Repr<'a> {
            id: &'a str,
            status: &'a ResponseStatus,
            #[serde(rename = "type")]
            kind: EndpointKind,
            text: Option<&'a str>,
            #[serde(serialize_with = "serialize_optional_base64")]
            audio_content: Option<Bytes>,
            images: Option<&'a [ImageData]>,
            metadata: &'a Map<String, Value>,
            raw: &'a WireResponse,
        }

        Repr {
            id: &self.id,
            status: &self.status,
            kind: self.kind,
            text: self.text(),
            audio_content: self.audio_content().cloned(),
            images: self.images(),
            metadata: &self.metadata,
            raw: &self.raw,
        }
        .serialize(serializer)
    }
}

/// `<prefix>_<24 hex chars>` derived from the raw body, so the same response always maps to
/// the same id.
pub fn placeholder_id(kind: EndpointKind, raw: &WireResponse) -> String {
    let digest = raw.digest_hex();
    format!("{}_{}", kind.id_prefix(), &digest[..24])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Endpoint;
    use serde_json::json;

    #[test]
    fn missing_id_gets_deterministic_placeholder() {
        let raw = WireResponse::Json(json!({"text": "hello"}));
        let a = ResponseEnvelope::with_text(
            Endpoint::AudioTranscription,
            String::new(),
            ResponseStatus::Completed,
            "hello".into(),
            Map::new(),
            raw.clone(),
        );
        let b = ResponseEnvelope::with_text(
            Endpoint::AudioTranscription,
            String::new(),
            ResponseStatus::Completed,
            "hello".into(),
            Map::new(),
            raw,
        );
        assert!(a.id().starts_with("transcription_"));
        assert_eq!(a.id().len(), "transcription_".len() + 24);
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn serializes_with_type_and_base64_audio() {
        let env = ResponseEnvelope::with_audio(
            Endpoint::AudioSpeech,
            "speech_1".into(),
            ResponseStatus::Completed,
            Bytes::from_static(b"ID3"),
            Map::new(),
            WireResponse::Binary {
                content_type: Some("audio/mpeg".into()),
                body: Bytes::from_static(b"ID3"),
            },
        );
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v["type"], "audio_speech");
        assert_eq!(v["audio_content"], "SUQz");
        assert_eq!(v["text"], Value::Null);
        assert_eq!(v["status"], "completed");
    }
}

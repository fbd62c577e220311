//! Endpoint adapters.
//!
//! Each adapter knows exactly one endpoint's request and response shape. Requests are validated
//! locally (missing fields, upload size/format) so a request the provider would reject never
//! leaves the process; responses are normalized into a [`ResponseEnvelope`] that keeps the wire
//! body verbatim.

mod audio;
mod chat;
pub mod files;
mod image;
mod responses;

pub use audio::{SpeechAdapter, TranscriptionAdapter, TranslationAdapter};
pub use chat::ChatCompletionAdapter;
pub use files::FilePart;
pub use image::{ImageEditAdapter, ImageGenerationAdapter, ImageVariationAdapter};
pub use responses::UnifiedResponseAdapter;

use crate::types::{Endpoint, ResponseEnvelope, StreamEvent, TurnInput, WireResponse};
use crate::{Error, ErrorContext, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Endpoint-specific request payload, built fresh for every call.
#[derive(Debug, Clone, PartialEq)]
pub enum WireRequest {
    Json(Value),
    Multipart(MultipartBody),
}

impl WireRequest {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            WireRequest::Json(v) => Some(v),
            WireRequest::Multipart(_) => None,
        }
    }

    pub fn as_multipart(&self) -> Option<&MultipartBody> {
        match self {
            WireRequest::Multipart(m) => Some(m),
            WireRequest::Json(_) => None,
        }
    }
}

/// Multipart part-set: scalar fields plus files streamed from disk at send time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartBody {
    pub fields: Vec<(String, String)>,
    pub files: Vec<FilePart>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn text_opt(self, name: &str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(v) => self.text(name, v),
            None => self,
        }
    }

    pub fn file(mut self, part: FilePart) -> Self {
        self.files.push(part);
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn file_part(&self, name: &str) -> Option<&FilePart> {
        self.files.iter().find(|f| f.field == name)
    }
}

/// Translation between typed input / wire format for one endpoint.
pub trait Adapter: Send + Sync {
    fn endpoint(&self) -> Endpoint;

    /// Build the wire payload. Never touches the network; fails fast on invalid input.
    fn transform_request(&self, input: &TurnInput) -> Result<WireRequest>;

    /// Normalize a decoded wire response.
    fn transform_response(&self, wire: WireResponse) -> Result<ResponseEnvelope>;

    fn supports_streaming(&self) -> bool {
        false
    }

    /// Build the JSON body for an SSE call (`stream: true`).
    fn transform_stream_request(&self, input: &TurnInput) -> Result<Value> {
        if !self.supports_streaming() {
            return Err(Error::invalid_request_with_context(
                format!("endpoint '{}' does not support streaming", self.endpoint()),
                ErrorContext::new().with_source(self.endpoint().as_str()),
            ));
        }
        match self.transform_request(input)? {
            WireRequest::Json(Value::Object(mut body)) => {
                body.insert("stream".into(), Value::Bool(true));
                Ok(Value::Object(body))
            }
            _ => Err(Error::invalid_request_with_context(
                "streaming requires a JSON object body",
                ErrorContext::new().with_source(self.endpoint().as_str()),
            )),
        }
    }

    fn transform_stream_event(&self, event: StreamEvent) -> StreamEvent {
        event
    }
}

/// Lookup table from endpoint to adapter.
#[derive(Clone)]
pub struct AdapterFactory {
    adapters: HashMap<Endpoint, Arc<dyn Adapter>>,
}

impl AdapterFactory {
    /// A factory with nothing registered.
    pub fn empty() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Register (or replace) the adapter for its endpoint.
    pub fn register(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.adapters.insert(adapter.endpoint(), adapter);
        self
    }

    pub fn make(&self, endpoint: Endpoint) -> Result<Arc<dyn Adapter>> {
        self.adapters.get(&endpoint).cloned().ok_or_else(|| {
            Error::configuration_with_context(
                format!("no adapter registered for endpoint '{}'", endpoint),
                ErrorContext::new().with_source("adapter_factory"),
            )
        })
    }

    pub fn endpoints(&self) -> Vec<Endpoint> {
        Endpoint::ALL
            .into_iter()
            .filter(|e| self.adapters.contains_key(e))
            .collect()
    }
}

impl Default for AdapterFactory {
    fn default() -> Self {
        Self::empty()
            .register(Arc::new(ChatCompletionAdapter))
            .register(Arc::new(UnifiedResponseAdapter))
            .register(Arc::new(TranscriptionAdapter))
            .register(Arc::new(TranslationAdapter))
            .register(Arc::new(SpeechAdapter))
            .register(Arc::new(ImageGenerationAdapter))
            .register(Arc::new(ImageEditAdapter))
            .register(Arc::new(ImageVariationAdapter))
    }
}

impl fmt::Debug for AdapterFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterFactory")
            .field("endpoints", &self.endpoints())
            .finish()
    }
}

pub(crate) fn unexpected_input(endpoint: Endpoint, input: &TurnInput) -> Error {
    Error::invalid_request_with_context(
        format!(
            "adapter for '{}' cannot handle input classified for '{}'",
            endpoint,
            input.endpoint()
        ),
        ErrorContext::new().with_source("adapter"),
    )
}

pub(crate) fn missing_field(endpoint: Endpoint, field: &str, message: &str) -> Error {
    Error::invalid_request_with_context(
        message,
        ErrorContext::new()
            .with_field_path(field)
            .with_source(endpoint.as_str()),
    )
}

/// The JSON object body of a wire response; anything else is a decode failure.
pub(crate) fn json_object(endpoint: Endpoint, wire: &WireResponse) -> Result<&Map<String, Value>> {
    match wire {
        WireResponse::Json(Value::Object(map)) => Ok(map),
        WireResponse::Json(_) => Err(Error::decode_with_context(
            "expected a JSON object response body",
            ErrorContext::new().with_source(endpoint.as_str()),
        )),
        WireResponse::Binary { content_type, .. } => Err(Error::decode_with_context(
            format!(
                "expected a JSON response, got {}",
                content_type.as_deref().unwrap_or("an untyped body")
            ),
            ErrorContext::new().with_source(endpoint.as_str()),
        )),
    }
}

pub(crate) fn str_of(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Copy `keys` from a response body into metadata, defaulting absent ones to null.
pub(crate) fn copy_metadata(
    metadata: &mut Map<String, Value>,
    body: &Map<String, Value>,
    keys: &[&str],
) {
    for key in keys {
        metadata.insert(
            key.to_string(),
            body.get(*key).cloned().unwrap_or(Value::Null),
        );
    }
}

pub(crate) fn model_or(model: &Option<String>, default: &str) -> String {
    model.clone().unwrap_or_else(|| default.to_string())
}

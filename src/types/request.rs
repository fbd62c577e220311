//! Caller-facing unified request payload.

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Open-ended mapping of caller intent (`message`, `audio{..}`, `image{..}`, `model`, `tools`, ...).
///
/// There is no fixed schema: the router interprets fields structurally and each adapter consumes
/// only what it needs. The router only ever borrows a request, so a request is never mutated
/// once dispatched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnifiedRequest {
    fields: Map<String, Value>,
}

impl UnifiedRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON value; anything other than an object is rejected.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(Error::invalid_request_with_context(
                "unified request must be a JSON object",
                ErrorContext::new()
                    .with_details(format!("got {}", json_type_name(&other)))
                    .with_source("unified_request"),
            )),
        }
    }

    /// Builder-style field insertion, used while constructing a request.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// A field counts as present when it is populated (see [`is_populated`]).
    pub fn has(&self, key: &str) -> bool {
        self.fields.get(key).map(is_populated).unwrap_or(false)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn object(&self, key: &str) -> Option<&Map<String, Value>> {
        self.fields.get(key).and_then(Value::as_object)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        !self.fields.values().any(is_populated)
    }
}

impl From<Map<String, Value>> for UnifiedRequest {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl TryFrom<Value> for UnifiedRequest {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

/// Null, empty strings, empty arrays and empty objects carry no content.
pub fn is_populated(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

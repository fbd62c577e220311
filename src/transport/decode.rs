//! Content-type aware body decoding and remote error message extraction.

use crate::types::WireResponse;
use crate::{Error, ErrorContext, Result};
use bytes::Bytes;
use serde_json::Value;

fn is_json_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

/// Decode a successful body.
///
/// JSON content types are parsed strictly; a malformed body is a [`Error::Decode`]. Other typed
/// bodies pass through as bytes. An untyped body is parsed as JSON when it is valid JSON.
pub(crate) fn decode_body(
    content_type: Option<String>,
    body: Bytes,
    path: &str,
) -> Result<WireResponse> {
    match content_type.as_deref() {
        Some(ct) if is_json_content_type(ct) => serde_json::from_slice(&body)
            .map(WireResponse::Json)
            .map_err(|e| {
                Error::decode_with_context(
                    format!("malformed JSON body: {}", e),
                    ErrorContext::new()
                        .with_source("transport")
                        .with_details(path.to_string()),
                )
            }),
        Some(_) => Ok(WireResponse::Binary { content_type, body }),
        None => match serde_json::from_slice::<Value>(&body) {
            Ok(v) if !body.is_empty() => Ok(WireResponse::Json(v)),
            _ => Ok(WireResponse::Binary {
                content_type: None,
                body,
            }),
        },
    }
}

/// Best-effort human readable message from an error body.
///
/// Looks at `error.message`, `message`, `error` (string), `errors[0].message`, then falls back to
/// the raw body.
pub fn extract_error_message(body: &str) -> String {
    let raw = body.trim();
    let Ok(v) = serde_json::from_str::<Value>(raw) else {
        return raw.to_string();
    };
    let candidates = [
        v.pointer("/error/message"),
        v.get("message"),
        v.get("error"),
        v.pointer("/errors/0/message"),
    ];
    let message = candidates
        .into_iter()
        .flatten()
        .find_map(|c| c.as_str().filter(|s| !s.trim().is_empty()))
        .map(str::to_string);
    message.unwrap_or_else(|| raw.to_string())
}

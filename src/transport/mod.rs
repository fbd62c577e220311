//! HTTP execution layer.
//!
//! The transport knows nothing about endpoint semantics. It executes JSON, multipart, DELETE,
//! GET and SSE exchanges against a base URL and applies one retry/idempotency policy to all of them.

mod decode;
mod http;
mod retry;

pub use decode::extract_error_message;
pub use http::{ByteStream, HttpTransport};
pub use retry::{backoff_delay, generate_idempotency_key, is_retryable_status};

use crate::config::RetryPolicy;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";
pub const CORRELATION_HEADER: &str = "x-client-request-id";

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}

/// What a call does, which decides its retry and idempotency treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// POST that creates something (JSON or multipart).
    Create,
    /// POST answered with an event stream.
    Stream,
    /// DELETE.
    Mutate,
    /// GET (JSON or raw content).
    Read,
}

impl CallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallKind::Create => "create",
            CallKind::Stream => "stream",
            CallKind::Mutate => "mutate",
            CallKind::Read => "read",
        }
    }

    pub fn is_retried(&self) -> bool {
        !matches!(self, CallKind::Read)
    }

    pub fn carries_idempotency_key(&self) -> bool {
        matches!(self, CallKind::Create | CallKind::Stream)
    }
}

/// Per-call knobs.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Reuse a caller-supplied key instead of generating one for this call.
    pub idempotency_key: Option<String>,
    /// Correlation id propagated as `x-client-request-id`; generated when absent.
    pub correlation_id: Option<String>,
    pub headers: HashMap<String, String>,
    /// Overrides the transport's policy for this call only.
    pub retry: Option<RetryPolicy>,
    /// Aborts an in-flight send or a retry sleep.
    pub cancel: Option<CancellationToken>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

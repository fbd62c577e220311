use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path that caused the error (e.g., "image.prompt", "audio.file")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Component that raised the error (e.g., "router", "transport", "image_edit")
    pub source: Option<String>,
    /// Remote HTTP status, when one was observed
    pub status_code: Option<u16>,
    /// Number of attempts made before the error surfaced
    pub attempts: Option<u32>,
    /// Server-assigned request id (`x-request-id`) of the failed call
    pub request_id: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_status_code(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }
}

/// Unified error type for the dispatch core.
///
/// Variants fall into four families:
/// - classification (`AmbiguousInput`, `NoInput`), raised by the router
/// - validation (`FileValidation`, `InvalidRequest`), raised by adapters
/// - transport (`ApiResponse`, `MaxRetriesExceeded`, `Transport`)
/// - decoding (`Decode`)
///
/// Classification and validation errors are raised before any network call and are never retried.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Ambiguous input: request matches more than one shape ({})", .matches.join(", "))]
    AmbiguousInput { matches: Vec<String> },

    #[error("No input provided. {}", NO_INPUT_HINT)]
    NoInput,

    #[error("File validation error for '{path}': {message}")]
    FileValidation { path: String, message: String },

    #[error("Invalid request: {message}{}", format_context(.context))]
    InvalidRequest {
        message: String,
        context: ErrorContext,
    },

    #[error("API error: HTTP {status}: {message} (after {attempts} attempt(s))")]
    ApiResponse {
        status: u16,
        message: String,
        attempts: u32,
        context: ErrorContext,
    },

    #[error("Maximum retries exceeded after {attempts} attempt(s): {message}")]
    MaxRetriesExceeded { attempts: u32, message: String },

    #[error("Decode error: {message}{}", format_context(.context))]
    Decode {
        message: String,
        context: ErrorContext,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Request cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Lists every way a caller can populate a unified request.
pub const NO_INPUT_HINT: &str = "Populate at least one of: `message` (text or {role, content}), \
`messages` (conversation array), `input` (text or structured {role, content[]}), `instructions`, \
`audio` ({file, action: transcribe|translate} or {text, action: speech}), \
`image` ({prompt} to generate, {image, prompt} to edit, {image} for variations).";

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Error::InvalidRequest {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn invalid_request_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::InvalidRequest {
            message: msg.into(),
            context,
        }
    }

    pub fn file_validation(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Error::FileValidation {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn decode_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Decode {
            message: msg.into(),
            context,
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Raised by the router before any network call.
    pub fn is_classification(&self) -> bool {
        matches!(self, Error::AmbiguousInput { .. } | Error::NoInput)
    }

    /// Raised by an adapter before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::FileValidation { .. } | Error::InvalidRequest { .. }
        )
    }

    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::ApiResponse { .. } | Error::MaxRetriesExceeded { .. } | Error::Transport(_)
        )
    }

    /// Whether a failed exchange may be attempted again with the same payload.
    ///
    /// Only network-level failures qualify here; retryable HTTP statuses are classified
    /// by the transport before an `ApiResponse` is ever constructed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Remote HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::ApiResponse { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::InvalidRequest { context, .. }
            | Error::ApiResponse { context, .. }
            | Error::Decode { context, .. }
            | Error::Configuration { context, .. } => Some(context),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_input_message_lists_entry_points() {
        let msg = Error::NoInput.to_string();
        for entry in ["`message`", "`messages`", "`input`", "`audio`", "`image`"] {
            assert!(msg.contains(entry), "missing {entry} in: {msg}");
        }
    }

    #[test]
    fn ambiguous_input_names_matches() {
        let err = Error::AmbiguousInput {
            matches: vec!["standalone_audio".into(), "standalone_image".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("standalone_audio"));
        assert!(msg.contains("standalone_image"));
        assert!(err.is_classification());
    }

    #[test]
    fn context_is_rendered() {
        let err = Error::invalid_request_with_context(
            "prompt is required",
            ErrorContext::new()
                .with_field_path("image.prompt")
                .with_source("image_generation"),
        );
        assert_eq!(
            err.to_string(),
            "Invalid request: prompt is required (field: image.prompt, source: image_generation)"
        );
        assert!(err.is_validation());
        assert!(!err.is_retryable());
    }
}

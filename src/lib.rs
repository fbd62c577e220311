//! # ai-dispatch
//!
//! Dispatch, transport and streaming core for unified AI turn requests.
//!
//! ## Overview
//!
//! A caller describes a turn with one loosely-typed [`UnifiedRequest`] (text, audio to
//! transcribe/translate/speak, or an image to generate/edit/vary). This crate decides which of
//! eight remote endpoints serves it, builds that endpoint's wire request, executes the HTTP
//! exchange with retry/backoff and idempotency keys, and normalizes the answer into one
//! [`ResponseEnvelope`] (or a sequence of [`StreamEvent`]s for streaming turns).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_dispatch::{DispatchClient, UnifiedRequest};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> ai_dispatch::Result<()> {
//!     let client = DispatchClient::builder()
//!         .api_key("sk-...")
//!         .build()?;
//!
//!     let request = UnifiedRequest::from_value(json!({
//!         "audio": {"file": "meeting.mp3", "action": "transcribe"}
//!     }))?;
//!     let envelope = client.send(&request).await?;
//!     println!("{}", envelope.text().unwrap_or_default());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`routing`] | Shape predicates, priority tiers and tie-breaks |
//! | [`adapters`] | One adapter per endpoint plus the [`AdapterFactory`] |
//! | [`transport`] | JSON / multipart / DELETE / GET / SSE with retry and idempotency |
//! | [`stream`] | Line buffering and SSE event decoding |
//! | [`client`] | [`DispatchClient`] tying the above together |
//! | [`types`] | Endpoints, envelopes, events and typed inputs |
//! | [`config`] | Client, retry and routing configuration |

pub mod adapters;
pub mod client;
pub mod config;
pub mod routing;
pub mod stream;
pub mod transport;
pub mod types;

pub use adapters::{Adapter, AdapterFactory, WireRequest};
pub use client::{DispatchClient, DispatchClientBuilder, TurnStream};
pub use config::{ClientConfig, RetryPolicy};
pub use routing::{Router, RouterConfig, Shape};
pub use stream::StreamReader;
pub use transport::{CallOptions, HttpTransport};
pub use types::{
    Endpoint, EndpointKind, ResponseEnvelope, ResponseStatus, StreamEvent, TurnInput,
    UnifiedRequest, WireResponse,
};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `Result<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};

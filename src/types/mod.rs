//! # Types Module
//!
//! Core data types shared by the router, adapters, transport and stream reader.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`UnifiedRequest`] | Open-ended caller payload, interpreted structurally by the router |
//! | [`TurnInput`] | Typed, per-endpoint input produced by classification |
//! | [`Endpoint`] | One concrete remote operation (path + wire shape) |
//! | [`ResponseEnvelope`] | Normalized response returned for every endpoint |
//! | [`WireResponse`] | Decoded remote response body, kept verbatim in the envelope |
//! | [`StreamEvent`] | One decoded SSE frame |

pub mod endpoint;
pub mod envelope;
pub mod events;
pub mod input;
pub mod request;

pub use endpoint::{Endpoint, EndpointKind};
pub use envelope::{ImageData, ResponseEnvelope, ResponseStatus, WireResponse};
pub use events::{EventData, StreamEvent};
pub use input::{
    ChatInput, ImageEditInput, ImageGenerationInput, ImageVariationInput, ResponseInput,
    SpeechInput, TranscriptionInput, TranslationInput, TurnInput,
};
pub use request::UnifiedRequest;

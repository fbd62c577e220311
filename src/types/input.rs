//! Typed per-endpoint inputs.
//!
//! The router converts an untyped [`crate::UnifiedRequest`] into exactly one of these variants;
//! adapters only ever see typed input. Fields that an endpoint requires are still optional here so
//! the adapter can reject a missing value with a descriptive error before any network call.

use super::endpoint::Endpoint;
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Conversation routed to the chat-completion endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatInput {
    pub model: Option<String>,
    /// Messages as the caller supplied them (`{role, content}` objects).
    pub messages: Vec<Value>,
    /// Prepended as a system message.
    pub instructions: Option<String>,
    /// Pass-through options (temperature, max_tokens, tools, tool_choice, ...).
    pub options: Map<String, Value>,
}

/// Turn routed to the unified response endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseInput {
    pub model: Option<String>,
    /// Text, a single `{role, content[]}` item, or an array of items.
    pub input: Option<Value>,
    pub instructions: Option<String>,
    pub tools: Option<Value>,
    /// Set when the input was recognized as structured (vision / image-input) content.
    pub image_input: bool,
    pub options: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscriptionInput {
    pub file: Option<PathBuf>,
    pub model: Option<String>,
    pub language: Option<String>,
    pub prompt: Option<String>,
    pub response_format: Option<String>,
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslationInput {
    pub file: Option<PathBuf>,
    pub model: Option<String>,
    pub prompt: Option<String>,
    pub response_format: Option<String>,
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeechInput {
    pub text: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub response_format: Option<String>,
    pub speed: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageGenerationInput {
    pub prompt: Option<String>,
    pub model: Option<String>,
    pub n: Option<u32>,
    pub size: Option<String>,
    pub quality: Option<String>,
    pub style: Option<String>,
    pub response_format: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageEditInput {
    pub image: Option<PathBuf>,
    pub mask: Option<PathBuf>,
    pub prompt: Option<String>,
    pub model: Option<String>,
    pub n: Option<u32>,
    pub size: Option<String>,
    pub response_format: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageVariationInput {
    pub image: Option<PathBuf>,
    pub model: Option<String>,
    pub n: Option<u32>,
    pub size: Option<String>,
    pub response_format: Option<String>,
}

/// Classified request: one variant per [`Endpoint`].
#[derive(Debug, Clone, PartialEq)]
pub enum TurnInput {
    Chat(ChatInput),
    Response(ResponseInput),
    Transcription(TranscriptionInput),
    Translation(TranslationInput),
    Speech(SpeechInput),
    ImageGeneration(ImageGenerationInput),
    ImageEdit(ImageEditInput),
    ImageVariation(ImageVariationInput),
}

impl TurnInput {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            TurnInput::Chat(_) => Endpoint::ChatCompletion,
            TurnInput::Response(_) => Endpoint::UnifiedResponse,
            TurnInput::Transcription(_) => Endpoint::AudioTranscription,
            TurnInput::Translation(_) => Endpoint::AudioTranslation,
            TurnInput::Speech(_) => Endpoint::AudioSpeech,
            TurnInput::ImageGeneration(_) => Endpoint::ImageGeneration,
            TurnInput::ImageEdit(_) => Endpoint::ImageEdit,
            TurnInput::ImageVariation(_) => Endpoint::ImageVariation,
        }
    }
}

//! Remote endpoints and their wire paths.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One concrete remote HTTP operation.
///
/// Each value maps 1:1 to one adapter and one wire path (relative to the `/v1` base URL).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    ChatCompletion,
    UnifiedResponse,
    AudioTranscription,
    AudioTranslation,
    AudioSpeech,
    ImageGeneration,
    ImageEdit,
    ImageVariation,
}

/// The `type` reported by a [`crate::ResponseEnvelope`].
pub type EndpointKind = Endpoint;

impl Endpoint {
    pub const ALL: [Endpoint; 8] = [
        Endpoint::ChatCompletion,
        Endpoint::UnifiedResponse,
        Endpoint::AudioTranscription,
        Endpoint::AudioTranslation,
        Endpoint::AudioSpeech,
        Endpoint::ImageGeneration,
        Endpoint::ImageEdit,
        Endpoint::ImageVariation,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Self::ChatCompletion => "/chat/completions",
            Self::UnifiedResponse => "/responses",
            Self::AudioTranscription => "/audio/transcriptions",
            Self::AudioTranslation => "/audio/translations",
            Self::AudioSpeech => "/audio/speech",
            Self::ImageGeneration => "/images/generations",
            Self::ImageEdit => "/images/edits",
            Self::ImageVariation => "/images/variations",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChatCompletion => "chat_completion",
            Self::UnifiedResponse => "unified_response",
            Self::AudioTranscription => "audio_transcription",
            Self::AudioTranslation => "audio_translation",
            Self::AudioSpeech => "audio_speech",
            Self::ImageGeneration => "image_generation",
            Self::ImageEdit => "image_edit",
            Self::ImageVariation => "image_variation",
        }
    }

    /// Prefix used for placeholder ids when the provider omits one.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::ChatCompletion => "chatcmpl",
            Self::UnifiedResponse => "resp",
            Self::AudioTranscription => "transcription",
            Self::AudioTranslation => "translation",
            Self::AudioSpeech => "speech",
            Self::ImageGeneration => "imggen",
            Self::ImageEdit => "imgedit",
            Self::ImageVariation => "imgvar",
        }
    }

    /// Whether the request body is a multipart part-set rather than JSON.
    pub fn is_multipart(&self) -> bool {
        matches!(
            self,
            Self::AudioTranscription | Self::AudioTranslation | Self::ImageEdit | Self::ImageVariation
        )
    }

    pub fn is_text(&self) -> bool {
        matches!(
            self,
            Self::ChatCompletion
                | Self::UnifiedResponse
                | Self::AudioTranscription
                | Self::AudioTranslation
        )
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, Self::AudioSpeech)
    }

    pub fn is_image(&self) -> bool {
        matches!(
            self,
            Self::ImageGeneration | Self::ImageEdit | Self::ImageVariation
        )
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

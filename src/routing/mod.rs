//! Request classification: which endpoint serves a unified request.
//!
//! This module is **pure logic**: it performs no I/O. The router evaluates a configurable list of
//! shape predicates grouped into priority tiers (lower tier wins). When more than one shape matches
//! within the winning tier, the configured tie-break order decides; without one the request is
//! rejected as ambiguous rather than silently picking a side.

mod extract;
mod shapes;

use crate::types::{Endpoint, TurnInput, UnifiedRequest};
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

pub use shapes::{message_has_audio, structured_item};

/// Structural shape a unified request can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    /// Top-level `audio` config (transcribe / translate / speech).
    StandaloneAudio,
    /// Top-level `image` config (generate / edit / vary).
    StandaloneImage,
    /// Audio content embedded in a chat-style message or message array.
    ConversationalAudio,
    /// `input` made of `{role, content[]}` items (vision / image-input).
    StructuredInput,
    /// Plain text, instructions, conversations without audio.
    Text,
}

impl Shape {
    pub const ALL: [Shape; 5] = [
        Shape::StandaloneAudio,
        Shape::StandaloneImage,
        Shape::ConversationalAudio,
        Shape::StructuredInput,
        Shape::Text,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Shape::StandaloneAudio => "standalone_audio",
            Shape::StandaloneImage => "standalone_image",
            Shape::ConversationalAudio => "conversational_audio",
            Shape::StructuredInput => "structured_input",
            Shape::Text => "text",
        }
    }

    fn matches(&self, request: &UnifiedRequest) -> bool {
        match self {
            Shape::StandaloneAudio => shapes::is_standalone_audio(request),
            Shape::StandaloneImage => shapes::is_standalone_image(request),
            Shape::ConversationalAudio => shapes::is_conversational_audio(request),
            Shape::StructuredInput => shapes::is_structured_input(request),
            Shape::Text => shapes::is_text(request),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A shape and the tier it is evaluated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityRule {
    pub shape: Shape,
    pub tier: u8,
}

/// Routing rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Every shape with its tier; lower tiers are evaluated first.
    pub priorities: Vec<PriorityRule>,
    /// Ordered preference applied only when several shapes match in the same tier.
    pub tie_break: Vec<Shape>,
    /// Where conversations carrying audio go. The unified endpoint does not accept audio input
    /// yet, so this defaults to chat completions.
    pub conversational_audio_endpoint: Endpoint,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            priorities: vec![
                PriorityRule {
                    shape: Shape::StandaloneAudio,
                    tier: 0,
                },
                PriorityRule {
                    shape: Shape::StandaloneImage,
                    tier: 0,
                },
                PriorityRule {
                    shape: Shape::ConversationalAudio,
                    tier: 1,
                },
                PriorityRule {
                    shape: Shape::StructuredInput,
                    tier: 2,
                },
                PriorityRule {
                    shape: Shape::Text,
                    tier: 3,
                },
            ],
            tie_break: Vec::new(),
            conversational_audio_endpoint: Endpoint::ChatCompletion,
        }
    }
}

impl RouterConfig {
    /// Append a shape to the tie-break order (e.g. "prefer audio over image").
    pub fn prefer(mut self, shape: Shape) -> Self {
        if !self.tie_break.contains(&shape) {
            self.tie_break.push(shape);
        }
        self
    }

    pub fn with_tier(mut self, shape: Shape, tier: u8) -> Self {
        match self.priorities.iter_mut().find(|r| r.shape == shape) {
            Some(rule) => rule.tier = tier,
            None => self.priorities.push(PriorityRule { shape, tier }),
        }
        self
    }

    pub fn with_conversational_audio_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.conversational_audio_endpoint = endpoint;
        self
    }

    pub fn tier_of(&self, shape: Shape) -> Option<u8> {
        self.priorities
            .iter()
            .find(|r| r.shape == shape)
            .map(|r| r.tier)
    }

    pub fn validate(&self) -> Result<()> {
        for shape in Shape::ALL {
            let count = self.priorities.iter().filter(|r| r.shape == shape).count();
            if count != 1 {
                return Err(Error::configuration_with_context(
                    format!(
                        "shape '{}' must appear exactly once in router priorities (found {})",
                        shape, count
                    ),
                    ErrorContext::new().with_field_path("router.priorities"),
                ));
            }
        }
        if !matches!(
            self.conversational_audio_endpoint,
            Endpoint::ChatCompletion | Endpoint::UnifiedResponse
        ) {
            return Err(Error::configuration_with_context(
                format!(
                    "conversational audio cannot be routed to '{}'",
                    self.conversational_audio_endpoint
                ),
                ErrorContext::new().with_field_path("router.conversational_audio_endpoint"),
            ));
        }
        Ok(())
    }
}

/// Outcome of classification: the winning shape and its endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub shape: Shape,
    pub endpoint: Endpoint,
}

/// Stateless classifier from unified requests to endpoints.
#[derive(Debug, Clone, Default)]
pub struct Router {
    config: RouterConfig,
}

impl Router {
    pub fn new(config: RouterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// All shapes the request structurally matches, in priority order.
    pub fn matching_shapes(&self, request: &UnifiedRequest) -> Vec<Shape> {
        let mut rules = self.config.priorities.clone();
        rules.sort_by_key(|r| r.tier);
        rules
            .into_iter()
            .filter(|r| r.shape.matches(request))
            .map(|r| r.shape)
            .collect()
    }

    pub fn route(&self, request: &UnifiedRequest) -> Result<Route> {
        let matches = self.matching_shapes(request);
        let Some(first) = matches.first().copied() else {
            return Err(Error::NoInput);
        };

        let tier = self.config.tier_of(first);
        let contenders: Vec<Shape> = matches
            .iter()
            .copied()
            .filter(|s| self.config.tier_of(*s) == tier)
            .collect();

        let shape = if contenders.len() == 1 {
            first
        } else {
            self.config
                .tie_break
                .iter()
                .copied()
                .find(|s| contenders.contains(s))
                .ok_or_else(|| Error::AmbiguousInput {
                    matches: contenders.iter().map(|s| s.to_string()).collect(),
                })?
        };

        let endpoint = match shape {
            Shape::StandaloneAudio => shapes::audio_endpoint(request)?,
            Shape::StandaloneImage => shapes::image_endpoint(request)?,
            Shape::ConversationalAudio => self.config.conversational_audio_endpoint,
            Shape::StructuredInput | Shape::Text => Endpoint::UnifiedResponse,
        };

        debug!(
            shape = shape.as_str(),
            endpoint = endpoint.as_str(),
            candidates = matches.len(),
            "request classified"
        );
        Ok(Route { shape, endpoint })
    }

    pub fn determine_endpoint(&self, request: &UnifiedRequest) -> Result<Endpoint> {
        Ok(self.route(request)?.endpoint)
    }

    /// Classify and convert into the typed input consumed by the endpoint's adapter.
    pub fn classify(&self, request: &UnifiedRequest) -> Result<TurnInput> {
        let route = self.route(request)?;
        extract::turn_input(&route, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn req(v: serde_json::Value) -> UnifiedRequest {
        UnifiedRequest::from_value(v).unwrap()
    }

    #[test]
    fn default_config_is_valid() {
        RouterConfig::default().validate().unwrap();
    }

    #[test]
    fn duplicate_shapes_are_rejected() {
        let mut cfg = RouterConfig::default();
        cfg.priorities.push(PriorityRule {
            shape: Shape::Text,
            tier: 9,
        });
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn lower_tier_wins_over_text() {
        let router = Router::default();
        let route = router
            .route(&req(json!({"message": "say it", "audio": {"action": "speech"}})))
            .unwrap();
        assert_eq!(route.shape, Shape::StandaloneAudio);
        assert_eq!(route.endpoint, Endpoint::AudioSpeech);
    }

    #[test]
    fn tie_break_resolves_same_tier_conflict() {
        let request = req(json!({
            "audio": {"file": "a.mp3", "action": "transcribe"},
            "image": {"prompt": "a cat"}
        }));
        let err = Router::default().route(&request).unwrap_err();
        assert!(matches!(err, Error::AmbiguousInput { .. }));

        let router = Router::new(RouterConfig::default().prefer(Shape::StandaloneImage));
        assert_eq!(
            router.determine_endpoint(&request).unwrap(),
            Endpoint::ImageGeneration
        );
    }

    #[test]
    fn retiering_changes_priority() {
        let request = req(json!({
            "audio": {"file": "a.mp3", "action": "transcribe"},
            "image": {"prompt": "a cat"}
        }));
        let router = Router::new(RouterConfig::default().with_tier(Shape::StandaloneImage, 1));
        assert_eq!(
            router.determine_endpoint(&request).unwrap(),
            Endpoint::AudioTranscription
        );
    }

    #[test]
    fn metadata_only_payload_has_no_input() {
        let err = Router::default()
            .route(&req(json!({"model": "gpt-4o", "tools": [{"type": "web_search"}]})))
            .unwrap_err();
        assert!(matches!(err, Error::NoInput));
    }
}

//! Client configuration: base URL, timeouts, retry tunables and routing rules.
//!
//! Configuration is plain data. It can be written inline, loaded from YAML, and adjusted
//! through environment variables; the dispatch core never reads ambient/global config itself.

use crate::routing::RouterConfig;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Retry/backoff tunables, immutable once handed to a transport.
///
/// The delay before attempt `n + 1` is `min(initial_delay * multiplier^(n - 1), max_delay)`,
/// scaled by a uniform factor in `[0.5, 1.0]` when `jitter` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub enabled: bool,
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            initial_delay_ms: 500,
            multiplier: 2.0,
            max_delay_ms: 8_000,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that performs exactly one attempt.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Total attempts a single logical call may make.
    pub fn effective_attempts(&self) -> u32 {
        if self.enabled {
            self.max_attempts.max(1)
        } else {
            1
        }
    }

    pub fn validate(&self) -> Result<()> {
        let ctx = || ErrorContext::new().with_source("retry_policy");
        if self.max_attempts == 0 {
            return Err(Error::configuration_with_context(
                "max_attempts must be at least 1",
                ctx().with_field_path("retry.max_attempts"),
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(Error::configuration_with_context(
                format!("multiplier must be >= 1.0, got {}", self.multiplier),
                ctx().with_field_path("retry.multiplier"),
            ));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(Error::configuration_with_context(
                "max_delay_ms must not be smaller than initial_delay_ms",
                ctx().with_field_path("retry.max_delay_ms"),
            ));
        }
        Ok(())
    }
}

/// Top-level client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL including the API version prefix (e.g. `https://api.openai.com/v1`).
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub pool_max_idle_per_host: usize,
    /// Attach an `Idempotency-Key` header to create and stream calls.
    pub idempotency: bool,
    pub retry: RetryPolicy,
    pub router: RouterConfig,
    pub default_headers: HashMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout_secs: 60,
            connect_timeout_secs: 10,
            pool_max_idle_per_host: 32,
            idempotency: true,
            retry: RetryPolicy::default(),
            router: RouterConfig::default(),
            default_headers: HashMap::new(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let config: ClientConfig = serde_yaml::from_str(raw).map_err(|e| {
            Error::configuration_with_context(
                format!("Invalid configuration YAML: {}", e),
                ErrorContext::new().with_source("config_loader"),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("Failed to read configuration: {}", e),
                ErrorContext::new()
                    .with_source("config_loader")
                    .with_details(path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Apply environment overrides on top of this configuration.
    ///
    /// - `AI_DISPATCH_BASE_URL`
    /// - `AI_HTTP_TIMEOUT_SECS`
    /// - `AI_HTTP_POOL_MAX_IDLE_PER_HOST`
    /// - `AI_DISPATCH_MAX_ATTEMPTS`
    /// - `OPENAI_API_KEY` (only when no key is configured)
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = env::var("AI_DISPATCH_BASE_URL") {
            if !url.trim().is_empty() {
                self.base_url = url;
            }
        }
        if let Some(secs) = env_parse::<u64>("AI_HTTP_TIMEOUT_SECS") {
            self.timeout_secs = secs;
        }
        if let Some(n) = env_parse::<usize>("AI_HTTP_POOL_MAX_IDLE_PER_HOST") {
            self.pool_max_idle_per_host = n;
        }
        if let Some(n) = env_parse::<u32>("AI_DISPATCH_MAX_ATTEMPTS") {
            self.retry.max_attempts = n;
        }
        if self.api_key.is_none() {
            self.api_key = env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("Invalid base_url '{}': {}", self.base_url, e),
                ErrorContext::new().with_field_path("base_url"),
            )
        })?;
        if self.timeout_secs == 0 {
            return Err(Error::configuration_with_context(
                "timeout_secs must be greater than zero",
                ErrorContext::new().with_field_path("timeout_secs"),
            ));
        }
        self.retry.validate()?;
        self.router.validate()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}

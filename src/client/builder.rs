use crate::adapters::AdapterFactory;
use crate::client::core::DispatchClient;
use crate::config::{ClientConfig, RetryPolicy};
use crate::routing::{Router, RouterConfig};
use crate::transport::HttpTransport;
use crate::Result;
use std::time::Duration;

/// Builder for [`DispatchClient`].
///
/// Starts from [`ClientConfig::default`] with environment overrides applied; every setter
/// wins over the environment.
pub struct DispatchClientBuilder {
    config: ClientConfig,
    adapters: Option<AdapterFactory>,
}

impl DispatchClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default().with_env_overrides(),
            adapters: None,
        }
    }

    /// Replace the whole configuration (no environment overrides are applied to it).
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    /// Toggle `Idempotency-Key` headers on create and stream calls.
    pub fn idempotency(mut self, enabled: bool) -> Self {
        self.config.idempotency = enabled;
        self
    }

    pub fn router_config(mut self, router: RouterConfig) -> Self {
        self.config.router = router;
        self
    }

    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(name.into(), value.into());
        self
    }

    /// Swap in a custom adapter table (e.g. to override one endpoint's adapter).
    pub fn adapter_factory(mut self, adapters: AdapterFactory) -> Self {
        self.adapters = Some(adapters);
        self
    }

    pub fn build(self) -> Result<DispatchClient> {
        let transport = HttpTransport::new(&self.config)?;
        Ok(DispatchClient::from_parts(
            Router::new(self.config.router.clone()),
            self.adapters.unwrap_or_default(),
            transport,
        ))
    }
}

impl Default for DispatchClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

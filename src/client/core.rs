use crate::adapters::{Adapter, AdapterFactory};
use crate::client::builder::DispatchClientBuilder;
use crate::client::stream::TurnStream;
use crate::routing::Router;
use crate::stream::StreamReader;
use crate::transport::{CallOptions, HttpTransport};
use crate::types::{Endpoint, ResponseEnvelope, TurnInput, UnifiedRequest};
use crate::{Error, ErrorContext, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Sends unified turn requests to whichever endpoint serves them.
///
/// Holds configuration only (router rules, adapter table, pooled transport) and can be cloned
/// freely and shared across tasks.
#[derive(Debug, Clone)]
pub struct DispatchClient {
    router: Router,
    adapters: AdapterFactory,
    transport: HttpTransport,
}

impl DispatchClient {
    pub fn builder() -> DispatchClientBuilder {
        DispatchClientBuilder::new()
    }

    pub(crate) fn from_parts(
        router: Router,
        adapters: AdapterFactory,
        transport: HttpTransport,
    ) -> Self {
        Self {
            router,
            adapters,
            transport,
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn adapters(&self) -> &AdapterFactory {
        &self.adapters
    }

    pub fn transport(&self) -> &HttpTransport {
        &self.transport
    }

    pub fn determine_endpoint(&self, request: &UnifiedRequest) -> Result<Endpoint> {
        self.router.determine_endpoint(request)
    }

    /// Classify and build the typed input plus its adapter, without any I/O.
    fn prepare(&self, request: &UnifiedRequest) -> Result<(TurnInput, Arc<dyn Adapter>)> {
        let input = self.router.classify(request)?;
        let adapter = self.adapters.make(input.endpoint())?;
        Ok((input, adapter))
    }

    pub async fn send(&self, request: &UnifiedRequest) -> Result<ResponseEnvelope> {
        self.send_with_options(request, &CallOptions::default())
            .await
    }

    /// One synchronous turn. Classification and validation failures surface before any
    /// network call.
    pub async fn send_with_options(
        &self,
        request: &UnifiedRequest,
        options: &CallOptions,
    ) -> Result<ResponseEnvelope> {
        let (input, adapter) = self.prepare(request)?;
        let endpoint = input.endpoint();
        let wire = adapter.transform_request(&input)?;

        let start = Instant::now();
        let raw = self.transport.post(endpoint.path(), &wire, options).await?;
        let envelope = adapter.transform_response(raw)?;
        info!(
            endpoint = endpoint.as_str(),
            response_id = envelope.id(),
            status = envelope.status().as_str(),
            duration_ms = start.elapsed().as_millis() as u64,
            "turn completed"
        );
        Ok(tag_input_kind(envelope, input_kind(&input)))
    }

    pub async fn stream(&self, request: &UnifiedRequest) -> Result<TurnStream> {
        self.stream_with_options(request, &CallOptions::default())
            .await
    }

    /// Open a streaming turn. Only text endpoints stream.
    pub async fn stream_with_options(
        &self,
        request: &UnifiedRequest,
        options: &CallOptions,
    ) -> Result<TurnStream> {
        let (input, adapter) = self.prepare(request)?;
        let endpoint = input.endpoint();
        if !adapter.supports_streaming() {
            return Err(Error::invalid_request_with_context(
                format!("endpoint '{}' does not support streaming", endpoint),
                ErrorContext::new().with_source("dispatch_client"),
            ));
        }
        let payload = adapter.transform_stream_request(&input)?;
        let bytes = self
            .transport
            .stream_sse(endpoint.path(), &payload, options)
            .await?;
        let cancel = options
            .cancel
            .as_ref()
            .map(|t| t.child_token())
            .unwrap_or_default();
        Ok(TurnStream::new(
            StreamReader::with_cancellation(bytes, cancel),
            adapter,
            endpoint,
            input_kind(&input),
        ))
    }

    /// DELETE a stored resource (e.g. `/responses/{id}`).
    pub async fn delete(&self, path: &str) -> Result<bool> {
        self.transport.delete(path, &CallOptions::default()).await
    }

    pub async fn list_models(&self) -> Result<Vec<String>> {
        self.transport.list_models(&CallOptions::default()).await
    }
}

/// Which kind of input a unified-response turn carried.
fn input_kind(input: &TurnInput) -> Option<&'static str> {
    match input {
        TurnInput::Response(turn) if turn.image_input => Some("image_input"),
        TurnInput::Response(_) => Some("text"),
        _ => None,
    }
}

pub(crate) fn tag_input_kind(
    envelope: ResponseEnvelope,
    input_kind: Option<&'static str>,
) -> ResponseEnvelope {
    match input_kind {
        Some(kind) => envelope.with_metadata("input_kind", Value::String(kind.to_string())),
        None => envelope,
    }
}

use crate::adapters::Adapter;
use crate::client::core::tag_input_kind;
use crate::stream::StreamReader;
use crate::types::{Endpoint, ResponseEnvelope, ResponseStatus, StreamEvent, WireResponse};
use crate::{BoxStream, Result};
use futures::stream;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A streaming turn: stream events mapped through the endpoint's adapter.
pub struct TurnStream {
    reader: StreamReader,
    adapter: Arc<dyn Adapter>,
    endpoint: Endpoint,
    input_kind: Option<&'static str>,
}

impl TurnStream {
    pub(crate) fn new(
        reader: StreamReader,
        adapter: Arc<dyn Adapter>,
        endpoint: Endpoint,
        input_kind: Option<&'static str>,
    ) -> Self {
        Self {
            reader,
            adapter,
            endpoint,
            input_kind,
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub async fn next_event(&mut self) -> Result<Option<StreamEvent>> {
        Ok(self
            .reader
            .next_event()
            .await?
            .map(|event| self.adapter.transform_stream_event(event)))
    }

    pub fn cancel_handle(&self) -> CancellationToken {
        self.reader.cancel_handle()
    }

    /// Stop early and release the connection.
    pub fn close(&mut self) {
        self.reader.close();
    }

    pub fn into_stream(self) -> BoxStream<'static, StreamEvent> {
        Box::pin(stream::unfold(self, |mut turn| async move {
            match turn.next_event().await {
                Ok(Some(event)) => Some((Ok(event), turn)),
                Ok(None) => None,
                Err(e) => Some((Err(e), turn)),
            }
        }))
    }

    /// Drain the stream into one envelope.
    ///
    /// A terminal event carrying the full `response` object is normalized by the adapter as if
    /// it had arrived synchronously. Otherwise the text deltas are concatenated and `raw` holds
    /// every event payload in arrival order; a stream that ends without a final event is
    /// reported as incomplete.
    pub async fn finish(mut self) -> Result<ResponseEnvelope> {
        let mut text = String::new();
        let mut frames = Vec::new();
        let mut id: Option<String> = None;
        let mut terminal: Option<Value> = None;
        let mut saw_final = false;

        while let Some(event) = self.next_event().await? {
            if let Some(delta) = event.text_delta() {
                text.push_str(delta);
            }
            if id.is_none() {
                id = event
                    .field("id")
                    .or_else(|| event.field("response").and_then(|r| r.get("id")))
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }
            if event.is_final {
                saw_final = true;
                if let Some(response) = event.field("response").filter(|r| r.is_object()) {
                    terminal = Some(response.clone());
                }
            }
            frames.push(serde_json::to_value(&event.data)?);
        }

        if let Some(response) = terminal {
            let envelope = self.adapter.transform_response(WireResponse::Json(response))?;
            return Ok(tag_input_kind(envelope, self.input_kind));
        }

        let status = if saw_final {
            ResponseStatus::Completed
        } else {
            ResponseStatus::Incomplete
        };
        let mut metadata = Map::new();
        metadata.insert("event_count".into(), json!(frames.len()));
        let envelope = ResponseEnvelope::with_text(
            self.endpoint,
            id.unwrap_or_default(),
            status,
            text,
            metadata,
            WireResponse::Json(Value::Array(frames)),
        );
        Ok(tag_input_kind(envelope, self.input_kind))
    }
}

impl std::fmt::Debug for TurnStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnStream")
            .field("endpoint", &self.endpoint)
            .field("input_kind", &self.input_kind)
            .field("reader", &self.reader)
            .finish()
    }
}

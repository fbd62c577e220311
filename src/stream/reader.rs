use super::lines::LineBuffer;
use crate::transport::ByteStream;
use crate::types::{EventData, StreamEvent};
use crate::{BoxStream, Error, Result};
use futures::{stream, StreamExt};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const DONE_SIGNAL: &str = "[DONE]";

/// Turns SSE lines into events.
///
/// `event:` names the type of the data lines that follow it until the next blank line.
#[derive(Debug, Default)]
pub(crate) struct EventAssembler {
    pending_type: Option<String>,
}

impl EventAssembler {
    pub(crate) fn line(&mut self, line: &str) -> Option<StreamEvent> {
        if line.trim().is_empty() {
            self.pending_type = None;
            return None;
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => ("data", line),
        };
        match field {
            "event" => {
                let name = value.trim();
                self.pending_type = (!name.is_empty()).then(|| name.to_string());
                None
            }
            "data" => Some(self.event(value)),
            "id" | "retry" => None,
            // Bare JSON lines from providers that skip the `data:` prefix.
            _ if line.trim_start().starts_with('{') => Some(self.event(line)),
            _ => None,
        }
    }

    fn event(&self, payload: &str) -> StreamEvent {
        let payload = payload.trim();
        if payload == DONE_SIGNAL {
            return StreamEvent::done();
        }
        match serde_json::from_str::<Value>(payload) {
            Ok(Value::Object(map)) => {
                let event_type = self
                    .pending_type
                    .clone()
                    .or_else(|| map.get("type").and_then(Value::as_str).map(str::to_string))
                    .unwrap_or_else(|| "message".to_string());
                StreamEvent::new(event_type, EventData::Json(map))
            }
            _ => StreamEvent::new(
                self.pending_type
                    .clone()
                    .unwrap_or_else(|| "message".to_string()),
                EventData::Text(payload.to_string()),
            ),
        }
    }
}

/// Pull-based reader over one event-stream response.
///
/// Single-use and single-consumer. Events are decoded only when pulled; the byte source is
/// dropped (releasing the connection) at end of stream, on [`StreamReader::close`], on
/// cancellation, or when the reader itself is dropped. A final event does not end iteration,
/// only the end of the byte source does.
pub struct StreamReader {
    source: Option<ByteStream>,
    lines: LineBuffer,
    assembler: EventAssembler,
    cancel: CancellationToken,
    closed: bool,
}

impl StreamReader {
    pub fn new(source: ByteStream) -> Self {
        Self::with_cancellation(source, CancellationToken::new())
    }

    /// Reader that stops as soon as `cancel` fires.
    pub fn with_cancellation(source: ByteStream, cancel: CancellationToken) -> Self {
        Self {
            source: Some(source),
            lines: LineBuffer::new(),
            assembler: EventAssembler::default(),
            cancel,
            closed: false,
        }
    }

    /// Token that aborts a pending [`StreamReader::next_event`] from another task.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The next event, or `None` once the stream is exhausted or closed.
    ///
    /// Cancellation closes the reader and yields [`Error::Cancelled`] once.
    pub async fn next_event(&mut self) -> Result<Option<StreamEvent>> {
        loop {
            if self.closed {
                return Ok(None);
            }
            if self.cancel.is_cancelled() {
                return Err(self.cancelled());
            }
            if let Some(line) = self.lines.next_line() {
                if let Some(event) = self.assembler.line(&line) {
                    return Ok(Some(event));
                }
                continue;
            }

            let Some(source) = self.source.as_mut() else {
                let trailing = self.lines.finish();
                self.closed = true;
                return Ok(trailing.and_then(|line| self.assembler.line(&line)));
            };

            let chunk = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                chunk = source.next() => Some(chunk),
            };
            match chunk {
                None => return Err(self.cancelled()),
                Some(Some(Ok(bytes))) => self.lines.push(&bytes),
                Some(Some(Err(e))) => {
                    self.close();
                    return Err(e);
                }
                Some(None) => {
                    self.source = None;
                    debug!("event stream ended");
                }
            }
        }
    }

    fn cancelled(&mut self) -> Error {
        self.close();
        debug!("event stream cancelled");
        Error::Cancelled
    }

    /// Stop reading and release the connection. Idempotent.
    pub fn close(&mut self) {
        self.source = None;
        self.lines.clear();
        self.closed = true;
    }

    /// Adapt into a `futures::Stream`; dropping the stream closes the connection.
    pub fn into_stream(self) -> BoxStream<'static, StreamEvent> {
        Box::pin(stream::unfold(self, |mut reader| async move {
            match reader.next_event().await {
                Ok(Some(event)) => Some((Ok(event), reader)),
                Ok(None) => None,
                Err(e) => Some((Err(e), reader)),
            }
        }))
    }
}

impl std::fmt::Debug for StreamReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamReader")
            .field("open", &self.source.is_some())
            .field("pending_bytes", &self.lines.pending_bytes())
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn source(chunks: Vec<&'static [u8]>) -> ByteStream {
        Box::pin(stream::iter(
            chunks.into_iter().map(|c| Ok(Bytes::from_static(c))),
        ))
    }

    #[test]
    fn assembler_applies_event_names_until_blank_line() {
        let mut asm = EventAssembler::default();
        assert!(asm.line("event: response.output_text.delta").is_none());
        let ev = asm.line("data: {\"delta\":\"hi\"}").unwrap();
        assert_eq!(ev.event_type, "response.output_text.delta");
        assert!(asm.line("").is_none());
        let ev = asm.line("data: {\"object\":\"chunk\"}").unwrap();
        assert_eq!(ev.event_type, "message");
        assert!(asm.line(": keep-alive").is_none());
        assert!(asm.line("id: 7").is_none());
    }

    #[test]
    fn done_and_text_payloads() {
        let mut asm = EventAssembler::default();
        let done = asm.line("data: [DONE]").unwrap();
        assert!(done.is_final);
        assert_eq!(done.event_type, "done");
        let text = asm.line("data: plain words").unwrap();
        assert_eq!(text.data, EventData::Text("plain words".into()));
    }

    #[tokio::test]
    async fn final_event_does_not_stop_iteration() {
        let mut reader = StreamReader::new(source(vec![
            b"data: {\"type\":\"response.completed\"}\n\n",
            b"data: {\"type\":\"late\"}\n\n",
        ]));
        let first = reader.next_event().await.unwrap().unwrap();
        assert!(first.is_final);
        let second = reader.next_event().await.unwrap().unwrap();
        assert_eq!(second.event_type, "late");
        assert!(reader.next_event().await.unwrap().is_none());
        assert!(reader.is_closed());
    }

    #[tokio::test]
    async fn close_and_cancel_end_the_stream() {
        let mut reader = StreamReader::new(source(vec![b"data: {\"a\":1}\n\ndata: {\"a\":2}\n\n"]));
        assert!(reader.next_event().await.unwrap().is_some());
        reader.close();
        assert!(reader.next_event().await.unwrap().is_none());

        let pending: ByteStream = Box::pin(stream::pending());
        let mut reader = StreamReader::new(pending);
        reader.cancel_handle().cancel();
        assert!(matches!(reader.next_event().await, Err(Error::Cancelled)));
        assert!(reader.next_event().await.unwrap().is_none());
    }

    #[test]
    fn idle_source_stays_pending_until_cancelled() {
        let pending: ByteStream = Box::pin(stream::pending());
        let mut reader = StreamReader::new(pending);
        let token = reader.cancel_handle();
        let mut next = tokio_test::task::spawn(reader.next_event());
        tokio_test::assert_pending!(next.poll());
        token.cancel();
        let outcome = tokio_test::assert_ready!(next.poll());
        assert!(matches!(outcome, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn cancel_discards_buffered_lines() {
        let mut reader = StreamReader::new(source(vec![b"data: {\"a\":1}\n\ndata: {\"a\":2}\n\n"]));
        assert!(reader.next_event().await.unwrap().is_some());
        reader.cancel_handle().cancel();
        assert!(matches!(reader.next_event().await, Err(Error::Cancelled)));
        assert!(reader.is_closed());
    }
}

//! Server-sent event decoding.
//!
//! [`lines`] turns the raw chunks produced by [`crate::transport::HttpTransport::stream_sse`] into
//! complete lines regardless of how the network fragmented them; [`StreamReader`] assembles those
//! lines into [`crate::types::StreamEvent`]s on demand.

mod lines;
mod reader;

pub use lines::{lines, LineBuffer};
pub use reader::StreamReader;

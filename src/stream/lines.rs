//! Incremental line splitting over fragmented byte chunks.

use crate::BoxStream;
use bytes::{Buf, BytesMut};
use futures::{stream, StreamExt};

/// Accumulates raw bytes and hands out complete lines only.
///
/// Lines end at `\n`; a preceding `\r` is stripped. Bytes are decoded per complete line, so a
/// multi-byte character split across chunks is never mangled.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: BytesMut,
    // Prefix of `buf` already known to hold no newline.
    scanned: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// The next complete line, without its terminator.
    pub fn next_line(&mut self) -> Option<String> {
        let Some(offset) = self.buf[self.scanned..].iter().position(|b| *b == b'\n') else {
            self.scanned = self.buf.len();
            return None;
        };
        let idx = self.scanned + offset;
        self.scanned = 0;
        let mut line = self.buf.split_to(idx);
        self.buf.advance(1);
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Append `chunk` and drain every line it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.push(chunk);
        std::iter::from_fn(|| self.next_line()).collect()
    }

    /// Whatever trails the last newline, once the source has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        self.scanned = 0;
        let rest = self.buf.split();
        let rest = rest.strip_suffix(b"\r").unwrap_or(&rest);
        Some(String::from_utf8_lossy(rest).into_owned())
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.scanned = 0;
    }

    pub fn pending_bytes(&self) -> usize {
        self.buf.len()
    }
}

/// Lazily split a byte stream into lines, blank separator lines included.
pub fn lines(source: BoxStream<'static, bytes::Bytes>) -> BoxStream<'static, String> {
    let stream = stream::unfold(
        (Some(source), LineBuffer::new()),
        |(mut source, mut buf)| async move {
            loop {
                if let Some(line) = buf.next_line() {
                    return Some((Ok(line), (source, buf)));
                }
                let Some(input) = source.as_mut() else {
                    return buf.finish().map(|line| (Ok(line), (None, buf)));
                };
                match input.next().await {
                    Some(Ok(chunk)) => buf.push(&chunk),
                    Some(Err(e)) => {
                        buf.clear();
                        return Some((Err(e), (None, buf)));
                    }
                    None => source = None,
                }
            }
        },
    );
    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_lf_and_crlf() {
        let mut buf = LineBuffer::new();
        assert_eq!(buf.feed(b"a\r\nb\n\nc"), vec!["a", "b", ""]);
        assert_eq!(buf.pending_bytes(), 1);
        assert_eq!(buf.feed(b"d\r"), Vec::<String>::new());
        assert_eq!(buf.feed(b"\n"), vec!["cd"]);
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn multibyte_characters_survive_any_split() {
        let text = "héllo → wörld\n";
        let bytes = text.as_bytes();
        for cut in 1..bytes.len() {
            let mut buf = LineBuffer::new();
            let mut out = buf.feed(&bytes[..cut]);
            out.extend(buf.feed(&bytes[cut..]));
            assert_eq!(out, vec!["héllo → wörld"], "cut at {cut}");
        }
    }

    #[test]
    fn long_line_in_tiny_fragments_is_scanned_once() {
        let mut buf = LineBuffer::new();
        let payload = "x".repeat(4096);
        for b in payload.as_bytes() {
            assert!(buf.feed(&[*b]).is_empty());
            assert_eq!(buf.scanned, buf.pending_bytes());
        }
        assert_eq!(buf.feed(b"\r\nnext"), vec![payload]);
        assert_eq!(buf.scanned, 4);
        assert_eq!(buf.feed(b"\n"), vec!["next"]);
    }

    #[test]
    fn trailing_content_is_flushed() {
        let mut buf = LineBuffer::new();
        assert!(buf.feed(b"data: {\"x\":1}").is_empty());
        assert_eq!(buf.finish().as_deref(), Some("data: {\"x\":1}"));
        assert_eq!(buf.pending_bytes(), 0);
    }
}

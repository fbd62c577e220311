//! Shared fixtures for integration tests.

#![allow(dead_code)]

use ai_dispatch::config::ClientConfig;
use ai_dispatch::{DispatchClient, HttpTransport, RetryPolicy, UnifiedRequest};
use mockito::{Mock, Server, ServerGuard};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

/// Install a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Retry policy with `attempts` attempts and no sleeping between them.
pub fn instant_retry(attempts: u32) -> RetryPolicy {
    RetryPolicy::default()
        .with_max_attempts(attempts)
        .with_initial_delay(Duration::ZERO)
        .with_max_delay(Duration::ZERO)
        .with_jitter(false)
}

/// Test fixture that owns a mock server mounted under `/v1`.
pub struct MockServerFixture {
    pub server: ServerGuard,
    pub base_url: String,
}

impl MockServerFixture {
    pub async fn new() -> Self {
        init_tracing();
        let server = Server::new_async().await;
        let base_url = format!("{}/v1", server.url());
        Self { server, base_url }
    }

    pub fn config(&self, attempts: u32) -> ClientConfig {
        ClientConfig {
            api_key: Some("sk-test".into()),
            retry: instant_retry(attempts),
            ..ClientConfig::new(self.base_url.clone())
        }
    }

    pub fn transport(&self, attempts: u32) -> HttpTransport {
        HttpTransport::new(&self.config(attempts)).expect("transport")
    }

    pub fn client(&self, attempts: u32) -> DispatchClient {
        DispatchClient::builder()
            .config(self.config(attempts))
            .build()
            .expect("client")
    }

    /// Mock a JSON answer on `POST /v1{path}`.
    pub async fn mock_json_response(&mut self, path: &str, status: usize, body: &str) -> Mock {
        self.server
            .mock("POST", format!("/v1{}", path).as_str())
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    /// Mock an event stream on `POST /v1{path}`; bare payloads get a `data: ` prefix.
    pub async fn mock_sse_stream(&mut self, path: &str, frames: &[&str]) -> Mock {
        let body = frames
            .iter()
            .map(|frame| {
                if frame.starts_with("data: ") || frame.starts_with("event: ") {
                    format!("{}\n\n", frame)
                } else {
                    format!("data: {}\n\n", frame)
                }
            })
            .collect::<String>();
        self.server
            .mock("POST", format!("/v1{}", path).as_str())
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await
    }
}

pub fn request(value: serde_json::Value) -> UnifiedRequest {
    UnifiedRequest::from_value(value).expect("object payload")
}

/// Write `bytes` to `name` inside `dir`.
pub fn fixture_file(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).expect("create fixture");
    f.write_all(bytes).expect("write fixture");
    path
}

/// A ~3 KB file that starts like an MP3 (ID3 tag).
pub fn mp3_bytes() -> Vec<u8> {
    let mut bytes = b"ID3\x03\x00\x00\x00\x00\x00\x0a".to_vec();
    bytes.resize(3 * 1024, 0xAA);
    bytes
}

/// Smallest header a PNG sniffer recognises.
pub fn png_bytes() -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01\x08\x06\0\0\0".to_vec();
    bytes.resize(256, 0);
    bytes
}

use super::decode::{decode_body, extract_error_message};
use super::retry::{backoff_delay, generate_idempotency_key, is_retryable_status};
use super::{CallKind, CallOptions, TransportError, CORRELATION_HEADER, IDEMPOTENCY_HEADER};
use crate::adapters::{MultipartBody, WireRequest};
use crate::config::{ClientConfig, RetryPolicy};
use crate::types::WireResponse;
use crate::{BoxStream, Error, ErrorContext, Result};
use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Raw body chunks of an event-stream response.
pub type ByteStream = BoxStream<'static, Bytes>;

/// Pooled HTTP client bound to one base URL and one retry policy.
///
/// Holds configuration only; concurrent calls share nothing mutable beyond the connection pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    retry: RetryPolicy,
    idempotency: bool,
    default_headers: HashMap<String, String>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        // Total timeouts are applied per request so long-lived event streams are not cut off.
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .http2_adaptive_window(true)
            .http2_keep_alive_interval(Some(Duration::from_secs(30)))
            .http2_keep_alive_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout: config.timeout(),
            retry: config.retry.clone(),
            idempotency: config.idempotency,
            default_headers: config.default_headers.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// POST a JSON body (create call).
    pub async fn post_json(
        &self,
        path: &str,
        payload: &Value,
        options: &CallOptions,
    ) -> Result<WireResponse> {
        let resp = self
            .execute(CallKind::Create, path, options, |client, url| {
                Ok(client.post(url).json(payload).timeout(self.timeout))
            })
            .await?;
        decode_response(resp, path).await
    }

    /// POST a multipart form (create call). Files are streamed from disk and the form is
    /// rebuilt for every attempt.
    pub async fn post_multipart(
        &self,
        path: &str,
        body: &MultipartBody,
        options: &CallOptions,
    ) -> Result<WireResponse> {
        let resp = self
            .execute(CallKind::Create, path, options, |client, url| {
                Ok(client
                    .post(url)
                    .multipart(build_form(body)?)
                    .timeout(self.timeout))
            })
            .await?;
        decode_response(resp, path).await
    }

    /// POST whichever body an adapter produced.
    pub async fn post(
        &self,
        path: &str,
        request: &WireRequest,
        options: &CallOptions,
    ) -> Result<WireResponse> {
        match request {
            WireRequest::Json(payload) => self.post_json(path, payload, options).await,
            WireRequest::Multipart(body) => self.post_multipart(path, body, options).await,
        }
    }

    /// GET a JSON document. Single attempt, no idempotency key.
    pub async fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
        options: &CallOptions,
    ) -> Result<Value> {
        let resp = self
            .execute(CallKind::Read, path, options, |client, url| {
                Ok(client.get(url).query(query).timeout(self.timeout))
            })
            .await?;
        match decode_response(resp, path).await? {
            WireResponse::Json(v) => Ok(v),
            WireResponse::Binary { content_type, .. } => Err(Error::decode_with_context(
                format!(
                    "expected JSON, got {}",
                    content_type.as_deref().unwrap_or("an untyped body")
                ),
                ErrorContext::new()
                    .with_source("transport")
                    .with_details(path.to_string()),
            )),
        }
    }

    /// GET a body verbatim (binary downloads).
    pub async fn get_content(&self, path: &str, options: &CallOptions) -> Result<Bytes> {
        let resp = self
            .execute(CallKind::Read, path, options, |client, url| {
                Ok(client.get(url).timeout(self.timeout))
            })
            .await?;
        resp.bytes()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))
    }

    /// DELETE a resource. `Ok(false)` when it does not exist or the server reports
    /// `"deleted": false`.
    pub async fn delete(&self, path: &str, options: &CallOptions) -> Result<bool> {
        let outcome = self
            .execute(CallKind::Mutate, path, options, |client, url| {
                Ok(client.delete(url).timeout(self.timeout))
            })
            .await;
        let resp = match outcome {
            Ok(resp) => resp,
            Err(Error::ApiResponse { status: 404, .. }) => return Ok(false),
            Err(e) => return Err(e),
        };
        let body = resp
            .bytes()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;
        let deleted = serde_json::from_slice::<Value>(&body)
            .ok()
            .and_then(|v| v.get("deleted").and_then(Value::as_bool));
        Ok(deleted.unwrap_or(true))
    }

    /// POST a JSON body and return the raw event-stream chunks.
    ///
    /// Retries cover the exchange up to the response head; once bytes flow the stream is never
    /// restarted. The body always carries `stream: true`.
    pub async fn stream_sse(
        &self,
        path: &str,
        payload: &Value,
        options: &CallOptions,
    ) -> Result<ByteStream> {
        let mut payload = payload.clone();
        if let Value::Object(map) = &mut payload {
            map.insert("stream".into(), Value::Bool(true));
        }
        let resp = self
            .execute(CallKind::Stream, path, options, |client, url| {
                Ok(client
                    .post(url)
                    .json(&payload)
                    .header(ACCEPT, "text/event-stream"))
            })
            .await?;
        debug!(path, "event stream opened");
        Ok(Box::pin(
            resp.bytes_stream()
                .map_err(|e| Error::Transport(TransportError::Http(e))),
        ))
    }

    /// Ids of the models the remote side exposes.
    pub async fn list_models(&self, options: &CallOptions) -> Result<Vec<String>> {
        let doc = self.get_json("/models", &[], options).await?;
        Ok(doc
            .get("data")
            .and_then(Value::as_array)
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m.get("id").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Run one logical call: attempts are strictly sequential and share one idempotency key,
    /// one correlation id and an identical payload.
    async fn execute<F>(
        &self,
        kind: CallKind,
        path: &str,
        options: &CallOptions,
        build: F,
    ) -> Result<reqwest::Response>
    where
        F: Fn(&reqwest::Client, &str) -> Result<reqwest::RequestBuilder>,
    {
        let url = self.url(path);
        let policy = options.retry.as_ref().unwrap_or(&self.retry);
        let max_attempts = if kind.is_retried() {
            policy.effective_attempts()
        } else {
            1
        };
        let idempotency_key = (self.idempotency && kind.carries_idempotency_key()).then(|| {
            options
                .idempotency_key
                .clone()
                .unwrap_or_else(generate_idempotency_key)
        });
        let correlation_id = options
            .correlation_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let cancel = options.cancel.as_ref();
        let start = Instant::now();

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let request = self.decorate(
                build(&self.client, &url)?,
                options,
                &correlation_id,
                idempotency_key.as_deref(),
            );

            let reason = match with_cancel(cancel, request.send()).await? {
                Ok(resp) if resp.status().is_success() => {
                    info!(
                        http_status = resp.status().as_u16(),
                        path,
                        kind = kind.as_str(),
                        attempts = attempt,
                        duration_ms = start.elapsed().as_millis() as u64,
                        correlation_id = correlation_id.as_str(),
                        "request completed"
                    );
                    return Ok(resp);
                }
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if !is_retryable_status(status) || attempt >= max_attempts {
                        info!(
                            http_status = status,
                            path,
                            kind = kind.as_str(),
                            attempts = attempt,
                            duration_ms = start.elapsed().as_millis() as u64,
                            correlation_id = correlation_id.as_str(),
                            "request failed"
                        );
                        return Err(api_error(resp, path, attempt).await);
                    }
                    format!("HTTP {}", status)
                }
                Err(e) if attempt >= max_attempts => {
                    warn!(path, attempts = attempt, error = %e, "request failed without a response");
                    return Err(if max_attempts == 1 {
                        Error::Transport(TransportError::Http(e))
                    } else {
                        Error::MaxRetriesExceeded {
                            attempts: attempt,
                            message: e.to_string(),
                        }
                    });
                }
                Err(e) => e.to_string(),
            };

            let delay = backoff_delay(policy, attempt);
            warn!(
                path,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                reason = reason.as_str(),
                "retrying request"
            );
            if !delay.is_zero() {
                with_cancel(cancel, tokio::time::sleep(delay)).await?;
            }
        }
    }

    fn decorate(
        &self,
        mut request: reqwest::RequestBuilder,
        options: &CallOptions,
        correlation_id: &str,
        idempotency_key: Option<&str>,
    ) -> reqwest::RequestBuilder {
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        for (k, v) in self.default_headers.iter().chain(options.headers.iter()) {
            request = request.header(k.as_str(), v.as_str());
        }
        request = request.header(CORRELATION_HEADER, correlation_id);
        if let Some(key) = idempotency_key {
            request = request.header(IDEMPOTENCY_HEADER, key);
        }
        request
    }
}

/// Resolve `fut` unless `cancel` fires first.
async fn with_cancel<F: Future>(cancel: Option<&CancellationToken>, fut: F) -> Result<F::Output> {
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled),
            out = fut => Ok(out),
        },
        None => Ok(fut.await),
    }
}

async fn decode_response(resp: reqwest::Response, path: &str) -> Result<WireResponse> {
    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = resp
        .bytes()
        .await
        .map_err(|e| Error::Transport(TransportError::Http(e)))?;
    decode_body(content_type, body, path)
}

async fn api_error(resp: reqwest::Response, path: &str, attempts: u32) -> Error {
    let status = resp.status();
    let request_id = resp
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = resp.text().await.unwrap_or_default();
    let mut message = extract_error_message(&body);
    if message.is_empty() {
        message = status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string();
    }

    let mut context = ErrorContext::new()
        .with_status_code(status.as_u16())
        .with_attempts(attempts)
        .with_source("transport")
        .with_details(path.to_string());
    if let Some(id) = request_id {
        context = context.with_request_id(id);
    }
    Error::ApiResponse {
        status: status.as_u16(),
        message,
        attempts,
        context,
    }
}

fn build_form(body: &MultipartBody) -> Result<Form> {
    let mut form = Form::new();
    for (name, value) in &body.fields {
        form = form.text(name.clone(), value.clone());
    }
    for file in &body.files {
        let handle = std::fs::File::open(&file.path).map_err(|e| {
            Error::file_validation(
                file.path.display().to_string(),
                format!("file is not readable: {}", e),
            )
        })?;
        let stream = ReaderStream::new(tokio::fs::File::from_std(handle));
        let mut part = Part::stream_with_length(reqwest::Body::wrap_stream(stream), file.size)
            .file_name(file.file_name.clone());
        if let Some(mime) = &file.mime {
            part = part
                .mime_str(mime)
                .map_err(|e| Error::Transport(TransportError::Http(e)))?;
        }
        form = form.part(file.field.clone(), part);
    }
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slashes() {
        let transport = HttpTransport::new(&ClientConfig::new("http://localhost:9/v1/")).unwrap();
        assert_eq!(transport.url("/responses"), "http://localhost:9/v1/responses");
        assert_eq!(transport.url("models"), "http://localhost:9/v1/models");
    }

    #[tokio::test]
    async fn cancelled_token_wins_the_race() {
        let token = CancellationToken::new();
        token.cancel();
        let out = with_cancel(Some(&token), tokio::time::sleep(Duration::from_secs(60))).await;
        assert!(matches!(out, Err(Error::Cancelled)));
    }
}

//! HTTP client for forwarding chat messages to the upstream webhook

use crate::{
    error::AppError,
    resolver::WebhookTarget,
    types::{PingResult, RelayBody, RelayResult, BODY_SNIPPET_LIMIT},
    utils::{is_json_content_type, redact_url, truncate_chars},
    Result,
};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE},
    Client, RequestBuilder, Response, StatusCode,
};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Upper bound on bytes read from an error body. Four bytes per character
/// covers the snippet for any UTF-8 input.
const ERROR_BODY_BYTE_LIMIT: usize = BODY_SNIPPET_LIMIT * 4;

struct UpstreamReply {
    status: StatusCode,
    content_type: Option<String>,
    body: String,
}

enum ExchangeFailure {
    Timeout,
    Transport(String),
}

#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: Client,
}

impl WebhookClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("chat-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Forward `body` to the target with a single POST attempt. `session_id`
    /// only tags the log line.
    pub async fn execute(
        &self,
        request_id: &str,
        session_id: Option<&str>,
        target: &WebhookTarget,
        body: &Value,
        timeout: Duration,
    ) -> RelayResult {
        let started = Instant::now();

        let result = match build_headers(target, true) {
            Ok(headers) => {
                let request = self
                    .client
                    .post(&target.url)
                    .headers(headers)
                    .json(body)
                    .timeout(timeout);
                match self.exchange(request, timeout).await {
                    Ok(reply) => classify(reply),
                    Err(ExchangeFailure::Timeout) => RelayResult::Timeout,
                    Err(ExchangeFailure::Transport(message)) => {
                        RelayResult::TransportError { message }
                    }
                }
            }
            Err(message) => RelayResult::TransportError { message },
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let upstream = redact_url(&target.url);
        match &result {
            RelayResult::Success { .. } => info!(
                request_id,
                session_id,
                upstream = %upstream,
                credential = target.credential.as_str(),
                outcome = result.kind(),
                elapsed_ms,
                "webhook relay completed"
            ),
            RelayResult::UpstreamError { status_code, .. } => warn!(
                request_id,
                session_id,
                upstream = %upstream,
                credential = target.credential.as_str(),
                outcome = result.kind(),
                upstream_status = *status_code,
                elapsed_ms,
                "webhook relay rejected by upstream"
            ),
            RelayResult::TransportError { message } => warn!(
                request_id,
                session_id,
                upstream = %upstream,
                credential = target.credential.as_str(),
                outcome = result.kind(),
                error = %message,
                elapsed_ms,
                "webhook relay failed"
            ),
            _ => warn!(
                request_id,
                session_id,
                upstream = %upstream,
                credential = target.credential.as_str(),
                outcome = result.kind(),
                elapsed_ms,
                "webhook relay failed"
            ),
        }

        result
    }

    /// Reachability probe: a bodiless GET whose status is passed through.
    pub async fn ping(&self, request_id: &str, target: &WebhookTarget, timeout: Duration) -> PingResult {
        let started = Instant::now();

        let result = match build_headers(target, false) {
            Ok(headers) => {
                let request = self.client.get(&target.url).headers(headers).timeout(timeout);
                match self.exchange(request, timeout).await {
                    Ok(reply) => passthrough(reply),
                    Err(ExchangeFailure::Timeout) => PingResult::Timeout,
                    Err(ExchangeFailure::Transport(message)) => PingResult::TransportError { message },
                }
            }
            Err(message) => PingResult::TransportError { message },
        };

        let status = match &result {
            PingResult::Reply { status_code, .. } => Some(*status_code),
            _ => None,
        };
        info!(
            request_id,
            upstream = %redact_url(&target.url),
            outcome = result.kind(),
            upstream_status = ?status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "webhook ping completed"
        );

        result
    }

    /// Send the request and read the reply under a hard wall-clock limit.
    async fn exchange(
        &self,
        request: RequestBuilder,
        timeout: Duration,
    ) -> std::result::Result<UpstreamReply, ExchangeFailure> {
        let call = async {
            let response = request.send().await?;
            let status = response.status();
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = if status.as_u16() >= 400 {
                read_capped(response, ERROR_BODY_BYTE_LIMIT).await?
            } else {
                response.text().await?
            };
            Ok::<_, reqwest::Error>(UpstreamReply {
                status,
                content_type,
                body,
            })
        };

        match tokio::time::timeout(timeout, call).await {
            Err(_) => Err(ExchangeFailure::Timeout),
            Ok(Err(e)) => Err(map_reqwest_error(e)),
            Ok(Ok(reply)) => Ok(reply),
        }
    }
}

/// Resolver headers merged over `Content-Type: application/json`. A resolver
/// header never replaces the content type.
fn build_headers(target: &WebhookTarget, with_json: bool) -> std::result::Result<HeaderMap, String> {
    let mut headers = HeaderMap::new();
    if with_json {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    for (name, value) in &target.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| format!("invalid header name: {}", name))?;
        if name == CONTENT_TYPE {
            continue;
        }
        let value = HeaderValue::from_str(value)
            .map_err(|_| format!("invalid value for header {}", name))?;
        headers.insert(name, value);
    }

    Ok(headers)
}

fn classify(reply: UpstreamReply) -> RelayResult {
    if reply.status.as_u16() >= 400 {
        return RelayResult::UpstreamError {
            status_code: reply.status.as_u16(),
            body_snippet: truncate_chars(&reply.body, BODY_SNIPPET_LIMIT),
        };
    }

    let declared_json = reply
        .content_type
        .as_deref()
        .map(is_json_content_type)
        .unwrap_or(false);

    if declared_json {
        match serde_json::from_str::<Value>(&reply.body) {
            Ok(value) => RelayResult::Success {
                body: RelayBody::Json(value),
            },
            Err(e) => RelayResult::TransportError {
                message: format!("upstream declared JSON but body did not parse: {}", e),
            },
        }
    } else {
        RelayResult::Success {
            body: RelayBody::Text(reply.body),
        }
    }
}

fn passthrough(reply: UpstreamReply) -> PingResult {
    let status_code = reply.status.as_u16();
    let declared_json = reply
        .content_type
        .as_deref()
        .map(is_json_content_type)
        .unwrap_or(false);

    let body = match declared_json
        .then(|| serde_json::from_str::<Value>(&reply.body).ok())
        .flatten()
    {
        Some(value) => RelayBody::Json(value),
        None if status_code >= 400 => RelayBody::Text(truncate_chars(&reply.body, BODY_SNIPPET_LIMIT)),
        None => RelayBody::Text(reply.body),
    };

    PingResult::Reply { status_code, body }
}

async fn read_capped(mut response: Response, max_bytes: usize) -> reqwest::Result<String> {
    let mut buf: Vec<u8> = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let room = max_bytes.saturating_sub(buf.len());
        buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
        if buf.len() >= max_bytes {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Map reqwest errors onto the relay taxonomy. The URL is dropped from the
/// message because it may carry the API key as a query parameter.
fn map_reqwest_error(error: reqwest::Error) -> ExchangeFailure {
    if error.is_timeout() {
        return ExchangeFailure::Timeout;
    }

    let error = error.without_url();
    let mut message = error.to_string();
    let mut source = std::error::Error::source(&error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = std::error::Error::source(cause);
    }
    ExchangeFailure::Transport(message)
}

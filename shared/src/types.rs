//! Common types used by the relay and its HTTP surface

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use validator::Validate;

/// Maximum number of characters of an upstream body kept in an error.
pub const BODY_SNIPPET_LIMIT: usize = 500;

/// Who wrote a chat message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Bot => "bot",
        }
    }
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Sender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Sender::User),
            "bot" => Ok(Sender::Bot),
            other => Err(format!("unknown sender: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatSession {
    pub id: String,
    pub user_name: String,
    pub user_email: String,
    pub created_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn new(user_name: impl Into<String>, user_email: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_name: user_name.into(),
            user_email: user_email.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChatSessionCreate {
    #[validate(length(min = 1, max = 100))]
    pub user_name: String,
    #[validate(email)]
    pub user_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub session_id: String,
    pub message: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(session_id: impl Into<String>, message: impl Into<String>, sender: Sender) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            message: message.into(),
            sender,
            timestamp: Utc::now(),
        }
    }
}

/// Inbound chat message as it will be forwarded upstream.
///
/// `extra` carries every caller-supplied field untouched; the named fields
/// are the ones the relay itself reads or stamps.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub session_id: Option<String>,
    pub message: String,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub received_at: DateTime<Utc>,
    pub extra: Map<String, Value>,
}

impl OutboundMessage {
    /// Validate a raw `POST /chat` body. Returns a reason string suitable for a
    /// `400 BAD_REQUEST`.
    pub fn from_payload(payload: Value) -> Result<Self, String> {
        let Value::Object(fields) = payload else {
            return Err("request body must be a JSON object".to_string());
        };

        let message = match fields.get("message") {
            Some(Value::String(text)) if !text.trim().is_empty() => text.clone(),
            Some(Value::String(_)) => return Err("message must not be empty".to_string()),
            Some(_) => return Err("message must be a string".to_string()),
            None => return Err("missing required field: message".to_string()),
        };

        let text_field = |key: &str| {
            fields
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .filter(|v| !v.trim().is_empty())
        };

        Ok(Self {
            session_id: text_field("session_id"),
            user_name: text_field("user_name"),
            user_email: text_field("user_email"),
            message,
            received_at: Utc::now(),
            extra: fields,
        })
    }

    /// Fill in user details from the stored session when the caller left them out.
    pub fn with_session(mut self, session: &ChatSession) -> Self {
        if self.user_name.is_none() {
            self.user_name = Some(session.user_name.clone());
            self.extra
                .insert("user_name".to_string(), Value::String(session.user_name.clone()));
        }
        if self.user_email.is_none() {
            self.user_email = Some(session.user_email.clone());
            self.extra
                .insert("user_email".to_string(), Value::String(session.user_email.clone()));
        }
        self
    }

    /// JSON object sent upstream: the caller's fields plus a server-stamped `receivedAt`.
    pub fn to_payload(&self) -> Value {
        let mut body = self.extra.clone();
        body.insert(
            "receivedAt".to_string(),
            Value::String(self.received_at.to_rfc3339()),
        );
        Value::Object(body)
    }
}

/// Upstream reply body: structured JSON or plain text.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayBody {
    Json(Value),
    Text(String),
}

impl RelayBody {
    /// Text to store as the bot's reply in the conversation history.
    pub fn reply_text(&self) -> String {
        match self {
            RelayBody::Json(value) => value
                .get("response")
                .and_then(Value::as_str)
                .or_else(|| value.get("message").and_then(Value::as_str))
                .map(str::to_string)
                .unwrap_or_else(|| match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                }),
            RelayBody::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    "(no response)".to_string()
                } else {
                    trimmed.to_string()
                }
            }
        }
    }

    fn into_json(self) -> Value {
        match self {
            RelayBody::Json(value) => value,
            RelayBody::Text(text) => json!({ "text": text }),
        }
    }
}

/// Outcome of one relay attempt. Every variant must be handled by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayResult {
    Success { body: RelayBody },
    UpstreamError { status_code: u16, body_snippet: String },
    Timeout,
    TransportError { message: String },
    ConfigError { reason: String },
}

impl RelayResult {
    /// Stable label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayResult::Success { .. } => "success",
            RelayResult::UpstreamError { .. } => "upstream_error",
            RelayResult::Timeout => "timeout",
            RelayResult::TransportError { .. } => "transport_error",
            RelayResult::ConfigError { .. } => "config_error",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RelayResult::Success { .. })
    }
}

impl IntoResponse for RelayResult {
    fn into_response(self) -> Response {
        match self {
            RelayResult::Success { body } => (StatusCode::OK, Json(body.into_json())).into_response(),
            RelayResult::UpstreamError {
                status_code,
                body_snippet,
            } => (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "code": "UPSTREAM_ERROR",
                    "status": status_code,
                    "body": body_snippet,
                })),
            )
                .into_response(),
            RelayResult::Timeout => {
                (StatusCode::GATEWAY_TIMEOUT, Json(json!({ "code": "TIMEOUT" }))).into_response()
            }
            RelayResult::TransportError { message } => (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "code": "TRANSPORT_ERROR", "message": message })),
            )
                .into_response(),
            RelayResult::ConfigError { reason } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "code": "CONFIG_ERROR", "reason": reason })),
            )
                .into_response(),
        }
    }
}

/// Outcome of the diagnostic reachability probe. Upstream statuses are
/// mirrored instead of being classified as failures.
#[derive(Debug, Clone, PartialEq)]
pub enum PingResult {
    Reply { status_code: u16, body: RelayBody },
    Timeout,
    TransportError { message: String },
    ConfigError { reason: String },
}

impl PingResult {
    pub fn kind(&self) -> &'static str {
        match self {
            PingResult::Reply { status_code, .. } if *status_code < 400 => "success",
            PingResult::Reply { .. } => "upstream_error",
            PingResult::Timeout => "timeout",
            PingResult::TransportError { .. } => "transport_error",
            PingResult::ConfigError { .. } => "config_error",
        }
    }
}

impl IntoResponse for PingResult {
    fn into_response(self) -> Response {
        match self {
            PingResult::Reply { status_code, body } => {
                let status = StatusCode::from_u16(status_code).unwrap_or(StatusCode::BAD_GATEWAY);
                (status, Json(body.into_json())).into_response()
            }
            PingResult::Timeout => RelayResult::Timeout.into_response(),
            PingResult::TransportError { message } => {
                RelayResult::TransportError { message }.into_response()
            }
            PingResult::ConfigError { reason } => RelayResult::ConfigError { reason }.into_response(),
        }
    }
}

/// Webhook override update request
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookOverrideUpdate {
    pub webhook_url: String,
}

/// Where the effective webhook URL comes from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WebhookSource {
    Override,
    Environment,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfigView {
    pub webhook_url: Option<String>,
    pub source: WebhookSource,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub store: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_requires_message() {
        assert!(OutboundMessage::from_payload(json!({})).is_err());
        assert!(OutboundMessage::from_payload(json!({ "message": "" })).is_err());
        assert!(OutboundMessage::from_payload(json!({ "message": "   " })).is_err());
        assert!(OutboundMessage::from_payload(json!({ "message": 42 })).is_err());
        assert!(OutboundMessage::from_payload(json!(["message"])).is_err());
    }

    #[test]
    fn test_payload_forwards_extra_fields() {
        let outbound = OutboundMessage::from_payload(json!({
            "message": "hi",
            "channel": "web",
            "receivedAt": "caller-value",
        }))
        .unwrap();

        let payload = outbound.to_payload();
        assert_eq!(payload["message"], "hi");
        assert_eq!(payload["channel"], "web");
        assert_ne!(payload["receivedAt"], "caller-value");
        assert!(payload["receivedAt"].as_str().is_some());
    }

    #[test]
    fn test_with_session_keeps_caller_values() {
        let session = ChatSession::new("Ana", "ana@example.com");
        let outbound = OutboundMessage::from_payload(json!({
            "message": "hi",
            "user_name": "Caller",
        }))
        .unwrap()
        .with_session(&session);

        assert_eq!(outbound.user_name.as_deref(), Some("Caller"));
        assert_eq!(outbound.user_email.as_deref(), Some("ana@example.com"));
        assert_eq!(outbound.to_payload()["user_email"], "ana@example.com");
    }

    #[test]
    fn test_reply_text_prefers_response_field() {
        let body = RelayBody::Json(json!({ "response": "hello", "message": "ignored" }));
        assert_eq!(body.reply_text(), "hello");

        let body = RelayBody::Json(json!({ "message": "from message" }));
        assert_eq!(body.reply_text(), "from message");

        let body = RelayBody::Json(json!({ "other": 1 }));
        assert_eq!(body.reply_text(), r#"{"other":1}"#);

        assert_eq!(RelayBody::Text("  \n".to_string()).reply_text(), "(no response)");
    }

    #[test]
    fn test_relay_result_status_mapping() {
        let cases = vec![
            (
                RelayResult::Success {
                    body: RelayBody::Json(json!({ "response": "hello" })),
                },
                StatusCode::OK,
            ),
            (
                RelayResult::Success {
                    body: RelayBody::Text("plain".to_string()),
                },
                StatusCode::OK,
            ),
            (
                RelayResult::UpstreamError {
                    status_code: 503,
                    body_snippet: "down".to_string(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (RelayResult::Timeout, StatusCode::GATEWAY_TIMEOUT),
            (
                RelayResult::TransportError {
                    message: "refused".to_string(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                RelayResult::ConfigError {
                    reason: "webhook not configured".to_string(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (result, expected) in cases {
            let kind = result.kind();
            assert_eq!(result.into_response().status(), expected, "{}", kind);
        }
    }

    #[test]
    fn test_ping_mirrors_upstream_status() {
        let result = PingResult::Reply {
            status_code: 404,
            body: RelayBody::Text("not here".to_string()),
        };
        assert_eq!(result.kind(), "upstream_error");
        assert_eq!(result.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            PingResult::Timeout.into_response().status(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }
}

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use shared::{
    resolver::{self, WebhookTarget},
    utils::excerpt,
    AppError, ChatMessage, ChatSession, ChatSessionCreate, OutboundMessage, PingResult,
    RelayResult, Result, Sender,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use validator::Validate;

use crate::observability::record_relay;
use crate::state::AppState;

/// Stored as the bot's reply when the relay did not produce one.
pub const FALLBACK_REPLY: &str =
    "I apologize, but I'm having trouble processing your request right now. Please try again later.";

/// Stored as the bot's reply when no upstream webhook could be resolved.
pub const NOT_CONFIGURED_REPLY: &str =
    "The chatbot is not fully configured yet. Please contact the administrator to set up the n8n webhook URL.";

const LOG_EXCERPT_CHARS: usize = 80;

/// POST /chat - forward one message upstream and return its reply
pub async fn relay_chat(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Response> {
    let Json(payload) = payload?;
    let mut outbound = OutboundMessage::from_payload(payload).map_err(AppError::bad_request)?;

    let request_id = uuid::Uuid::new_v4().to_string();
    info!(
        request_id = %request_id,
        session_id = ?outbound.session_id,
        message = %excerpt(&outbound.message, LOG_EXCERPT_CHARS),
        "chat message received"
    );

    if let Some(session_id) = outbound.session_id.clone() {
        let session = state
            .sessions
            .find_session(&session_id)
            .await?
            .ok_or_else(|| AppError::not_found("chat session"))?;
        outbound = outbound.with_session(&session);

        state
            .sessions
            .save_message(ChatMessage::new(&session_id, &outbound.message, Sender::User))
            .await?;
    }

    // Spawned so a client disconnect cannot cancel the relay before its
    // outcome is written to the history.
    let task_state = state.clone();
    let result = tokio::spawn(async move { relay_and_record(task_state, request_id, outbound).await })
        .await
        .map_err(|e| AppError::internal(format!("relay task failed: {}", e)))?;

    Ok(result.into_response())
}

async fn relay_and_record(
    state: Arc<AppState>,
    request_id: String,
    outbound: OutboundMessage,
) -> RelayResult {
    let started = Instant::now();

    let result = match resolve_target(&state, &request_id).await {
        Ok(target) => {
            state
                .webhook_client
                .execute(
                    &request_id,
                    outbound.session_id.as_deref(),
                    &target,
                    &outbound.to_payload(),
                    state.config.relay.message_timeout(),
                )
                .await
        }
        Err(reason) => RelayResult::ConfigError { reason },
    };

    record_relay("message", result.kind(), started.elapsed().as_secs_f64());

    if let Some(session_id) = &outbound.session_id {
        let reply = match &result {
            RelayResult::Success { body } => body.reply_text(),
            RelayResult::ConfigError { .. } => NOT_CONFIGURED_REPLY.to_string(),
            _ => FALLBACK_REPLY.to_string(),
        };
        if let Err(e) = state
            .sessions
            .save_message(ChatMessage::new(session_id, reply, Sender::Bot))
            .await
        {
            error!(request_id = %request_id, "failed to store bot reply: {}", e);
        }
    }

    result
}

/// Resolve the upstream target, merging the persisted override with the
/// environment snapshot. Failures come back as a config-error reason.
pub(crate) async fn resolve_target(
    state: &AppState,
    request_id: &str,
) -> std::result::Result<WebhookTarget, String> {
    let override_url = match state.config_store.get_override_url().await {
        Ok(url) => url,
        Err(e) => {
            error!(request_id, "failed to read webhook override: {}", e);
            return Err("webhook configuration unavailable".to_string());
        }
    };

    resolver::resolve(&state.config.webhook, override_url.as_deref()).map_err(|e| {
        warn!(request_id, reason = %e, "webhook target could not be resolved");
        e.reason
    })
}

/// GET /chat/ping - diagnostic reachability check against the upstream
pub async fn ping_upstream(State(state): State<Arc<AppState>>) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let started = Instant::now();

    let result = match resolve_target(&state, &request_id).await {
        Ok(target) => {
            state
                .webhook_client
                .ping(&request_id, &target, state.config.relay.ping_timeout())
                .await
        }
        Err(reason) => PingResult::ConfigError { reason },
    };

    record_relay("ping", result.kind(), started.elapsed().as_secs_f64());
    result.into_response()
}

/// POST /chat/session
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<ChatSessionCreate>, JsonRejection>,
) -> Result<Json<ChatSession>> {
    let Json(req) = payload?;
    req.validate()?;

    let session = state
        .sessions
        .create_session(ChatSession::new(req.user_name.trim(), req.user_email.trim()))
        .await?;

    info!(session_id = %session.id, "Created chat session");
    Ok(Json(session))
}

/// GET /chat/messages/:session_id
pub async fn get_messages(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>> {
    if state.sessions.find_session(&session_id).await?.is_none() {
        return Err(AppError::not_found("chat session"));
    }

    let messages = state.sessions.list_messages(&session_id).await?;
    Ok(Json(messages))
}

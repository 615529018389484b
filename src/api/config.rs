use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::{json, Value};
use shared::{
    resolver::{base_target, TargetSource},
    utils::{is_http_url, redact_url},
    AppError, Result, WebhookConfigView, WebhookOverrideUpdate, WebhookSource,
};
use std::sync::Arc;
use tracing::info;

use crate::state::AppState;

/// GET /chat/config - the URL the relay would call right now. The API key is
/// never included, even when it travels as a query parameter.
pub async fn get_config(State(state): State<Arc<AppState>>) -> Result<Json<WebhookConfigView>> {
    let override_url = state.config_store.get_override_url().await?;

    let view = match base_target(&state.config.webhook, override_url.as_deref()) {
        Ok((url, TargetSource::Override)) => WebhookConfigView {
            webhook_url: Some(url),
            source: WebhookSource::Override,
        },
        Ok((url, _)) => WebhookConfigView {
            webhook_url: Some(url),
            source: WebhookSource::Environment,
        },
        Err(_) => WebhookConfigView {
            webhook_url: None,
            source: WebhookSource::None,
        },
    };

    Ok(Json(view))
}

/// PUT /chat/config - replace the override URL
pub async fn update_config(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<WebhookOverrideUpdate>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(update) = payload?;
    let webhook_url = update.webhook_url.trim().to_string();

    if webhook_url.is_empty() {
        return Err(AppError::validation("webhook_url must not be empty"));
    }
    if !is_http_url(&webhook_url) {
        return Err(AppError::validation("webhook_url must be an absolute http(s) URL"));
    }

    state.config_store.set_override_url(webhook_url.clone()).await?;
    info!(upstream = %redact_url(&webhook_url), "Updated webhook override URL");

    Ok(Json(json!({
        "message": "Configuration updated successfully",
        "webhook_url": webhook_url,
    })))
}

/// DELETE /chat/config - drop the override and fall back to the environment
pub async fn clear_config(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    state.config_store.clear_override_url().await?;
    info!("Cleared webhook override URL");

    Ok(Json(json!({ "message": "Configuration override cleared" })))
}

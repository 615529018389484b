pub mod chat;
pub mod config;
pub mod health;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::observability::metrics_handler;
use crate::state::AppState;

/// All HTTP routes, without middleware
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(metrics_handler))
        .route("/chat", post(chat::relay_chat))
        .route("/chat/ping", get(chat::ping_upstream))
        .route("/chat/session", post(chat::create_session))
        .route("/chat/messages/:session_id", get(chat::get_messages))
        .route(
            "/chat/config",
            get(config::get_config)
                .put(config::update_config)
                .delete(config::clear_config),
        )
}

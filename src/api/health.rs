use axum::{extract::State, Json};
use shared::HealthStatus;
use std::sync::Arc;

use crate::state::AppState;

/// GET /health - process liveness only; the upstream is not contacted
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy".to_string(),
        service: "chat-relay".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        store: state.store_kind.to_string(),
    })
}

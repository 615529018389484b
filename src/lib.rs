use axum::{extract::DefaultBodyLimit, middleware as axum_middleware, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod middleware;
pub mod observability;
pub mod state;

use api::create_api_router;
use middleware::get_cors_layer;
use observability::metrics_middleware;
use state::AppState;

/// Inbound chat bodies are small; anything larger is rejected before parsing.
const MAX_BODY_BYTES: usize = 1024 * 1024;

pub fn create_app_router(app_state: Arc<AppState>) -> Router {
    let cors = get_cors_layer(&app_state.config.app.cors_origins);

    create_api_router()
        .with_state(app_state)
        .layer(axum_middleware::from_fn(metrics_middleware))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

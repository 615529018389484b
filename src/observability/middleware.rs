// ============================================================================
// MIDDLEWARE PARA MÉTRICAS AUTOMÁTICAS
// ============================================================================

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::observability::record_http_request;

/// Label for requests that matched no route.
pub const UNMATCHED_ENDPOINT: &str = "unmatched";

/// Records method, route template, status and latency for every request.
/// The route template (`/chat/messages/:session_id`) keeps label cardinality
/// bounded by the router, not by client input.
pub async fn metrics_middleware(matched_path: Option<MatchedPath>, req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let endpoint = matched_path
        .as_ref()
        .map_or(UNMATCHED_ENDPOINT, |m| m.as_str())
        .to_string();

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16();
    record_http_request(&method, &endpoint, status, duration);

    response
}

// ============================================================================
// PROMETHEUS METRICS
// ============================================================================
// HTTP traffic and relay outcomes, scraped from GET /metrics
// ============================================================================

use lazy_static::lazy_static;
use prometheus::{register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec};

lazy_static! {
    // ========================================================================
    // HTTP REQUEST METRICS
    // ========================================================================

    /// Total HTTP requests by method, endpoint and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "endpoint", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "endpoint"],
        vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .unwrap();

    // ========================================================================
    // RELAY METRICS
    // ========================================================================

    /// Relay attempts by operation (message/ping) and outcome kind
    pub static ref RELAY_OUTCOMES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "relay_outcomes_total",
        "Upstream webhook relay attempts by outcome",
        &["operation", "outcome"]
    )
    .unwrap();

    /// Wall-clock time spent waiting on the upstream
    pub static ref RELAY_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "relay_duration_seconds",
        "Upstream webhook relay duration in seconds",
        &["operation"],
        vec![0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0]
    )
    .unwrap();
}

/// Helper para registrar una request HTTP
pub fn record_http_request(method: &str, endpoint: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, endpoint, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, endpoint])
        .observe(duration_secs);
}

/// Record one relay attempt.
pub fn record_relay(operation: &str, outcome: &str, duration_secs: f64) {
    RELAY_OUTCOMES_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();

    RELAY_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_relay_increments_counter() {
        let before = RELAY_OUTCOMES_TOTAL
            .with_label_values(&["message", "timeout"])
            .get();
        record_relay("message", "timeout", 0.2);
        let after = RELAY_OUTCOMES_TOTAL
            .with_label_values(&["message", "timeout"])
            .get();
        assert!(after > before);
    }
}

//! Prometheus metrics for canvas-server.
//!
//! Provides metrics collection and a Prometheus-compatible `/metrics` endpoint.

use axum::{extract::State, response::IntoResponse};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

// Metric names as constants for consistency
const COMPOSE_REQUESTS_TOTAL: &str = "canvas_compose_requests_total";
const COMPOSE_DURATION: &str = "canvas_compose_duration_seconds";
const ASSET_FETCHES_TOTAL: &str = "canvas_asset_fetches_total";
const ASSET_FETCH_RETRIES_TOTAL: &str = "canvas_asset_fetch_retries_total";
const ASSET_LISTINGS_TOTAL: &str = "canvas_asset_listings_total";
const VALIDATION_FAILURES_TOTAL: &str = "canvas_validation_failures_total";

/// Initialize metrics and return the Prometheus handle.
///
/// # Errors
///
/// Returns an error if the Prometheus recorder cannot be installed
/// (e.g., if another recorder is already installed).
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Prometheus metrics endpoint.
#[tracing::instrument(name = "metrics", skip(handle))]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}

/// Record a finished compose request.
///
/// # Arguments
///
/// * `endpoint` - "compose" or "canvas"
/// * `outcome` - "ok" or a [`canvas_compositor::ComposeError::kind`] tag
/// * `duration_secs` - Wall time from request to encoded bytes
pub fn record_compose(endpoint: &'static str, outcome: &'static str, duration_secs: f64) {
    counter!(
        COMPOSE_REQUESTS_TOTAL,
        "endpoint" => endpoint,
        "outcome" => outcome
    )
    .increment(1);
    histogram!(COMPOSE_DURATION, "endpoint" => endpoint).record(duration_secs);
}

/// Record a remote asset fetch.
///
/// # Arguments
///
/// * `outcome` - "ok", "status", "too_large" or "transport"
pub fn record_asset_fetch(outcome: &'static str) {
    counter!(ASSET_FETCHES_TOTAL, "outcome" => outcome).increment(1);
}

/// Record a retried asset fetch attempt.
pub fn record_asset_fetch_retry() {
    counter!(ASSET_FETCH_RETRIES_TOTAL).increment(1);
}

/// Record an asset listing call.
///
/// # Arguments
///
/// * `outcome` - "ok" or a catalog error tag
pub fn record_asset_listing(outcome: &'static str) {
    counter!(ASSET_LISTINGS_TOTAL, "outcome" => outcome).increment(1);
}

/// Record an input validation failure.
///
/// # Arguments
///
/// * `validation_type` - [`crate::validation::ValidationError::kind`]
pub fn record_validation_failure(validation_type: &'static str) {
    counter!(VALIDATION_FAILURES_TOTAL, "type" => validation_type).increment(1);
}

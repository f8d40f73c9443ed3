//! Liveness and readiness probes.
//!
//! `/health/live` answers as long as the process serves requests.
//! `/health/ready` (and the older `/health` alias) also proves the
//! compositor can decode, blend and encode.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::AppState;

/// Body of the readiness probe.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    /// `"healthy"` when the compositor self-test passes.
    pub status: &'static str,
    /// Crate version.
    pub version: &'static str,
    /// Per-component results.
    pub checks: HealthChecks,
}

/// Per-component readiness results.
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    /// A 1×1 composite round-tripped through the compositor.
    pub compositor: bool,
    /// Whether an asset listing service is wired in. Informational.
    pub asset_catalog: bool,
}

/// `GET /health/live`.
#[tracing::instrument(name = "liveness_probe")]
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// `GET /health/ready`: 503 when the compositor self-test fails.
///
/// Never touches the network, so a flaky asset host cannot pull the
/// instance out of rotation.
#[tracing::instrument(name = "readiness_probe", skip(state))]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<HealthStatus>) {
    let compositor = state.compositor.self_test();
    if !compositor {
        tracing::warn!("compositor self-test failed");
    }

    let body = HealthStatus {
        status: if compositor { "healthy" } else { "unhealthy" },
        version: env!("CARGO_PKG_VERSION"),
        checks: HealthChecks {
            compositor,
            asset_catalog: state.catalog().is_some(),
        },
    };
    let code = if compositor {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(body))
}

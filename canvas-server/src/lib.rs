//! # Overlay Canvas Server Library
//!
//! Shared types and functionality for the composition server.
//! This library is used by both the binary and integration tests.
//!
//! ```text
//! POST /api/compose ─┐
//!                    ├─ validate ─> AssetFetcher ─> Compositor ─> PNG/JPEG
//! POST /api/compose/canvas ─┘        (retry, cap)   (blocking pool)
//!
//! GET /api/assets/{folder} ─> AssetCatalog ─> [AssetRef]
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use canvas_compositor::{Compositor, ConfigError};
use metrics_exporter_prometheus::PrometheusHandle;
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

pub mod assets;
pub mod compose;
pub mod config;
pub mod error;
pub mod fetch;
pub mod health;
pub mod metrics;
pub mod validation;

pub use assets::{AssetCatalog, CatalogError, HttpAssetCatalog};
pub use config::ServerConfig;
pub use error::ApiError;
pub use fetch::{AssetFetcher, FetchConfig, RetryConfig};

/// Failures while assembling [`AppState`] from configuration.
#[derive(Debug, Error)]
pub enum SetupError {
    /// Composition settings out of range.
    #[error("invalid composition settings: {0}")]
    Composition(#[from] ConfigError),
    /// The asset fetch client could not be built.
    #[error("asset fetch client setup failed: {0}")]
    Fetcher(#[from] reqwest::Error),
    /// The listing service client could not be built.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Compositor, shared across requests; it holds no mutable state.
    pub compositor: Arc<Compositor>,
    /// Remote asset fetcher.
    pub fetcher: AssetFetcher,
    /// Optional asset listing collaborator.
    pub catalog: Option<Arc<dyn AssetCatalog>>,
    /// Largest accepted request body.
    pub body_limit: usize,
}

impl AppState {
    /// Create state without an asset catalog.
    #[must_use]
    pub fn new(compositor: Compositor, fetcher: AssetFetcher) -> Self {
        let body_limit = ServerConfig::default().body_limit();
        Self {
            compositor: Arc::new(compositor),
            fetcher,
            catalog: None,
            body_limit,
        }
    }

    /// Attach an asset catalog.
    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<dyn AssetCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Override the request body limit.
    #[must_use]
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    /// Build state from server configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError`] if the composition settings are invalid or an
    /// HTTP client cannot be built.
    pub fn from_config(config: &ServerConfig) -> Result<Self, SetupError> {
        let compositor = Compositor::new(config.composition()?);
        let fetch = config.fetch();
        let timeout: Duration = fetch.timeout;
        let mut state = Self::new(compositor, AssetFetcher::new(fetch)?)
            .with_body_limit(config.body_limit());

        if let Some(url) = &config.asset_listing_url {
            let catalog = HttpAssetCatalog::new(url, timeout)?;
            state = state.with_catalog(Arc::new(catalog));
        }
        Ok(state)
    }

    /// Get a reference to the optional asset catalog.
    #[must_use]
    pub fn catalog(&self) -> Option<&Arc<dyn AssetCatalog>> {
        self.catalog.as_ref()
    }
}

/// Build the application router.
///
/// `/metrics` is only mounted when a Prometheus handle is supplied; tests
/// run without a global recorder.
#[must_use]
pub fn build_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let body_limit = state.body_limit;
    let mut app = Router::new()
        // Health check endpoints (Kubernetes probes)
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/health", get(health::readiness)) // Backward compatible
        .route("/api/compose", post(compose::compose_handler))
        .route("/api/compose/canvas", post(compose::compose_canvas_handler))
        .route("/api/assets/{*folder}", get(assets::list_assets_handler))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state);

    if let Some(handle) = metrics_handle {
        let metrics_router = Router::new()
            .route("/metrics", get(metrics::metrics_handler))
            .with_state(handle);
        app = app.merge(metrics_router);
    }

    app.layer(
        ServiceBuilder::new()
            // Structured request tracing with timing
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_request(DefaultOnRequest::new().level(Level::INFO))
                    .on_response(DefaultOnResponse::new().level(Level::INFO)),
            )
            // Request ID for distributed tracing correlation
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(PropagateRequestIdLayer::x_request_id()),
    )
}

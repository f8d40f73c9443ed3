//! # Overlay Canvas Server
//!
//! Composition service for the overlay editor. Binds to localhost unless
//! `CANVAS_BIND` says otherwise.

use axum::http::{header, HeaderName, HeaderValue, Method};
use clap::Parser;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use canvas_server::assets::USER_ID_HEADER;
use canvas_server::compose::COMPOSE_TOKEN_HEADER;
use canvas_server::metrics;
use canvas_server::{build_router, AppState, ServerConfig};

/// Ports the editor's dev servers usually run on (Vite on 5173).
const DEV_PORTS: [u16; 3] = [3000, 5173, 8080];

/// CORS for the editor: localhost origins only, on our own port or a
/// dev-server port.
fn build_cors_layer(port: u16) -> CorsLayer {
    let origins: Vec<HeaderValue> = std::iter::once(port)
        .chain(DEV_PORTS)
        .flat_map(|p| [format!("http://localhost:{p}"), format!("http://127.0.0.1:{p}")])
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(COMPOSE_TOKEN_HEADER),
            HeaderName::from_static(USER_ID_HEADER),
        ])
        // The editor reads the token back to drop stale previews.
        .expose_headers([HeaderName::from_static(COMPOSE_TOKEN_HEADER)])
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the default filter; `RUST_LOG_FORMAT=json` switches
/// to JSON lines for log shippers.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,canvas_server=debug,tower_http=debug"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true);
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("RUST_LOG_FORMAT").is_ok_and(|v| v == "json") {
        registry.with(fmt_layer.json()).init();
    } else {
        registry.with(fmt_layer).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = ServerConfig::parse();

    let metrics_handle = metrics::init_metrics()
        .map_err(|e| anyhow::anyhow!("metrics recorder install failed: {e}"))?;

    let state = AppState::from_config(&config)?;
    tracing::info!(
        target_width_fraction = config.target_width_fraction,
        allow_upscale = config.allow_upscale,
        fetch_max_attempts = config.fetch_max_attempts,
        max_asset_bytes = config.max_asset_bytes,
        asset_listing = state.catalog().is_some(),
        "composition settings loaded"
    );

    let app = build_router(state, Some(metrics_handle)).layer(build_cors_layer(config.port));
    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "overlay canvas server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("overlay canvas server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "cannot listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

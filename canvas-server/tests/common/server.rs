//! Test server harness for integration tests.
//!
//! Provides a way to spin up the real router on a random port
//! for integration testing with HTTP clients.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use canvas_compositor::{CompositionConfig, Compositor};
use canvas_server::{build_router, AppState, AssetCatalog, AssetFetcher, FetchConfig, RetryConfig};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A test server instance with control handles.
pub struct TestServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

/// Fetch limits that keep retry tests fast.
pub fn fast_fetch_config() -> FetchConfig {
    FetchConfig {
        timeout: Duration::from_secs(2),
        retry: RetryConfig::new(3, 1, 5, 2.0),
        max_bytes: 1024 * 1024,
    }
}

/// State with the default compositor and fast fetch limits.
pub fn test_state() -> AppState {
    let fetcher = AssetFetcher::new(fast_fetch_config()).expect("fetcher");
    AppState::new(Compositor::new(CompositionConfig::default()), fetcher)
}

impl TestServer {
    /// Start a new test server on a random available port.
    ///
    /// # Panics
    ///
    /// Panics if no port is available or server fails to bind.
    pub async fn start() -> Self {
        Self::start_with(test_state()).await
    }

    /// Start a server whose asset listing goes to `catalog`.
    #[allow(dead_code)]
    pub async fn start_with_catalog(catalog: Arc<dyn AssetCatalog>) -> Self {
        Self::start_with(test_state().with_catalog(catalog)).await
    }

    /// Start a server with custom state.
    pub async fn start_with(state: AppState) -> Self {
        let port = portpicker::pick_unused_port().expect("no available port");
        let addr = SocketAddr::from(([127, 0, 0, 1], port));

        let app = build_router(state, None);

        let listener = TcpListener::bind(addr).await.expect("failed to bind");
        let actual_addr = listener.local_addr().expect("failed to get local addr");

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        // Spawn the server
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("server error");
        });

        // Give the server a moment to start
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;

        Self {
            addr: actual_addr,
            shutdown_tx: Some(shutdown_tx),
            handle,
        }
    }

    /// Get the server's socket address.
    #[allow(dead_code)]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// URL for a path on this server.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Get the compose endpoint URL.
    #[allow(dead_code)]
    pub fn compose_url(&self) -> String {
        self.url("/api/compose")
    }

    /// Get the canvas compose endpoint URL.
    #[allow(dead_code)]
    pub fn canvas_url(&self) -> String {
        self.url("/api/compose/canvas")
    }

    /// Gracefully shut down the server.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = tokio::time::timeout(tokio::time::Duration::from_secs(5), self.handle).await;
    }
}

//! Server configuration.
//!
//! Every option can come from the command line or the environment; the
//! environment variable names are the deployment contract.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use canvas_compositor::{CompositionConfig, ConfigError};
use canvas_core::DEFAULT_TARGET_WIDTH_FRACTION;
use clap::Parser;

use crate::fetch::{FetchConfig, RetryConfig};

/// Default port for the canvas server.
pub const DEFAULT_PORT: u16 = 9473; // "SAOR" on phone keypad

/// Default maximum size of a single asset (20 MiB).
pub const DEFAULT_MAX_ASSET_BYTES: usize = 20 * 1024 * 1024;

/// Full-size inline assets one request body can carry. Remote sources are
/// not counted against the body limit.
const INLINE_ASSETS_PER_REQUEST: usize = 4;

/// Overlay Canvas composition server.
#[derive(Debug, Clone, Parser)]
#[command(name = "overlay-canvas", version, about)]
pub struct ServerConfig {
    /// Port to listen on.
    #[arg(long, env = "CANVAS_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind.
    #[arg(long, env = "CANVAS_BIND", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub bind: IpAddr,

    /// Overlay width as a fraction of the base width at scale 1.
    #[arg(long, env = "CANVAS_TARGET_WIDTH_FRACTION", default_value_t = DEFAULT_TARGET_WIDTH_FRACTION)]
    pub target_width_fraction: f64,

    /// Allow overlays to be enlarged past their natural resolution.
    #[arg(long, env = "CANVAS_ALLOW_UPSCALE", default_value_t = false)]
    pub allow_upscale: bool,

    /// Per-attempt timeout for remote asset fetches, in seconds.
    #[arg(long, env = "CANVAS_FETCH_TIMEOUT_SECS", default_value_t = 10)]
    pub fetch_timeout_secs: u64,

    /// Attempts per remote asset, including the first.
    #[arg(long, env = "CANVAS_FETCH_MAX_ATTEMPTS", default_value_t = 3)]
    pub fetch_max_attempts: u32,

    /// Largest accepted asset, in bytes.
    #[arg(long, env = "CANVAS_MAX_ASSET_BYTES", default_value_t = DEFAULT_MAX_ASSET_BYTES)]
    pub max_asset_bytes: usize,

    /// Base URL of the asset listing service; listing is disabled without it.
    #[arg(long, env = "CANVAS_ASSET_LISTING_URL")]
    pub asset_listing_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            target_width_fraction: DEFAULT_TARGET_WIDTH_FRACTION,
            allow_upscale: false,
            fetch_timeout_secs: 10,
            fetch_max_attempts: 3,
            max_asset_bytes: DEFAULT_MAX_ASSET_BYTES,
            asset_listing_url: None,
        }
    }
}

impl ServerConfig {
    /// Address the listener binds.
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// Compositor settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WidthFraction`] if the fraction is out of range.
    pub fn composition(&self) -> Result<CompositionConfig, ConfigError> {
        CompositionConfig::new(self.target_width_fraction, self.allow_upscale)
    }

    /// Remote fetch settings.
    #[must_use]
    pub fn fetch(&self) -> FetchConfig {
        FetchConfig {
            timeout: Duration::from_secs(self.fetch_timeout_secs.max(1)),
            retry: RetryConfig {
                max_attempts: self.fetch_max_attempts.max(1),
                ..RetryConfig::default()
            },
            max_bytes: self.max_asset_bytes,
        }
    }

    /// Largest request body accepted. Inline assets travel base64-encoded,
    /// so each one needs a third more than the raw asset limit.
    #[must_use]
    pub fn body_limit(&self) -> usize {
        let per_asset = self.max_asset_bytes.saturating_mul(4) / 3 + 1024;
        per_asset.saturating_mul(INLINE_ASSETS_PER_REQUEST)
    }
}

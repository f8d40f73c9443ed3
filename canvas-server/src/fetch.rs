//! Remote asset fetching.
//!
//! Remote sources of a compose request are fetched through an
//! [`AssetFetcher`] with a per-attempt timeout, bounded retry for transient
//! failures, and a hard cap on body size. Failures surface as [`ComposeError::AssetFetchFailed`] naming the
//! asset so the caller can retry it.

use std::time::Duration;

use canvas_compositor::{ComposeError, ComposeResult};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::metrics;

/// Why a single fetch attempt failed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL could not be parsed or is not http(s).
    #[error("invalid asset URL: {0}")]
    InvalidUrl(String),
    /// Connection, TLS or timeout failure.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The asset host answered with a non-success status.
    #[error("asset host returned {0}")]
    Status(StatusCode),
    /// The body exceeded the configured limit.
    #[error("asset exceeds {limit} bytes")]
    TooLarge {
        /// Configured limit.
        limit: usize,
    },
}

impl FetchError {
    /// Returns true if another attempt could succeed: transport failures,
    /// timeouts, 5xx and 429. Other 4xx, oversized bodies and bad URLs are
    /// final.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status(status) => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::InvalidUrl(_) | Self::TooLarge { .. } => false,
        }
    }

    fn metric_tag(&self) -> &'static str {
        match self {
            Self::InvalidUrl(_) => "invalid_url",
            Self::Transport(_) => "transport",
            Self::Status(_) => "status",
            Self::TooLarge { .. } => "too_large",
        }
    }
}

/// Configuration for retry with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Initial delay between retries in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 2_000,
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with custom values.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        initial_delay_ms: u64,
        max_delay_ms: u64,
        multiplier: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay_ms,
            max_delay_ms,
            multiplier,
        }
    }

    /// Calculate delay for a given attempt number (0-indexed).
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_possible_wrap
    )]
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let base_delay = self.initial_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        let capped_delay = base_delay.min(self.max_delay_ms as f64) as u64;
        // Fixed half of a 25% jitter band; deterministic so tests can time it
        let jitter = (capped_delay / 4).max(1);
        capped_delay.saturating_add(jitter / 2)
    }
}

/// Remote fetch limits.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Timeout for each attempt.
    pub timeout: Duration,
    /// Retry policy for transient failures.
    pub retry: RetryConfig,
    /// Largest accepted body.
    pub max_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
            max_bytes: crate::config::DEFAULT_MAX_ASSET_BYTES,
        }
    }
}

/// Resolves asset sources to bytes. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AssetFetcher {
    http: Client,
    config: FetchConfig,
}

impl AssetFetcher {
    /// Create a fetcher.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: FetchConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(concat!("overlay-canvas/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;
        Ok(Self { http, config })
    }

    /// The active limits.
    #[must_use]
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch a URL, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::AssetFetchFailed`] with the last failure once
    /// retries are exhausted or a final failure occurs.
    #[tracing::instrument(name = "fetch_asset", skip(self), fields(attempts = tracing::field::Empty))]
    pub async fn fetch(&self, asset: &str, url: &str) -> ComposeResult<Vec<u8>> {
        let url = parse_url(url).map_err(|e| ComposeError::fetch(asset, e))?;
        let retry = &self.config.retry;
        let max_attempts = retry.max_attempts.max(1);

        for attempt in 0..max_attempts {
            tracing::Span::current().record("attempts", attempt + 1);
            let error = match self.fetch_once(&url).await {
                Ok(bytes) => {
                    metrics::record_asset_fetch("ok");
                    tracing::debug!(bytes = bytes.len(), "asset fetched");
                    return Ok(bytes);
                }
                Err(error) => error,
            };

            if error.is_retryable() && attempt + 1 < max_attempts {
                let delay = retry.delay_for_attempt(attempt);
                warn!(
                    "Fetching {} failed (attempt {}/{}), retrying in {}ms: {}",
                    asset,
                    attempt + 1,
                    max_attempts,
                    delay,
                    error
                );
                metrics::record_asset_fetch_retry();
                tokio::time::sleep(Duration::from_millis(delay)).await;
                continue;
            }

            metrics::record_asset_fetch(error.metric_tag());
            warn!(%asset, %error, "asset fetch failed");
            return Err(ComposeError::fetch(asset, error));
        }

        // Only reachable with zero attempts, which max(1) rules out
        Err(ComposeError::fetch(asset, "no fetch attempts made"))
    }

    async fn fetch_once(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let mut response = self.http.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let limit = self.config.max_bytes;
        let declared = response
            .content_length()
            .and_then(|len| usize::try_from(len).ok());
        if declared.is_some_and(|len| len > limit) {
            return Err(FetchError::TooLarge { limit });
        }

        let mut body = Vec::with_capacity(declared.unwrap_or(0));
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > limit {
                return Err(FetchError::TooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

fn parse_url(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::InvalidUrl(format!("unsupported scheme {other}"))),
    }
}

//! Asset listing collaborator.
//!
//! The editor offers logos and photos from an external listing service.
//! Whatever shape that service returns is normalized into
//! [`AssetRef`]s here, so the rest of the system only sees `{id, url,
//! filename}`.

use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use canvas_core::{normalize_listing, AssetRef};
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::error::ApiError;
use crate::metrics;
use crate::validation::{validate_folder, validate_user_id};
use crate::AppState;

/// Header carrying the opaque user identity.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Largest listing body read from upstream (1 MiB).
pub const DEFAULT_MAX_LISTING_BYTES: usize = 1024 * 1024;

/// Errors from the listing service.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// No listing service is configured.
    #[error("asset listing is not configured")]
    NotConfigured,
    /// The listing URL provided by configuration is invalid.
    #[error("invalid asset listing URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed (connection, timeout, etc.).
    #[error("asset listing request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The service answered with a non-success status.
    #[error("asset listing returned {0}")]
    Status(u16),
    /// The listing body exceeded the size cap.
    #[error("asset listing exceeds {limit} bytes")]
    TooLarge {
        /// The configured cap.
        limit: usize,
    },
    /// The listing body is not JSON.
    #[error("asset listing is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

impl CatalogError {
    /// Stable tag used on the wire and in metrics labels.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotConfigured => "listing_unavailable",
            Self::InvalidUrl(_) => "listing_misconfigured",
            Self::Http(_) | Self::Status(_) | Self::TooLarge { .. } | Self::Decode(_) => {
                "listing_failed"
            }
        }
    }
}

/// Lists selectable assets in a folder.
///
/// The user identity only scopes the listing; composition never sees it.
#[async_trait]
pub trait AssetCatalog: Send + Sync {
    /// List the assets in `folder`, optionally scoped to `user`.
    async fn list(&self, folder: &str, user: Option<&str>) -> Result<Vec<AssetRef>, CatalogError>;
}

/// [`AssetCatalog`] backed by an HTTP listing service.
///
/// `GET {base}/{folder}` must return JSON in one of the shapes
/// [`normalize_listing`] understands.
#[derive(Debug, Clone)]
pub struct HttpAssetCatalog {
    http: Client,
    base: Url,
    max_bytes: usize,
}

impl HttpAssetCatalog {
    /// Create a catalog client.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidUrl`] if the URL is malformed or cannot
    /// carry path segments.
    /// Returns [`CatalogError::Http`] if the HTTP client fails to build.
    pub fn new(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self, CatalogError> {
        let base =
            Url::parse(base_url.as_ref()).map_err(|e| CatalogError::InvalidUrl(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(CatalogError::InvalidUrl(format!("{base} cannot be a base")));
        }
        let http = Client::builder()
            .user_agent(concat!("overlay-canvas/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base,
            max_bytes: DEFAULT_MAX_LISTING_BYTES,
        })
    }

    /// Cap the listing body size.
    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn folder_url(&self, folder: &str) -> Result<Url, CatalogError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| CatalogError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(folder.split('/'));
        Ok(url)
    }
}

#[async_trait]
impl AssetCatalog for HttpAssetCatalog {
    #[tracing::instrument(name = "list_assets_upstream", skip(self, user))]
    async fn list(&self, folder: &str, user: Option<&str>) -> Result<Vec<AssetRef>, CatalogError> {
        let mut request = self.http.get(self.folder_url(folder)?);
        if let Some(user) = user {
            request = request.header(USER_ID_HEADER, user);
        }

        let mut response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status(status.as_u16()));
        }

        let limit = self.max_bytes;
        let declared = response
            .content_length()
            .and_then(|len| usize::try_from(len).ok());
        if declared.is_some_and(|len| len > limit) {
            return Err(CatalogError::TooLarge { limit });
        }
        let mut raw = Vec::with_capacity(declared.unwrap_or(0));
        while let Some(chunk) = response.chunk().await? {
            if raw.len() + chunk.len() > limit {
                return Err(CatalogError::TooLarge { limit });
            }
            raw.extend_from_slice(&chunk);
        }

        let body: Value = serde_json::from_slice(&raw)?;
        let assets = normalize_listing(&body);
        tracing::debug!(count = assets.len(), "asset listing normalized");
        Ok(assets)
    }
}

/// `GET /api/assets/{*folder}`: list selectable assets.
#[tracing::instrument(name = "list_assets", skip(state, headers))]
pub async fn list_assets_handler(
    State(state): State<AppState>,
    Path(folder): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<AssetRef>>, ApiError> {
    validate_folder(&folder)?;
    let user = headers
        .get(USER_ID_HEADER)
        .map(|v| v.to_str().map_err(|_| crate::validation::ValidationError::UserIdInvalid))
        .transpose()?;
    if let Some(user) = user {
        validate_user_id(user)?;
    }

    let catalog = state.catalog.as_ref().ok_or(CatalogError::NotConfigured)?;
    match catalog.list(&folder, user).await {
        Ok(assets) => {
            metrics::record_asset_listing("ok");
            Ok(Json(assets))
        }
        Err(err) => {
            metrics::record_asset_listing(err.kind());
            tracing::warn!(error = %err, "asset listing failed");
            Err(err.into())
        }
    }
}

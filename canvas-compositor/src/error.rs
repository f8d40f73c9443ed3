//! Compositor error types.

use thiserror::Error;

/// Result type for composition.
pub type ComposeResult<T> = Result<T, ComposeError>;

/// Errors that can occur while producing a composite.
///
/// Asset-level variants name the asset (`base`, `overlay[2]`, an element id)
/// so the caller can retry it or point the user at it.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// Asset bytes could not be retrieved. Worth retrying.
    #[error("Failed to fetch {asset}: {reason}")]
    AssetFetchFailed {
        /// Which asset.
        asset: String,
        /// What went wrong.
        reason: String,
    },

    /// Asset bytes are not a usable raster.
    #[error("Invalid asset {asset}: {reason}")]
    InvalidAsset {
        /// Which asset.
        asset: String,
        /// What went wrong.
        reason: String,
    },

    /// Compositing or encoding failed.
    #[error("Composition failed: {0}")]
    CompositionFailed(String),
}

impl ComposeError {
    /// Shorthand for [`ComposeError::AssetFetchFailed`].
    #[must_use]
    pub fn fetch(asset: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::AssetFetchFailed {
            asset: asset.into(),
            reason: reason.to_string(),
        }
    }

    /// Shorthand for [`ComposeError::InvalidAsset`].
    #[must_use]
    pub fn invalid(asset: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::InvalidAsset {
            asset: asset.into(),
            reason: reason.to_string(),
        }
    }

    /// Stable tag used on the wire and in metrics labels.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AssetFetchFailed { .. } => "asset_fetch_failed",
            Self::InvalidAsset { .. } => "invalid_asset",
            Self::CompositionFailed(_) => "composition_failed",
        }
    }

    /// The asset the error refers to, if any.
    #[must_use]
    pub fn asset(&self) -> Option<&str> {
        match self {
            Self::AssetFetchFailed { asset, .. } | Self::InvalidAsset { asset, .. } => Some(asset),
            Self::CompositionFailed(_) => None,
        }
    }

    /// Whether retrying the same request could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AssetFetchFailed { .. })
    }
}

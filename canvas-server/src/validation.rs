//! Input validation for untrusted data.
//!
//! All user-supplied input MUST be validated before use.
//! This module provides validators for compose requests and asset listings.

use thiserror::Error;

/// Maximum overlays in one compose request.
pub const MAX_OVERLAYS: usize = 32;
/// Maximum elements in a canvas snapshot (base image plus overlays).
pub const MAX_CANVAS_ELEMENTS: usize = MAX_OVERLAYS + 1;
/// Maximum length of a source string that is not inline data.
pub const MAX_SOURCE_URL_LEN: usize = 2048;
/// Maximum length for asset folder names.
pub const MAX_FOLDER_LEN: usize = 128;
/// Maximum length for the opaque user identity.
pub const MAX_USER_ID_LEN: usize = 128;
/// Largest accepted overlay scale.
pub const MAX_SCALE: f64 = 100.0;
/// Largest accepted coordinate magnitude, in base-image pixels.
pub const MAX_COORDINATE: f64 = 1_000_000.0;

/// Validation error types.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Too many overlays in one request.
    #[error("too many overlays: {0} (max {MAX_OVERLAYS})")]
    TooManyOverlays(usize),
    /// Too many elements in a canvas snapshot.
    #[error("too many canvas elements: {0} (max {MAX_CANVAS_ELEMENTS})")]
    TooManyElements(usize),
    /// A source string is empty.
    #[error("{0}: source is empty")]
    EmptySource(String),
    /// A URL source exceeds maximum length.
    #[error("{0}: source URL too long (max {MAX_SOURCE_URL_LEN} chars)")]
    SourceTooLong(String),
    /// Invalid transform values.
    #[error("{asset}: invalid transform: {reason}")]
    InvalidTransform {
        /// Which overlay.
        asset: String,
        /// What is wrong with it.
        reason: String,
    },
    /// Asset bytes exceed the configured limit.
    #[error("{asset}: asset too large ({size} bytes, max {limit})")]
    AssetTooLarge {
        /// Which asset.
        asset: String,
        /// Actual size.
        size: usize,
        /// Configured limit.
        limit: usize,
    },
    /// Folder name is empty or too long.
    #[error("folder name must be 1-{MAX_FOLDER_LEN} chars")]
    FolderLength,
    /// Folder name contains invalid characters.
    #[error("folder name contains invalid characters")]
    FolderInvalidChars,
    /// User identity is malformed.
    #[error("user id must be 1-{MAX_USER_ID_LEN} visible ASCII chars")]
    UserIdInvalid,
    /// The compose token header is not an unsigned integer.
    #[error("x-compose-token must be an unsigned integer")]
    ComposeToken,
}

impl ValidationError {
    /// Short tag for metrics labels.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TooManyOverlays(_) | Self::TooManyElements(_) => "overlay_count",
            Self::EmptySource(_) | Self::SourceTooLong(_) => "source",
            Self::InvalidTransform { .. } => "transform",
            Self::AssetTooLarge { .. } => "asset_size",
            Self::FolderLength | Self::FolderInvalidChars => "folder",
            Self::UserIdInvalid => "user_id",
            Self::ComposeToken => "compose_token",
        }
    }

    /// The asset the error refers to, if any.
    #[must_use]
    pub fn asset(&self) -> Option<&str> {
        match self {
            Self::EmptySource(asset)
            | Self::SourceTooLong(asset)
            | Self::InvalidTransform { asset, .. }
            | Self::AssetTooLarge { asset, .. } => Some(asset),
            _ => None,
        }
    }
}

/// Folder names: alphanumeric, hyphen, underscore, and `/` between segments.
fn is_valid_folder_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '/'
}

/// Validate the overlay count of a compose request.
///
/// # Errors
///
/// Returns [`ValidationError::TooManyOverlays`] above [`MAX_OVERLAYS`].
pub fn validate_overlay_count(count: usize) -> Result<(), ValidationError> {
    if count > MAX_OVERLAYS {
        return Err(ValidationError::TooManyOverlays(count));
    }
    Ok(())
}

/// Validate the element count of a canvas snapshot.
///
/// # Errors
///
/// Returns [`ValidationError::TooManyElements`] above [`MAX_CANVAS_ELEMENTS`].
pub fn validate_element_count(count: usize) -> Result<(), ValidationError> {
    if count > MAX_CANVAS_ELEMENTS {
        return Err(ValidationError::TooManyElements(count));
    }
    Ok(())
}

/// Validate a source string.
///
/// Inline data is bounded by the request body limit; only URLs are
/// length-checked here.
///
/// # Errors
///
/// Returns [`ValidationError::EmptySource`] or [`ValidationError::SourceTooLong`].
pub fn validate_source(asset: &str, source: &str) -> Result<(), ValidationError> {
    let source = source.trim();
    if source.is_empty() {
        return Err(ValidationError::EmptySource(asset.to_string()));
    }
    let is_url = source.starts_with("http://") || source.starts_with("https://");
    if is_url && source.len() > MAX_SOURCE_URL_LEN {
        return Err(ValidationError::SourceTooLong(asset.to_string()));
    }
    Ok(())
}

/// Validate an overlay's position and scale.
///
/// Out-of-range positions are fine (the compositor clamps), but they must be
/// finite and of sane magnitude. Scale must be positive.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidTransform`] naming the offending field.
pub fn validate_placement(asset: &str, x: f64, y: f64, scale: f64) -> Result<(), ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidTransform {
        asset: asset.to_string(),
        reason,
    };
    for (name, value) in [("x", x), ("y", y)] {
        if !value.is_finite() || value.abs() > MAX_COORDINATE {
            return Err(invalid(format!("{name} must be finite and within ±{MAX_COORDINATE}")));
        }
    }
    if !scale.is_finite() || scale <= 0.0 || scale > MAX_SCALE {
        return Err(invalid(format!("scale must be in (0, {MAX_SCALE}]")));
    }
    Ok(())
}

/// Validate an explicit overlay extent (stretch-fit overlays).
///
/// # Errors
///
/// Returns [`ValidationError::InvalidTransform`] for missing, non-finite or
/// non-positive sizes.
pub fn validate_extent(
    asset: &str,
    width: Option<f64>,
    height: Option<f64>,
) -> Result<(f64, f64), ValidationError> {
    match (width, height) {
        (Some(w), Some(h)) if w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0 => Ok((w, h)),
        _ => Err(ValidationError::InvalidTransform {
            asset: asset.to_string(),
            reason: "stretch overlays need a positive width and height".to_string(),
        }),
    }
}

/// Validate an asset's size.
///
/// # Errors
///
/// Returns [`ValidationError::AssetTooLarge`] if `size` exceeds `limit`.
pub fn validate_asset_size(asset: &str, size: usize, limit: usize) -> Result<(), ValidationError> {
    if size > limit {
        return Err(ValidationError::AssetTooLarge {
            asset: asset.to_string(),
            size,
            limit,
        });
    }
    Ok(())
}

/// Validate an asset folder name.
///
/// Valid folder names:
/// - 1-128 characters
/// - Alphanumeric, hyphen, underscore, and `/` separators
/// - No empty, `.` or `..` segments
///
/// # Errors
///
/// Returns [`ValidationError::FolderLength`] or [`ValidationError::FolderInvalidChars`].
pub fn validate_folder(folder: &str) -> Result<(), ValidationError> {
    if folder.is_empty() || folder.len() > MAX_FOLDER_LEN {
        return Err(ValidationError::FolderLength);
    }
    if !folder.chars().all(is_valid_folder_char) || folder.split('/').any(str::is_empty) {
        return Err(ValidationError::FolderInvalidChars);
    }
    Ok(())
}

/// Validate the opaque user identity forwarded to the listing service.
///
/// # Errors
///
/// Returns [`ValidationError::UserIdInvalid`] if empty, too long, or not
/// visible ASCII.
pub fn validate_user_id(user: &str) -> Result<(), ValidationError> {
    if user.is_empty()
        || user.len() > MAX_USER_ID_LEN
        || !user.chars().all(|c| c.is_ascii_graphic())
    {
        return Err(ValidationError::UserIdInvalid);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_count() {
        assert!(validate_overlay_count(0).is_ok());
        assert!(validate_overlay_count(MAX_OVERLAYS).is_ok());
        assert!(validate_overlay_count(MAX_OVERLAYS + 1).is_err());
    }

    #[test]
    fn test_element_count() {
        assert!(validate_element_count(MAX_CANVAS_ELEMENTS).is_ok());
        assert!(validate_element_count(MAX_CANVAS_ELEMENTS + 1).is_err());
    }

    #[test]
    fn test_sources() {
        assert!(validate_source("base", "https://cdn.example.com/a.png").is_ok());
        assert!(validate_source("base", "data:image/png;base64,AAAA").is_ok());
        assert!(validate_source("base", "   ").is_err());

        let long_url = format!("https://cdn.example.com/{}", "x".repeat(MAX_SOURCE_URL_LEN));
        let err = validate_source("overlay[0]", &long_url).expect_err("too long");
        assert_eq!(err.asset(), Some("overlay[0]"));

        // Inline payloads are bounded elsewhere
        let inline = "A".repeat(MAX_SOURCE_URL_LEN * 4);
        assert!(validate_source("overlay[0]", &inline).is_ok());
    }

    #[test]
    fn test_placement() {
        assert!(validate_placement("o", 950.0, 790.0, 1.0).is_ok());
        // Negative positions are clamped later, not rejected
        assert!(validate_placement("o", -40.0, -3.0, 0.5).is_ok());

        assert!(validate_placement("o", f64::NAN, 0.0, 1.0).is_err());
        assert!(validate_placement("o", 0.0, f64::INFINITY, 1.0).is_err());
        assert!(validate_placement("o", 0.0, 0.0, 0.0).is_err());
        assert!(validate_placement("o", 0.0, 0.0, -1.0).is_err());
        assert!(validate_placement("o", 0.0, 0.0, MAX_SCALE + 1.0).is_err());
        assert!(validate_placement("o", MAX_COORDINATE * 2.0, 0.0, 1.0).is_err());
    }

    #[test]
    fn test_extent() {
        assert_eq!(validate_extent("t", Some(300.0), Some(40.0)).ok(), Some((300.0, 40.0)));
        assert!(validate_extent("t", None, Some(40.0)).is_err());
        assert!(validate_extent("t", Some(0.0), Some(40.0)).is_err());
        assert!(validate_extent("t", Some(f64::NAN), Some(40.0)).is_err());
    }

    #[test]
    fn test_asset_size() {
        assert!(validate_asset_size("base", 10, 10).is_ok());
        let err = validate_asset_size("base", 11, 10).expect_err("too large");
        assert!(err.to_string().contains("11 bytes"));
    }

    #[test]
    fn test_valid_folders() {
        assert!(validate_folder("logos").is_ok());
        assert!(validate_folder("brand_2024/logos").is_ok());
        assert!(validate_folder("photo-library").is_ok());
    }

    #[test]
    fn test_invalid_folders() {
        assert!(validate_folder("").is_err());
        assert!(validate_folder("has spaces").is_err());
        assert!(validate_folder("../../../etc/passwd").is_err());
        assert!(validate_folder("a//b").is_err());
        assert!(validate_folder("/leading").is_err());
        assert!(validate_folder("trailing/").is_err());
        assert!(validate_folder("contains<script>").is_err());
        assert!(validate_folder(&"x".repeat(MAX_FOLDER_LEN + 1)).is_err());
    }

    #[test]
    fn test_user_ids() {
        assert!(validate_user_id("user_42").is_ok());
        assert!(validate_user_id("auth0|5f8a").is_ok());
        assert!(validate_user_id("").is_err());
        assert!(validate_user_id("has space").is_err());
        assert!(validate_user_id(&"x".repeat(MAX_USER_ID_LEN + 1)).is_err());
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(ValidationError::TooManyOverlays(40).kind(), "overlay_count");
        assert_eq!(ValidationError::FolderInvalidChars.kind(), "folder");
        assert_eq!(ValidationError::ComposeToken.kind(), "compose_token");
        assert!(ValidationError::TooManyOverlays(40).to_string().contains("32"));
    }
}

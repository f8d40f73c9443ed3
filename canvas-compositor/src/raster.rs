//! Raster decoding and asset source parsing.
//!
//! Assets arrive as raw bytes, inline base64, `data:` URIs or `http(s)`
//! URLs. Everything but URLs is decoded here; URLs are handed back to the
//! caller to fetch.

use base64::Engine;
use image::RgbaImage;

use crate::error::{ComposeError, ComposeResult};

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// PNG with alpha support.
    Png,
    /// JPEG (no alpha).
    Jpeg,
    /// WebP (alpha support).
    WebP,
    /// Unknown/other format.
    Unknown,
}

impl ImageFormat {
    /// Detect format from MIME type.
    #[must_use]
    pub fn from_mime(mime: &str) -> Self {
        match mime.to_lowercase().as_str() {
            "image/png" => Self::Png,
            "image/jpeg" | "image/jpg" => Self::Jpeg,
            "image/webp" => Self::WebP,
            _ => Self::Unknown,
        }
    }

    /// Detect format from magic bytes.
    #[must_use]
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        if data.len() < 4 {
            return Self::Unknown;
        }

        // PNG: 89 50 4E 47
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            return Self::Png;
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Self::Jpeg;
        }

        // WebP: RIFF....WEBP
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Self::WebP;
        }

        Self::Unknown
    }
}

/// Where an asset's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
    /// Bytes already in hand.
    Inline(Vec<u8>),
    /// An `http(s)` URL to fetch.
    Remote(String),
}

impl AssetSource {
    /// Classify a source string.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::InvalidAsset`] if the string is neither a URL,
    /// a well-formed data URI nor valid base64.
    pub fn parse(asset: &str, source: &str) -> ComposeResult<Self> {
        let source = source.trim();
        if source.starts_with("http://") || source.starts_with("https://") {
            return Ok(Self::Remote(source.to_string()));
        }
        if source.starts_with("data:") {
            return decode_data_uri(asset, source).map(Self::Inline);
        }
        base64::engine::general_purpose::STANDARD
            .decode(source)
            .map(Self::Inline)
            .map_err(|e| {
                ComposeError::invalid(asset, format!("not a URL, data URI or base64: {e}"))
            })
    }
}

/// Decode the payload of a data URI such as `data:image/png;base64,iVBOR...`.
///
/// # Errors
///
/// Returns [`ComposeError::InvalidAsset`] if the URI is malformed.
pub fn decode_data_uri(asset: &str, uri: &str) -> ComposeResult<Vec<u8>> {
    let Some(uri_data) = uri.strip_prefix("data:") else {
        return Err(ComposeError::invalid(asset, "not a data URI"));
    };

    let (metadata, encoded) = uri_data
        .split_once(',')
        .ok_or_else(|| ComposeError::invalid(asset, "data URI is missing ','"))?;

    if metadata.contains(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| ComposeError::invalid(asset, format!("bad base64: {e}")))
    } else {
        percent_decode(encoded).ok_or_else(|| ComposeError::invalid(asset, "bad percent-encoding"))
    }
}

fn percent_decode(input: &str) -> Option<Vec<u8>> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Some(out)
}

/// Decode bytes into an RGBA raster with known, positive dimensions.
///
/// # Errors
///
/// Returns [`ComposeError::InvalidAsset`] for undecodable bytes or a raster
/// with a zero dimension.
pub fn decode(asset: &str, bytes: &[u8]) -> ComposeResult<RgbaImage> {
    if bytes.is_empty() {
        return Err(ComposeError::invalid(asset, "empty body"));
    }
    let format = ImageFormat::from_magic_bytes(bytes);
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| ComposeError::invalid(asset, format!("failed to decode image: {e}")))?
        .to_rgba8();
    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return Err(ComposeError::invalid(
            asset,
            format!("image has no pixels ({width}x{height})"),
        ));
    }
    tracing::debug!(asset, ?format, width, height, "decoded raster");
    Ok(decoded)
}

//! Composition settings.

use canvas_core::SizingPolicy;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected configuration values.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// Width fraction outside `(0, 1]`.
    #[error("target width fraction must be in (0, 1], got {0}")]
    WidthFraction(f64),

    /// JPEG quality outside `1..=100`.
    #[error("jpeg quality must be in 1..=100, got {0}")]
    JpegQuality(u8),
}

/// Resampling filter used when resizing overlays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResampleFilter {
    /// Nearest neighbour.
    Nearest,
    /// Bilinear.
    Triangle,
    /// Catmull-Rom bicubic.
    CatmullRom,
    /// Gaussian.
    Gaussian,
    /// Lanczos with window 3.
    #[default]
    Lanczos3,
}

impl From<ResampleFilter> for FilterType {
    fn from(filter: ResampleFilter) -> Self {
        match filter {
            ResampleFilter::Nearest => FilterType::Nearest,
            ResampleFilter::Triangle => FilterType::Triangle,
            ResampleFilter::CatmullRom => FilterType::CatmullRom,
            ResampleFilter::Gaussian => FilterType::Gaussian,
            ResampleFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Encoded output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lossless PNG.
    #[default]
    Png,
    /// JPEG; alpha is discarded.
    Jpeg,
}

impl OutputFormat {
    /// MIME type of the encoded bytes.
    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            other => Err(format!("unsupported output format: {other}")),
        }
    }
}

/// How overlays are sized and resampled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositionConfig {
    sizing: SizingPolicy,
    filter: ResampleFilter,
    jpeg_quality: u8,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            sizing: SizingPolicy::default(),
            filter: ResampleFilter::default(),
            jpeg_quality: 85,
        }
    }
}

impl CompositionConfig {
    /// Create a config with the given sizing policy and default encoding.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WidthFraction`] unless `0 < fraction <= 1`.
    pub fn new(target_width_fraction: f64, allow_upscale: bool) -> Result<Self, ConfigError> {
        let sizing = SizingPolicy::new(target_width_fraction, allow_upscale)
            .map_err(|_| ConfigError::WidthFraction(target_width_fraction))?;
        Ok(Self {
            sizing,
            ..Self::default()
        })
    }

    /// Set the fraction of the base width an overlay occupies at scale 1.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WidthFraction`] unless `0 < fraction <= 1`.
    pub fn with_target_width_fraction(mut self, fraction: f64) -> Result<Self, ConfigError> {
        self.sizing = SizingPolicy::new(fraction, self.sizing.allow_upscale())
            .map_err(|_| ConfigError::WidthFraction(fraction))?;
        Ok(self)
    }

    /// Set the JPEG quality.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::JpegQuality`] outside `1..=100`.
    pub fn with_jpeg_quality(mut self, quality: u8) -> Result<Self, ConfigError> {
        if !(1..=100).contains(&quality) {
            return Err(ConfigError::JpegQuality(quality));
        }
        self.jpeg_quality = quality;
        Ok(self)
    }

    /// Set the resampling filter.
    #[must_use]
    pub fn with_filter(mut self, filter: ResampleFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Overlay sizing policy, shared with the editor.
    #[must_use]
    pub fn sizing(&self) -> SizingPolicy {
        self.sizing
    }

    /// Fraction of the base width an overlay occupies at scale 1.
    #[must_use]
    pub fn target_width_fraction(&self) -> f64 {
        self.sizing.target_width_fraction()
    }

    /// Whether overlays may be enlarged past their natural resolution.
    #[must_use]
    pub fn allow_upscale(&self) -> bool {
        self.sizing.allow_upscale()
    }

    /// Resampling filter.
    #[must_use]
    pub fn filter(&self) -> ResampleFilter {
        self.filter
    }

    /// JPEG quality.
    #[must_use]
    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }
}

//! Overlay sizing and clamping.
//!
//! Aspect-locked overlays are sized by [`canvas_core::SizingPolicy`],
//! the same policy the editor uses, against the output frame. The result
//! is pulled back inside the frame. Sizes are computed in floating point
//! and rounded once at the end so aspect is preserved up to a single pixel
//! of rounding.

use canvas_core::Transform;
use serde::{Deserialize, Serialize};

use crate::config::CompositionConfig;

/// How an overlay's rendered size is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayFit {
    /// Logos and photos: size from scale, natural aspect preserved.
    #[default]
    AspectLocked,
    /// Text rasters: fill the transform's box exactly.
    Stretch,
}

/// Where an overlay lands on the base image, in whole pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Left edge.
    pub left: u32,
    /// Top edge.
    pub top: u32,
    /// Rendered width.
    pub width: u32,
    /// Rendered height.
    pub height: u32,
}

/// Rendered size before rounding.
#[must_use]
pub fn target_extent(
    base: (u32, u32),
    natural: (u32, u32),
    transform: &Transform,
    fit: OverlayFit,
    config: &CompositionConfig,
) -> (f64, f64) {
    let (bw, bh) = (f64::from(base.0), f64::from(base.1));

    match fit {
        OverlayFit::Stretch => (transform.width.min(bw), transform.height.min(bh)),
        OverlayFit::AspectLocked => {
            config
                .sizing()
                .overlay_extent((bw, bh), natural, transform.scale)
        }
    }
}

/// Clamp a requested top-left position so an overlay of `size` stays inside
/// `base`. `size` must not exceed `base`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn clamp_position(x: f64, y: f64, size: (u32, u32), base: (u32, u32)) -> (u32, u32) {
    let max_left = f64::from(base.0.saturating_sub(size.0));
    let max_top = f64::from(base.1.saturating_sub(size.1));
    let left = x.round().clamp(0.0, max_left);
    let top = y.round().clamp(0.0, max_top);
    (left as u32, top as u32)
}

/// Size and position an overlay on the base image.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn place(
    base: (u32, u32),
    natural: (u32, u32),
    transform: &Transform,
    fit: OverlayFit,
    config: &CompositionConfig,
) -> Placement {
    let (w, h) = target_extent(base, natural, transform, fit, config);
    let width = (w.round() as u32).clamp(1, base.0);
    let height = (h.round() as u32).clamp(1, base.1);
    let (left, top) = clamp_position(transform.x, transform.y, (width, height), base);
    Placement {
        left,
        top,
        width,
        height,
    }
}

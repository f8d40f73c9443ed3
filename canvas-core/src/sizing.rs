//! Overlay sizing shared by the editor preview and the compositor.
//!
//! An aspect-locked overlay is `target_width_fraction * frame_width * scale`
//! wide. It never grows past its natural size unless upscaling is allowed
//! and never exceeds the output frame. Height follows the natural aspect
//! ratio. The compositor rounds the result once when it places the overlay;
//! the editor uses it unrounded, so the two agree to within a pixel.

use crate::{AspectRatio, CanvasError, CanvasResult, DEFAULT_TARGET_WIDTH_FRACTION};

/// How big an aspect-locked overlay renders for a given scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingPolicy {
    target_width_fraction: f64,
    allow_upscale: bool,
}

impl Default for SizingPolicy {
    fn default() -> Self {
        Self {
            target_width_fraction: DEFAULT_TARGET_WIDTH_FRACTION,
            allow_upscale: false,
        }
    }
}

impl SizingPolicy {
    /// Create a policy.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::InvalidSizing`] unless `0 < fraction <= 1`.
    pub fn new(target_width_fraction: f64, allow_upscale: bool) -> CanvasResult<Self> {
        if !(target_width_fraction.is_finite()
            && target_width_fraction > 0.0
            && target_width_fraction <= 1.0)
        {
            return Err(CanvasError::InvalidSizing(format!(
                "target width fraction must be in (0, 1], got {target_width_fraction}"
            )));
        }
        Ok(Self {
            target_width_fraction,
            allow_upscale,
        })
    }

    /// Fraction of the frame width an overlay occupies at scale 1.
    #[must_use]
    pub fn target_width_fraction(&self) -> f64 {
        self.target_width_fraction
    }

    /// Whether overlays may be enlarged past their natural resolution.
    #[must_use]
    pub fn allow_upscale(&self) -> bool {
        self.allow_upscale
    }

    /// Rendered extent of an overlay with the given natural size, in frame
    /// pixels.
    ///
    /// Worked as a multiple of the natural size, so the result stays finite
    /// and keeps the natural aspect ratio for any positive scale.
    #[must_use]
    pub fn overlay_extent(&self, frame: (f64, f64), natural: (u32, u32), scale: f64) -> (f64, f64) {
        let nw = f64::from(natural.0.max(1));
        let nh = f64::from(natural.1.max(1));

        let mut factor = self.target_width_fraction * frame.0 * scale / nw;
        if !self.allow_upscale {
            factor = factor.min(1.0);
        }
        factor = factor.min(frame.0 / nw).min(frame.1 / nh);
        (nw * factor, nh * factor)
    }
}

/// The pixel-aligned region of a base image that ends up in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Left edge in base-image pixels.
    pub left: u32,
    /// Top edge in base-image pixels.
    pub top: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Frame {
    /// The whole image.
    #[must_use]
    pub fn full(image: (u32, u32)) -> Self {
        Self {
            left: 0,
            top: 0,
            width: image.0,
            height: image.1,
        }
    }

    /// The centred region of `image` with the given aspect ratio, or the
    /// whole image for `None`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn cropped(image: (u32, u32), crop: Option<AspectRatio>) -> Self {
        let full = Self::full(image);
        let Some(ratio) = crop.map(AspectRatio::ratio) else {
            return full;
        };
        if image.0 == 0 || image.1 == 0 {
            return full;
        }

        let (w, h) = (f64::from(image.0), f64::from(image.1));
        if w / h > ratio {
            let width = ((h * ratio).round() as u32).clamp(1, image.0);
            Self {
                left: (image.0 - width) / 2,
                width,
                ..full
            }
        } else {
            let height = ((w / ratio).round() as u32).clamp(1, image.1);
            Self {
                top: (image.1 - height) / 2,
                height,
                ..full
            }
        }
    }

    /// Width and height as floats.
    #[must_use]
    pub fn extent(&self) -> (f64, f64) {
        (f64::from(self.width), f64::from(self.height))
    }
}

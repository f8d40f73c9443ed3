//! Mapping between display space and base-image pixel space.
//!
//! The base image (or its aspect-ratio crop) is fit inside the display
//! area, multiplied by the zoom level and centred. The mapping is a pure
//! scale-plus-offset, so [`Viewport::to_image_space`] and
//! [`Viewport::to_display_space`] are exact inverses up to floating-point
//! rounding. Client previews and server renders agree because both sides
//! place overlays in image space.

use serde::{Deserialize, Serialize};

use crate::{AspectRatio, CanvasError, CanvasResult};

/// A 2D point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

impl Point {
    /// Create a point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle in image space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

/// Display area and image geometry needed to map between the two spaces.
///
/// Display dimensions and pointer positions are in CSS pixels; use
/// [`Viewport::device_to_display`] for positions reported in physical
/// pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    display_width: f64,
    display_height: f64,
    image_width: f64,
    image_height: f64,
    zoom: f64,
    device_pixel_ratio: f64,
    crop: Option<AspectRatio>,
}

fn positive(name: &str, value: f64) -> CanvasResult<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(CanvasError::InvalidViewport(format!(
            "{name} must be positive and finite, got {value}"
        )))
    }
}

impl Viewport {
    /// Create a viewport at zoom 1 with no crop.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::InvalidViewport`] if any dimension is not
    /// strictly positive.
    pub fn new(
        display_width: f64,
        display_height: f64,
        image_width: f64,
        image_height: f64,
    ) -> CanvasResult<Self> {
        Ok(Self {
            display_width: positive("display_width", display_width)?,
            display_height: positive("display_height", display_height)?,
            image_width: positive("image_width", image_width)?,
            image_height: positive("image_height", image_height)?,
            zoom: 1.0,
            device_pixel_ratio: 1.0,
            crop: None,
        })
    }

    /// Set the zoom level (1.0 = fit).
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::InvalidViewport`] for a non-positive zoom.
    pub fn with_zoom(mut self, zoom: f64) -> CanvasResult<Self> {
        self.zoom = positive("zoom", zoom)?;
        Ok(self)
    }

    /// Set the device pixel ratio.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::InvalidViewport`] for a non-positive ratio.
    pub fn with_device_pixel_ratio(mut self, ratio: f64) -> CanvasResult<Self> {
        self.device_pixel_ratio = positive("device_pixel_ratio", ratio)?;
        Ok(self)
    }

    /// Show only the centred region of the image with the given aspect ratio.
    #[must_use]
    pub fn with_crop(mut self, crop: Option<AspectRatio>) -> Self {
        self.crop = crop;
        self
    }

    /// Current zoom level.
    #[must_use]
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Device pixel ratio.
    #[must_use]
    pub fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
    }

    /// The region of the image being displayed.
    #[must_use]
    pub fn crop_rect(&self) -> Rect {
        let full = Rect {
            x: 0.0,
            y: 0.0,
            width: self.image_width,
            height: self.image_height,
        };
        let Some(ratio) = self.crop.map(AspectRatio::ratio) else {
            return full;
        };
        let image_ratio = self.image_width / self.image_height;
        if image_ratio > ratio {
            let width = self.image_height * ratio;
            Rect {
                x: (self.image_width - width) / 2.0,
                width,
                ..full
            }
        } else {
            let height = self.image_width / ratio;
            Rect {
                y: (self.image_height - height) / 2.0,
                height,
                ..full
            }
        }
    }

    /// Display pixels per image pixel.
    #[must_use]
    pub fn scale_factor(&self) -> f64 {
        let crop = self.crop_rect();
        (self.display_width / crop.width).min(self.display_height / crop.height) * self.zoom
    }

    /// Display-space position of the image origin.
    #[must_use]
    pub fn origin(&self) -> Point {
        let crop = self.crop_rect();
        let s = self.scale_factor();
        Point {
            x: (self.display_width - crop.width * s) / 2.0 - crop.x * s,
            y: (self.display_height - crop.height * s) / 2.0 - crop.y * s,
        }
    }

    /// Map a display-space point into base-image pixel space.
    #[must_use]
    pub fn to_image_space(&self, display: Point) -> Point {
        let origin = self.origin();
        let s = self.scale_factor();
        Point {
            x: (display.x - origin.x) / s,
            y: (display.y - origin.y) / s,
        }
    }

    /// Map a base-image point into display space.
    #[must_use]
    pub fn to_display_space(&self, image: Point) -> Point {
        let origin = self.origin();
        let s = self.scale_factor();
        Point {
            x: image.x * s + origin.x,
            y: image.y * s + origin.y,
        }
    }

    /// Map a display-space displacement into image space.
    #[must_use]
    pub fn delta_to_image_space(&self, dx: f64, dy: f64) -> Point {
        let s = self.scale_factor();
        Point {
            x: dx / s,
            y: dy / s,
        }
    }

    /// Convert a display-space length (e.g. a handle radius) to image pixels.
    #[must_use]
    pub fn length_to_image_space(&self, length: f64) -> f64 {
        length / self.scale_factor()
    }

    /// Convert a position reported in physical pixels into CSS pixels.
    #[must_use]
    pub fn device_to_display(&self, device: Point) -> Point {
        Point {
            x: device.x / self.device_pixel_ratio,
            y: device.y / self.device_pixel_ratio,
        }
    }

    /// Backing store size in physical pixels for the display area.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn backing_size(&self) -> (u32, u32) {
        (
            (self.display_width * self.device_pixel_ratio).round() as u32,
            (self.display_height * self.device_pixel_ratio).round() as u32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    #[test]
    fn fit_scale_uses_limiting_axis() {
        let vp = Viewport::new(500.0, 500.0, 1000.0, 800.0).expect("viewport");
        assert!((vp.scale_factor() - 0.5).abs() < 1e-12);
        // 1000x800 at 0.5 is 500x400, centred vertically in 500x500
        assert!(close(vp.origin(), Point::new(0.0, 50.0)));
        assert!(close(
            vp.to_image_space(Point::new(250.0, 250.0)),
            Point::new(500.0, 400.0)
        ));
    }

    #[test]
    fn zoom_multiplies_scale() {
        let vp = Viewport::new(500.0, 400.0, 1000.0, 800.0)
            .expect("viewport")
            .with_zoom(2.0)
            .expect("zoom");
        assert!((vp.scale_factor() - 1.0).abs() < 1e-12);
        // Centre of the display still maps to the centre of the image
        assert!(close(
            vp.to_image_space(Point::new(250.0, 200.0)),
            Point::new(500.0, 400.0)
        ));
    }

    #[test]
    fn square_crop_centres_on_landscape_image() {
        let vp = Viewport::new(400.0, 400.0, 1000.0, 800.0)
            .expect("viewport")
            .with_crop(Some(AspectRatio::Square));
        let crop = vp.crop_rect();
        assert!((crop.x - 100.0).abs() < 1e-12);
        assert!((crop.width - 800.0).abs() < 1e-12);
        assert!((vp.scale_factor() - 0.5).abs() < 1e-12);
        // Display origin shows the crop's top-left corner
        assert!(close(
            vp.to_image_space(Point::new(0.0, 0.0)),
            Point::new(100.0, 0.0)
        ));
    }

    #[test]
    fn rejects_degenerate_geometry() {
        assert!(Viewport::new(0.0, 400.0, 1000.0, 800.0).is_err());
        assert!(Viewport::new(400.0, 400.0, 1000.0, f64::NAN).is_err());
        let vp = Viewport::new(400.0, 400.0, 1000.0, 800.0).expect("viewport");
        assert!(vp.with_zoom(0.0).is_err());
        assert!(vp.with_device_pixel_ratio(-1.0).is_err());
    }

    #[test]
    fn device_pixels_divide_by_ratio() {
        let vp = Viewport::new(400.0, 300.0, 1000.0, 800.0)
            .expect("viewport")
            .with_device_pixel_ratio(2.0)
            .expect("dpr");
        assert!(close(
            vp.device_to_display(Point::new(200.0, 100.0)),
            Point::new(100.0, 50.0)
        ));
        assert_eq!(vp.backing_size(), (800, 600));
    }

    #[test]
    fn deltas_scale_without_offset() {
        let vp = Viewport::new(500.0, 500.0, 1000.0, 800.0).expect("viewport");
        assert!(close(vp.delta_to_image_space(10.0, -5.0), Point::new(20.0, -10.0)));
        assert!((vp.length_to_image_space(12.0) - 24.0).abs() < 1e-12);
    }
}

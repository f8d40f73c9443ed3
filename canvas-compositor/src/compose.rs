//! The composition engine.
//!
//! Each call decodes its own inputs and writes into a fresh buffer, so a
//! [`Compositor`] can be shared freely across threads. Output is a pure
//! function of the inputs and the config; nothing is cached or randomised.

use std::io::Cursor;

use canvas_core::{AspectRatio, Frame, Transform};
use image::{imageops, DynamicImage, ImageEncoder, RgbaImage};

use crate::config::{CompositionConfig, OutputFormat};
use crate::error::{ComposeError, ComposeResult};
use crate::layout::{place, OverlayFit, Placement};
use crate::raster;

/// Label used for the base image in errors.
pub const BASE_LABEL: &str = "base";

/// One overlay to draw onto the base image.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayInput {
    /// Names the overlay in errors and logs.
    pub label: String,
    /// Encoded raster bytes.
    pub bytes: Vec<u8>,
    /// Placement in base-image pixels.
    pub transform: Transform,
    /// Sizing rule.
    pub fit: OverlayFit,
    /// Paint order; ties keep input order.
    pub z_order: u64,
    /// Hidden overlays are skipped.
    pub visible: bool,
}

impl OverlayInput {
    /// A visible, aspect-locked overlay at z-order 0.
    #[must_use]
    pub fn new(label: impl Into<String>, bytes: Vec<u8>, transform: Transform) -> Self {
        Self {
            label: label.into(),
            bytes,
            transform,
            fit: OverlayFit::AspectLocked,
            z_order: 0,
            visible: true,
        }
    }

    /// Set the sizing rule.
    #[must_use]
    pub fn with_fit(mut self, fit: OverlayFit) -> Self {
        self.fit = fit;
        self
    }

    /// Set the paint order.
    #[must_use]
    pub fn with_z_order(mut self, z_order: u64) -> Self {
        self.z_order = z_order;
        self
    }

    /// Set visibility.
    #[must_use]
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    fn check_transform(&self) -> ComposeResult<()> {
        let t = &self.transform;
        let usable = match self.fit {
            OverlayFit::AspectLocked => {
                t.x.is_finite() && t.y.is_finite() && t.scale.is_finite() && t.scale > 0.0
            }
            OverlayFit::Stretch => t.validate().is_ok(),
        };
        if usable {
            Ok(())
        } else {
            Err(ComposeError::invalid(
                self.label.clone(),
                format!("unusable transform {t:?}"),
            ))
        }
    }
}

/// Everything needed for one composite.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposePlan {
    /// Encoded base image.
    pub base: Vec<u8>,
    /// Overlays in any order; they are painted by z-order.
    pub overlays: Vec<OverlayInput>,
    /// Centred crop of the base; overlay positions stay in base pixels.
    pub crop: Option<AspectRatio>,
}

/// Draws overlays onto a base image.
#[derive(Debug, Clone, Default)]
pub struct Compositor {
    config: CompositionConfig,
}

impl Compositor {
    /// Create a compositor.
    #[must_use]
    pub fn new(config: CompositionConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &CompositionConfig {
        &self.config
    }

    /// Composite and return the raster.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::InvalidAsset`] naming the first base or
    /// overlay that cannot be decoded or has an unusable transform.
    pub fn compose(&self, base: &[u8], overlays: &[OverlayInput]) -> ComposeResult<RgbaImage> {
        self.compose_framed(base, overlays, None)
    }

    /// Composite onto the centred `crop` of the base image.
    ///
    /// Overlay transforms are in base-image pixels; they are sized against
    /// and clamped inside the cropped frame.
    ///
    /// # Errors
    ///
    /// As [`Compositor::compose`].
    #[tracing::instrument(skip_all, fields(overlays = overlays.len(), crop = ?crop))]
    pub fn compose_framed(
        &self,
        base: &[u8],
        overlays: &[OverlayInput],
        crop: Option<AspectRatio>,
    ) -> ComposeResult<RgbaImage> {
        let decoded = raster::decode(BASE_LABEL, base)?;
        let frame = Frame::cropped(decoded.dimensions(), crop);
        let mut canvas = if frame == Frame::full(decoded.dimensions()) {
            decoded
        } else {
            imageops::crop_imm(&decoded, frame.left, frame.top, frame.width, frame.height)
                .to_image()
        };
        let base_size = canvas.dimensions();
        let (dx, dy) = (f64::from(frame.left), f64::from(frame.top));

        let mut ordered: Vec<&OverlayInput> = overlays.iter().filter(|o| o.visible).collect();
        ordered.sort_by_key(|o| o.z_order);

        for overlay in ordered {
            overlay.check_transform()?;
            let decoded = raster::decode(&overlay.label, &overlay.bytes)?;
            let transform = overlay
                .transform
                .with_position(overlay.transform.x - dx, overlay.transform.y - dy);
            let placement = place(
                base_size,
                decoded.dimensions(),
                &transform,
                overlay.fit,
                &self.config,
            );
            let resized = self.resize(decoded, placement);
            imageops::overlay(
                &mut canvas,
                &resized,
                i64::from(placement.left),
                i64::from(placement.top),
            );
            tracing::debug!(
                overlay = %overlay.label,
                left = placement.left,
                top = placement.top,
                width = placement.width,
                height = placement.height,
                "overlay composited"
            );
        }

        Ok(canvas)
    }

    /// Composite and encode.
    ///
    /// # Errors
    ///
    /// As [`Compositor::compose`], plus [`ComposeError::CompositionFailed`]
    /// if encoding fails.
    pub fn compose_to_bytes(
        &self,
        base: &[u8],
        overlays: &[OverlayInput],
        format: OutputFormat,
    ) -> ComposeResult<Vec<u8>> {
        self.compose_framed_to_bytes(base, overlays, None, format)
    }

    fn compose_framed_to_bytes(
        &self,
        base: &[u8],
        overlays: &[OverlayInput],
        crop: Option<AspectRatio>,
        format: OutputFormat,
    ) -> ComposeResult<Vec<u8>> {
        let canvas = self.compose_framed(base, overlays, crop)?;
        self.encode(canvas, format)
    }

    /// Composite a prepared plan and encode it.
    ///
    /// # Errors
    ///
    /// As [`Compositor::compose_to_bytes`].
    pub fn compose_plan(&self, plan: &ComposePlan, format: OutputFormat) -> ComposeResult<Vec<u8>> {
        self.compose_framed_to_bytes(&plan.base, &plan.overlays, plan.crop, format)
    }

    /// Encode a raster.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::CompositionFailed`] if the encoder fails.
    pub fn encode(&self, canvas: RgbaImage, format: OutputFormat) -> ComposeResult<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        match format {
            OutputFormat::Png => DynamicImage::ImageRgba8(canvas)
                .write_to(&mut buf, image::ImageFormat::Png)
                .map_err(|e| encode_failed("PNG", &e))?,
            OutputFormat::Jpeg => {
                let rgb = DynamicImage::ImageRgba8(canvas).to_rgb8();
                let (width, height) = rgb.dimensions();
                image::codecs::jpeg::JpegEncoder::new_with_quality(
                    &mut buf,
                    self.config.jpeg_quality(),
                )
                .write_image(rgb.as_raw(), width, height, image::ColorType::Rgb8.into())
                .map_err(|e| encode_failed("JPEG", &e))?;
            }
        }
        Ok(buf.into_inner())
    }

    /// Run a 1×1 composite end to end. Readiness probes use this.
    #[must_use]
    pub fn self_test(&self) -> bool {
        let pixel = RgbaImage::from_pixel(1, 1, image::Rgba([0, 0, 0, 255]));
        let Ok(base) = self.encode(pixel, OutputFormat::Png) else {
            return false;
        };
        let overlay = OverlayInput::new("self_test", base.clone(), Transform::default());
        self.compose_to_bytes(&base, &[overlay], OutputFormat::Png).is_ok()
    }

    fn resize(&self, decoded: RgbaImage, placement: Placement) -> RgbaImage {
        if decoded.dimensions() == (placement.width, placement.height) {
            return decoded;
        }
        imageops::resize(
            &decoded,
            placement.width,
            placement.height,
            self.config.filter().into(),
        )
    }
}

fn encode_failed(format: &str, err: &image::ImageError) -> ComposeError {
    tracing::error!(format, error = %err, "encoding failed");
    ComposeError::CompositionFailed(format!("{format} encoding failed: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba(color));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .expect("encode fixture");
        buf.into_inner()
    }

    #[test]
    fn later_z_order_paints_on_top() {
        let base = png(100, 100, [255, 255, 255, 255]);
        let compositor = Compositor::new(CompositionConfig::new(0.5, false).expect("config"));
        let red = OverlayInput::new("red", png(50, 50, [255, 0, 0, 255]), Transform::default())
            .with_z_order(2);
        let blue = OverlayInput::new("blue", png(50, 50, [0, 0, 255, 255]), Transform::default())
            .with_z_order(1);

        let out = compositor.compose(&base, &[red, blue]).expect("compose");
        assert_eq!(out.get_pixel(10, 10), &Rgba([255, 0, 0, 255]));
        assert_eq!(out.get_pixel(75, 75), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn hidden_overlays_are_skipped() {
        let base = png(100, 100, [255, 255, 255, 255]);
        let compositor = Compositor::new(CompositionConfig::new(0.5, false).expect("config"));
        let hidden = OverlayInput::new("hidden", png(50, 50, [0, 0, 0, 255]), Transform::default())
            .with_visible(false);

        let out = compositor.compose(&base, &[hidden]).expect("compose");
        assert_eq!(out.get_pixel(10, 10), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn translucent_overlay_blends() {
        let base = png(10, 10, [0, 0, 0, 255]);
        let compositor = Compositor::new(CompositionConfig::new(1.0, false).expect("config"));
        let veil = OverlayInput::new("veil", png(10, 10, [255, 255, 255, 128]), Transform::default());

        let out = compositor.compose(&base, &[veil]).expect("compose");
        let px = out.get_pixel(5, 5);
        assert!(px[0] > 100 && px[0] < 160, "got {px:?}");
        assert_eq!(px[3], 255);
    }

    #[test]
    fn bad_transform_names_overlay() {
        let base = png(10, 10, [0, 0, 0, 255]);
        let compositor = Compositor::default();
        let bad = OverlayInput::new(
            "overlay[3]",
            png(4, 4, [0, 0, 0, 255]),
            Transform::default().with_scale(f64::NAN),
        );
        match compositor.compose(&base, &[bad]) {
            Err(ComposeError::InvalidAsset { asset, .. }) => assert_eq!(asset, "overlay[3]"),
            other => panic!("expected InvalidAsset, got {other:?}"),
        }
    }

    #[test]
    fn framed_output_crops_and_shifts_overlays() {
        let base = png(1000, 800, [255, 255, 255, 255]);
        let compositor = Compositor::default();
        // 500x300 renders at 160x96 in an 800 wide frame; base x 150 is frame x 50
        let logo = OverlayInput::new(
            "logo",
            png(500, 300, [255, 0, 0, 255]),
            Transform::default().with_position(150.0, 40.0),
        );

        let out = compositor
            .compose_framed(&base, std::slice::from_ref(&logo), Some(AspectRatio::Square))
            .expect("compose");
        assert_eq!(out.dimensions(), (800, 800));
        assert_eq!(out.get_pixel(50, 40), &Rgba([255, 0, 0, 255]));
        assert_eq!(out.get_pixel(49, 40), &Rgba([255, 255, 255, 255]));
        assert_eq!(out.get_pixel(209, 135), &Rgba([255, 0, 0, 255]));
        assert_eq!(out.get_pixel(210, 40), &Rgba([255, 255, 255, 255]));

        // Positions left of the frame clamp to its edge
        let left = OverlayInput::new(
            "left",
            png(500, 300, [0, 0, 255, 255]),
            Transform::default().with_position(20.0, 0.0),
        );
        let out = compositor
            .compose_framed(&base, &[left], Some(AspectRatio::Square))
            .expect("compose");
        assert_eq!(out.get_pixel(0, 0), &Rgba([0, 0, 255, 255]));

        let full = compositor.compose(&base, &[logo]).expect("compose");
        assert_eq!(full.dimensions(), (1000, 800));
    }

    #[test]
    fn self_test_passes() {
        assert!(Compositor::default().self_test());
    }

    #[test]
    fn jpeg_output_has_jpeg_magic() {
        let base = png(16, 16, [10, 20, 30, 255]);
        let bytes = Compositor::default()
            .compose_to_bytes(&base, &[], OutputFormat::Jpeg)
            .expect("jpeg");
        assert_eq!(&bytes[0..3], &[0xFF, 0xD8, 0xFF]);
    }
}

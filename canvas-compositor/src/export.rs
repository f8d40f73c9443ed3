//! Turning an editor snapshot into compositor input.
//!
//! The browser sends a [`CanvasState`]; the server resolves every source it
//! references (see [`required_sources`]) and calls [`plan_canvas`] with the
//! bytes. Text is only composited when the client supplied a pre-rendered
//! raster for it, since glyph shaping happens client-side. In advanced mode
//! the output is cropped to the chosen aspect ratio, matching the editor.

use std::collections::HashMap;

use canvas_core::{CanvasState, ElementKind};

use crate::compose::{ComposePlan, OverlayInput, BASE_LABEL};
use crate::error::{ComposeError, ComposeResult};
use crate::layout::OverlayFit;

/// Sources that must be resolved before [`plan_canvas`] can run: the base
/// image plus every visible overlay with a raster. Duplicates are removed,
/// order is stable.
#[must_use]
pub fn required_sources(state: &CanvasState) -> Vec<&str> {
    let mut sources: Vec<&str> = Vec::new();
    let base = state.base_image().and_then(|e| e.kind.source());
    let overlays = state
        .overlays()
        .filter(|e| e.visible)
        .filter_map(|e| e.kind.source());
    for source in base.into_iter().chain(overlays) {
        if !sources.contains(&source) {
            sources.push(source);
        }
    }
    sources
}

/// Build a [`ComposePlan`] from a snapshot and the bytes of its sources,
/// keyed by source string.
///
/// # Errors
///
/// Returns [`ComposeError::InvalidAsset`] if the snapshot has no base image,
/// and [`ComposeError::AssetFetchFailed`] for any required source missing
/// from `assets`.
#[allow(clippy::implicit_hasher)]
pub fn plan_canvas(
    state: &CanvasState,
    assets: &HashMap<String, Vec<u8>>,
) -> ComposeResult<ComposePlan> {
    let base_source = state
        .base_image()
        .and_then(|e| e.kind.source())
        .ok_or_else(|| ComposeError::invalid(BASE_LABEL, "canvas has no base image"))?;
    let base = resolve(assets, BASE_LABEL, base_source)?;

    let mut overlays = Vec::new();
    for element in state.overlays().filter(|e| e.visible) {
        let label = element.id.to_string();
        let fit = match &element.kind {
            ElementKind::TextOverlay { rendered: None, .. } => {
                tracing::debug!(element = %label, "text overlay without raster skipped");
                continue;
            }
            ElementKind::TextOverlay { .. } => OverlayFit::Stretch,
            _ => OverlayFit::AspectLocked,
        };
        let Some(source) = element.kind.source() else {
            continue;
        };
        let bytes = resolve(assets, &label, source)?;
        overlays.push(
            OverlayInput::new(label, bytes, element.transform)
                .with_fit(fit)
                .with_z_order(element.z_order),
        );
    }

    if state.legacy_text.is_active() {
        tracing::debug!("legacy text has no raster; not composited");
    }

    Ok(ComposePlan {
        base,
        overlays,
        crop: state.output_crop(),
    })
}

fn resolve(assets: &HashMap<String, Vec<u8>>, label: &str, source: &str) -> ComposeResult<Vec<u8>> {
    assets
        .get(source)
        .cloned()
        .ok_or_else(|| ComposeError::fetch(label, format!("source not resolved: {source}")))
}

//! Canvas state management.
//!
//! [`CanvasState`] is an immutable snapshot of everything placed on the
//! canvas. [`CanvasModel`] owns the current snapshot for one editing session
//! and produces a new one for every mutation, so callers can keep old
//! snapshots around for diffing or rollback.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    CanvasError, CanvasResult, Corner, Element, ElementId, ElementKind, Frame, SizingPolicy,
    Transform,
};

/// Output aspect ratio of the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 16:9 landscape.
    #[default]
    #[serde(rename = "16:9")]
    Landscape16x9,
    /// 1:1 square.
    #[serde(rename = "1:1")]
    Square,
    /// 9:16 portrait.
    #[serde(rename = "9:16")]
    Portrait9x16,
    /// 4:3 landscape.
    #[serde(rename = "4:3")]
    Landscape4x3,
    /// 3:4 portrait.
    #[serde(rename = "3:4")]
    Portrait3x4,
}

impl AspectRatio {
    /// Width divided by height.
    #[must_use]
    pub fn ratio(self) -> f64 {
        match self {
            Self::Landscape16x9 => 16.0 / 9.0,
            Self::Square => 1.0,
            Self::Portrait9x16 => 9.0 / 16.0,
            Self::Landscape4x3 => 4.0 / 3.0,
            Self::Portrait3x4 => 3.0 / 4.0,
        }
    }

    /// The `w:h` label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Landscape16x9 => "16:9",
            Self::Square => "1:1",
            Self::Portrait9x16 => "9:16",
            Self::Landscape4x3 => "4:3",
            Self::Portrait3x4 => "3:4",
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AspectRatio {
    type Err = CanvasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "16:9" => Ok(Self::Landscape16x9),
            "1:1" => Ok(Self::Square),
            "9:16" => Ok(Self::Portrait9x16),
            "4:3" => Ok(Self::Landscape4x3),
            "3:4" => Ok(Self::Portrait3x4),
            other => Err(CanvasError::InvalidViewport(format!(
                "unsupported aspect ratio: {other}"
            ))),
        }
    }
}

/// The single text field older clients send alongside the text-overlay list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyText {
    /// Text content.
    pub content: String,
    /// Whether the text is shown.
    pub visible: bool,
}

impl LegacyText {
    /// Visible and non-blank.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.visible && !self.content.trim().is_empty()
    }
}

/// An immutable snapshot of the canvas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanvasState {
    /// Elements in paint order; the last one wins on overlap.
    pub elements: Vec<Element>,
    /// Output aspect ratio.
    pub aspect_ratio: AspectRatio,
    /// Gates aspect ratio changes.
    pub advanced_mode_enabled: bool,
    /// Legacy single text overlay.
    #[serde(default)]
    pub legacy_text: LegacyText,
    /// Incremented by every mutation.
    #[serde(default)]
    pub revision: u64,
}

impl CanvasState {
    /// Get an element by ID.
    #[must_use]
    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.iter().find(|e| e.id == id)
    }

    /// The base image element, if one has been placed.
    #[must_use]
    pub fn base_image(&self) -> Option<&Element> {
        self.elements.iter().find(|e| e.kind.is_base())
    }

    /// Overlays (everything but the base image) in paint order.
    pub fn overlays(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(|e| !e.kind.is_base())
    }

    /// Text overlays from the element list.
    pub fn text_overlays(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(|e| e.kind.is_text())
    }

    /// Whether nothing would be visible on the canvas.
    ///
    /// Both the element list (which includes the text-overlay list) and the
    /// legacy text field are considered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.elements.iter().any(|e| e.visible) && !self.legacy_text.is_active()
    }

    /// Get the number of elements.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Serialize the snapshot to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> CanvasResult<String> {
        serde_json::to_string(self).map_err(CanvasError::Serialization)
    }

    /// Deserialize a snapshot from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails or element IDs repeat.
    pub fn from_json(json: &str) -> CanvasResult<Self> {
        let state: Self = serde_json::from_str(json)?;
        state.check_unique_ids()?;
        Ok(state)
    }

    /// Check that element IDs are unique.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::DuplicateElement`] naming the first repeat.
    pub fn check_unique_ids(&self) -> CanvasResult<()> {
        let mut seen = std::collections::HashSet::with_capacity(self.elements.len());
        for element in &self.elements {
            if !seen.insert(element.id) {
                return Err(CanvasError::DuplicateElement(element.id.to_string()));
            }
        }
        Ok(())
    }

    /// The crop applied to the output. The aspect ratio only takes effect
    /// in advanced mode; otherwise the base image keeps its own shape.
    #[must_use]
    pub fn output_crop(&self) -> Option<AspectRatio> {
        self.advanced_mode_enabled.then_some(self.aspect_ratio)
    }

    /// The region of the base image that is edited and exported, if a base
    /// image with known dimensions is placed.
    #[must_use]
    pub fn output_frame(&self) -> Option<Frame> {
        let size = self.base_image()?.kind.natural_size()?;
        Some(Frame::cropped(size, self.output_crop()))
    }

    fn position(&self, id: ElementId) -> CanvasResult<usize> {
        self.elements
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| CanvasError::ElementNotFound(id.to_string()))
    }
}

/// Owns the current [`CanvasState`] for one editing session.
///
/// Every mutation is synchronous and swaps in a fresh snapshot; snapshots
/// handed out earlier are never modified.
#[derive(Debug, Clone, Default)]
pub struct CanvasModel {
    current: Arc<CanvasState>,
    next_z_order: u64,
}

impl CanvasModel {
    /// Create an empty model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a model from an existing snapshot.
    #[must_use]
    pub fn from_state(state: CanvasState) -> Self {
        let next_z_order = state
            .elements
            .iter()
            .map(|e| e.z_order + 1)
            .max()
            .unwrap_or(0);
        Self {
            current: Arc::new(state),
            next_z_order,
        }
    }

    /// The current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<CanvasState> {
        Arc::clone(&self.current)
    }

    /// Borrow the current snapshot.
    #[must_use]
    pub fn state(&self) -> &CanvasState {
        &self.current
    }

    /// Reinstate an earlier snapshot. The revision keeps counting forward.
    pub fn restore(&mut self, snapshot: Arc<CanvasState>) {
        let mut next = CanvasState::clone(&snapshot);
        next.revision = self.current.revision + 1;
        let restored_z = next.elements.iter().map(|e| e.z_order + 1).max();
        self.next_z_order = self.next_z_order.max(restored_z.unwrap_or(0));
        self.current = Arc::new(next);
    }

    /// Add an element and return its ID.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::InvalidTransform`] if the initial transform
    /// violates the positive-extent invariant.
    pub fn add_element(
        &mut self,
        kind: ElementKind,
        initial_transform: Transform,
    ) -> CanvasResult<ElementId> {
        initial_transform.validate()?;
        let mut element = Element::new(kind).with_transform(initial_transform);
        element.z_order = self.next_z_order;
        let id = element.id;
        self.commit(|state| state.elements.push(element));
        self.next_z_order += 1;
        tracing::debug!(%id, "element added");
        Ok(id)
    }

    /// Remove an element.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::ElementNotFound`] if the element is not found.
    pub fn remove_element(&mut self, id: ElementId) -> CanvasResult<Element> {
        let mut removed = None;
        self.try_commit(|state| {
            let index = state.position(id)?;
            removed = Some(state.elements.remove(index));
            Ok(())
        })?;
        tracing::debug!(%id, "element removed");
        removed.ok_or_else(|| CanvasError::ElementNotFound(id.to_string()))
    }

    /// Replace an element's transform wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::ElementNotFound`] for an unknown ID and
    /// [`CanvasError::InvalidTransform`] for a degenerate transform.
    pub fn update_transform(&mut self, id: ElementId, transform: Transform) -> CanvasResult<()> {
        transform.validate()?;
        self.try_commit(|state| {
            let index = state.position(id)?;
            state.elements[index].transform = transform;
            Ok(())
        })
    }

    /// Change the output aspect ratio.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::PermissionDenied`] unless advanced mode is
    /// enabled; the state is left unchanged.
    pub fn set_aspect_ratio(&mut self, ratio: AspectRatio) -> CanvasResult<()> {
        if !self.current.advanced_mode_enabled {
            tracing::debug!(%ratio, "aspect ratio change rejected: advanced mode disabled");
            return Err(CanvasError::PermissionDenied(
                "aspect ratio can only be changed in advanced mode".to_string(),
            ));
        }
        self.commit(|state| state.aspect_ratio = ratio);
        Ok(())
    }

    /// Enable or disable advanced mode.
    pub fn set_advanced_mode(&mut self, enabled: bool) {
        self.commit(|state| state.advanced_mode_enabled = enabled);
    }

    /// Show or hide an element.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::ElementNotFound`] if the element is not found.
    pub fn set_visibility(&mut self, id: ElementId, visible: bool) -> CanvasResult<()> {
        self.try_commit(|state| {
            let index = state.position(id)?;
            state.elements[index].visible = visible;
            Ok(())
        })
    }

    /// Replace the content of a text overlay.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::ElementNotFound`] for an unknown ID and
    /// [`CanvasError::InvalidTransform`] if the element is not text.
    pub fn set_text(&mut self, id: ElementId, text: impl Into<String>) -> CanvasResult<()> {
        let text = text.into();
        self.with_text(id, |content, _| *content = text)
    }

    /// Replace the color of a text overlay.
    ///
    /// # Errors
    ///
    /// Same as [`CanvasModel::set_text`].
    pub fn set_text_color(&mut self, id: ElementId, color: impl Into<String>) -> CanvasResult<()> {
        let color = color.into();
        self.with_text(id, |_, c| *c = color)
    }

    /// Set the legacy single text overlay.
    pub fn set_legacy_text(&mut self, content: impl Into<String>, visible: bool) {
        let legacy = LegacyText {
            content: content.into(),
            visible,
        };
        self.commit(|state| state.legacy_text = legacy);
    }

    /// Resize every aspect-locked overlay to the extent the compositor
    /// will render for its scale, keeping its position. A no-op without a
    /// base image.
    pub fn refit_overlays(&mut self, sizing: &SizingPolicy) {
        let Some(frame) = self.current.output_frame() else {
            return;
        };
        let stale = self.current.overlays().any(|e| fitted_extent(e, frame, sizing).is_some());
        if !stale {
            return;
        }
        self.commit(|state| {
            for element in &mut state.elements {
                if let Some((width, height)) = fitted_extent(element, frame, sizing) {
                    element.transform.width = width;
                    element.transform.height = height;
                }
            }
        });
        tracing::debug!(?frame, "overlays refitted");
    }

    /// Find the topmost visible overlay containing an image-space point.
    ///
    /// The base image is never returned; it does not move.
    #[must_use]
    pub fn element_at(&self, x: f64, y: f64) -> Option<ElementId> {
        self.current
            .elements
            .iter()
            .rev()
            .find(|e| e.visible && !e.kind.is_base() && e.contains_point(x, y))
            .map(|e| e.id)
    }

    /// Find the topmost visible overlay with a corner within `radius`
    /// (image-space pixels) of the point.
    #[must_use]
    pub fn handle_at(&self, x: f64, y: f64, radius: f64) -> Option<(ElementId, Corner)> {
        self.current
            .elements
            .iter()
            .rev()
            .filter(|e| e.visible && !e.kind.is_base())
            .find_map(|e| {
                Corner::ALL.into_iter().find_map(|corner| {
                    let (cx, cy) = e.transform.corner(corner);
                    let within = (cx - x).abs() <= radius && (cy - y).abs() <= radius;
                    within.then_some((e.id, corner))
                })
            })
    }

    fn with_text(
        &mut self,
        id: ElementId,
        f: impl FnOnce(&mut String, &mut String),
    ) -> CanvasResult<()> {
        self.try_commit(|state| {
            let index = state.position(id)?;
            match &mut state.elements[index].kind {
                ElementKind::TextOverlay { content, color, .. } => {
                    f(content, color);
                    Ok(())
                }
                _ => Err(CanvasError::InvalidTransform(format!(
                    "element {id} is not a text overlay"
                ))),
            }
        })
    }

    fn commit(&mut self, f: impl FnOnce(&mut CanvasState)) {
        let mut next = CanvasState::clone(&self.current);
        f(&mut next);
        next.revision = self.current.revision + 1;
        self.current = Arc::new(next);
    }

    /// Apply `f` to a copy of the current state; swap it in only on success.
    fn try_commit(
        &mut self,
        f: impl FnOnce(&mut CanvasState) -> CanvasResult<()>,
    ) -> CanvasResult<()> {
        let mut next = CanvasState::clone(&self.current);
        f(&mut next)?;
        next.revision = self.current.revision + 1;
        self.current = Arc::new(next);
        Ok(())
    }
}

/// The extent `element` should have, if it differs from its current one.
fn fitted_extent(element: &Element, frame: Frame, sizing: &SizingPolicy) -> Option<(f64, f64)> {
    if element.kind.is_base() || !element.kind.is_aspect_locked() {
        return None;
    }
    let natural = element.kind.natural_size()?;
    let (width, height) = sizing.overlay_extent(frame.extent(), natural, element.transform.scale);
    let t = &element.transform;
    let same = (t.width - width).abs() < 1e-9 && (t.height - height).abs() < 1e-9;
    (!same && width > 0.0 && height > 0.0).then_some((width, height))
}

//! Drag and resize state machine.
//!
//! ```text
//!            pointer down on body               pointer down on handle
//!   Dragging <──────────────────── Idle ────────────────────────> Resizing
//!      │  ▲ move                   ▲  ▲                        move ▲  │
//!      └──┘                        │  │                             └──┘
//!      │        up / cancel        │  │        up / cancel           │
//!      └───────────────────────────┘  └──────────────────────────────┘
//! ```
//!
//! Pointer up and platform cancel keep the last transform. The Escape key
//! rolls the element back to the transform it had when the gesture began.
//! Only the pointer that started a gesture can drive it, and only one
//! gesture is active at a time.
//!
//! The controller does not clamp elements to the canvas; the authoritative
//! clamp happens at composition time.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    CanvasError, CanvasModel, CanvasResult, CanvasState, Corner, ElementId, InputEvent, Point,
    PointerEvent, PointerPhase, Transform, Viewport,
};

/// Tuning for gesture handling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractionConfig {
    /// Smallest scale a resize may produce.
    pub min_scale: f64,
    /// Hit radius of the corner resize handles, in display pixels.
    pub handle_radius: f64,
    /// Smallest width or height a resize may produce, in image pixels.
    pub min_extent: f64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.1,
            handle_radius: 12.0,
            min_extent: 1.0,
        }
    }
}

/// An active drag gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSession {
    /// Element being moved.
    pub element_id: ElementId,
    /// Pointer driving the gesture.
    pub pointer_id: u32,
    /// Display-space position where the gesture began.
    pub pointer_start: Point,
    /// Element transform when the gesture began.
    pub transform_start: Transform,
}

/// An active resize gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeSession {
    /// Element being resized.
    pub element_id: ElementId,
    /// Pointer driving the gesture.
    pub pointer_id: u32,
    /// Display-space position where the gesture began.
    pub pointer_start: Point,
    /// Element transform when the gesture began.
    pub transform_start: Transform,
    /// The corner that stays fixed; the dragged handle is its opposite.
    pub anchor_corner: Corner,
    /// Whether width and height scale together.
    pub aspect_locked: bool,
}

/// Current gesture state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum InteractionState {
    /// No gesture in progress.
    #[default]
    Idle,
    /// Moving an element.
    Dragging(DragSession),
    /// Resizing an element.
    Resizing(ResizeSession),
}

impl InteractionState {
    /// The phase without session data.
    #[must_use]
    pub fn phase(&self) -> InteractionPhase {
        match self {
            Self::Idle => InteractionPhase::Idle,
            Self::Dragging(_) => InteractionPhase::Dragging,
            Self::Resizing(_) => InteractionPhase::Resizing,
        }
    }

    fn pointer_id(&self) -> Option<u32> {
        match self {
            Self::Idle => None,
            Self::Dragging(s) => Some(s.pointer_id),
            Self::Resizing(s) => Some(s.pointer_id),
        }
    }

    fn rollback_target(&self) -> Option<(ElementId, Transform)> {
        match self {
            Self::Idle => None,
            Self::Dragging(s) => Some((s.element_id, s.transform_start)),
            Self::Resizing(s) => Some((s.element_id, s.transform_start)),
        }
    }
}

/// State name reported to hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionPhase {
    /// No gesture.
    Idle,
    /// Drag in progress.
    Dragging,
    /// Resize in progress.
    Resizing,
}

/// Result of feeding one event to the controller.
#[derive(Debug, Clone)]
pub struct Transition {
    /// State after the event.
    pub phase: InteractionPhase,
    /// Whether the canvas was mutated.
    pub changed: bool,
    /// Canvas snapshot after the event.
    pub snapshot: Arc<CanvasState>,
}

/// Turns pointer and key events into transform updates on a [`CanvasModel`].
#[derive(Debug, Clone, Default)]
pub struct InteractionController {
    config: InteractionConfig,
    state: InteractionState,
}

impl InteractionController {
    /// Create an idle controller.
    #[must_use]
    pub fn new(config: InteractionConfig) -> Self {
        Self {
            config,
            state: InteractionState::Idle,
        }
    }

    /// Current gesture state.
    #[must_use]
    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    /// Dispatch any input event.
    ///
    /// # Errors
    ///
    /// Propagates model errors from the underlying transition. The
    /// controller is back in `Idle` whenever an error is returned.
    pub fn handle_event(
        &mut self,
        model: &mut CanvasModel,
        viewport: &Viewport,
        event: &InputEvent,
    ) -> CanvasResult<Transition> {
        match event {
            InputEvent::Pointer(pointer) => match pointer.phase {
                PointerPhase::Down => Ok(self.pointer_down(model, viewport, pointer)),
                PointerPhase::Move => self.pointer_move(model, viewport, pointer),
                PointerPhase::Up | PointerPhase::Cancel => Ok(self.pointer_up(model, pointer)),
            },
            key if key.is_cancel_key() => self.cancel(model),
            InputEvent::Key { .. } => Ok(self.unchanged(model)),
        }
    }

    /// Begin a resize if the pointer is on a handle, otherwise a drag if it
    /// is on an element. Ignored while a gesture is active or for
    /// non-primary pointers.
    pub fn pointer_down(
        &mut self,
        model: &CanvasModel,
        viewport: &Viewport,
        event: &PointerEvent,
    ) -> Transition {
        if !event.is_primary || self.state != InteractionState::Idle {
            return self.unchanged(model);
        }

        let at = viewport.to_image_space(event.position());
        let radius = viewport.length_to_image_space(self.config.handle_radius);

        if let Some((id, handle)) = model.handle_at(at.x, at.y, radius) {
            if let Some(element) = model.state().element(id) {
                self.state = InteractionState::Resizing(ResizeSession {
                    element_id: id,
                    pointer_id: event.pointer_id,
                    pointer_start: event.position(),
                    transform_start: element.transform,
                    anchor_corner: handle.opposite(),
                    aspect_locked: element.kind.is_aspect_locked(),
                });
                tracing::debug!(%id, ?handle, "resize started");
            }
        } else if let Some(id) = model.element_at(at.x, at.y) {
            if let Some(element) = model.state().element(id) {
                self.state = InteractionState::Dragging(DragSession {
                    element_id: id,
                    pointer_id: event.pointer_id,
                    pointer_start: event.position(),
                    transform_start: element.transform,
                });
                tracing::debug!(%id, "drag started");
            }
        }

        self.unchanged(model)
    }

    /// Update the active gesture. A move with no active session, or from a
    /// pointer other than the one that started the session, is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::ElementNotFound`] if the element was removed
    /// mid-gesture; the session is discarded.
    pub fn pointer_move(
        &mut self,
        model: &mut CanvasModel,
        viewport: &Viewport,
        event: &PointerEvent,
    ) -> CanvasResult<Transition> {
        if self.state.pointer_id() != Some(event.pointer_id) {
            return Ok(self.unchanged(model));
        }

        let (id, transform) = match &self.state {
            InteractionState::Idle => return Ok(self.unchanged(model)),
            InteractionState::Dragging(session) => {
                let delta = pointer_delta(viewport, session.pointer_start, event);
                let moved = session
                    .transform_start
                    .with_position(
                        session.transform_start.x + delta.x,
                        session.transform_start.y + delta.y,
                    );
                (session.element_id, moved)
            }
            InteractionState::Resizing(session) => {
                let delta = pointer_delta(viewport, session.pointer_start, event);
                (session.element_id, resize(session, delta, &self.config))
            }
        };

        if let Err(err) = model.update_transform(id, transform) {
            tracing::warn!(%id, error = %err, "gesture aborted");
            self.state = InteractionState::Idle;
            return Err(err);
        }
        Ok(Transition {
            phase: self.state.phase(),
            changed: true,
            snapshot: model.snapshot(),
        })
    }

    /// End the active gesture, keeping the element where it is.
    pub fn pointer_up(&mut self, model: &CanvasModel, event: &PointerEvent) -> Transition {
        if self.state.pointer_id() == Some(event.pointer_id) {
            tracing::debug!(phase = ?self.state.phase(), "gesture finished");
            self.state = InteractionState::Idle;
        }
        self.unchanged(model)
    }

    /// Abort the active gesture and restore the transform it started from.
    ///
    /// # Errors
    ///
    /// Propagates model errors other than the element having been removed.
    pub fn cancel(&mut self, model: &mut CanvasModel) -> CanvasResult<Transition> {
        let Some((id, transform)) = self.state.rollback_target() else {
            return Ok(self.unchanged(model));
        };
        self.state = InteractionState::Idle;
        match model.update_transform(id, transform) {
            Ok(()) => {
                tracing::debug!(%id, "gesture rolled back");
                Ok(Transition {
                    phase: InteractionPhase::Idle,
                    changed: true,
                    snapshot: model.snapshot(),
                })
            }
            Err(CanvasError::ElementNotFound(_)) => Ok(self.unchanged(model)),
            Err(err) => Err(err),
        }
    }

    fn unchanged(&self, model: &CanvasModel) -> Transition {
        Transition {
            phase: self.state.phase(),
            changed: false,
            snapshot: model.snapshot(),
        }
    }
}

fn pointer_delta(viewport: &Viewport, start: Point, event: &PointerEvent) -> Point {
    viewport.delta_to_image_space(event.x - start.x, event.y - start.y)
}

/// New transform for a resize whose dragged handle moved by `delta`
/// (image space) from where the gesture began.
fn resize(session: &ResizeSession, delta: Point, config: &InteractionConfig) -> Transform {
    let start = session.transform_start;
    let handle = session.anchor_corner.opposite();
    let sx = if handle.is_right() { 1.0 } else { -1.0 };
    let sy = if handle.is_bottom() { 1.0 } else { -1.0 };
    let (anchor_x, anchor_y) = start.corner(session.anchor_corner);

    let (width, height, scale) = if session.aspect_locked {
        // Project the dragged diagonal onto the original one.
        let grown_w = start.width + sx * delta.x;
        let grown_h = start.height + sy * delta.y;
        let diagonal = start.width * start.width + start.height * start.height;
        let ratio = (grown_w * start.width + grown_h * start.height) / diagonal;
        let floor = (config.min_scale / start.scale)
            .max(config.min_extent / start.width.min(start.height));
        let ratio = ratio.max(floor);
        (start.width * ratio, start.height * ratio, start.scale * ratio)
    } else {
        // Text reflows: only the box width follows the pointer.
        let width = (start.width + sx * delta.x).max(config.min_extent);
        (width, start.height, start.scale)
    };

    let x = if handle.is_right() {
        anchor_x
    } else {
        anchor_x - width
    };
    let y = if handle.is_bottom() {
        anchor_y
    } else {
        anchor_y - height
    };

    Transform {
        x,
        y,
        width,
        height,
        scale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ElementKind;

    fn logo() -> ElementKind {
        ElementKind::LogoOverlay {
            src: "logo.png".to_string(),
            natural_width: 500,
            natural_height: 300,
        }
    }

    fn identity_viewport() -> Viewport {
        Viewport::new(1000.0, 800.0, 1000.0, 800.0).expect("viewport")
    }

    fn down(x: f64, y: f64) -> PointerEvent {
        PointerEvent::primary(PointerPhase::Down, x, y, 0)
    }

    fn mv(x: f64, y: f64) -> PointerEvent {
        PointerEvent::primary(PointerPhase::Move, x, y, 16)
    }

    fn up(x: f64, y: f64) -> PointerEvent {
        PointerEvent::primary(PointerPhase::Up, x, y, 32)
    }

    #[test]
    fn move_without_session_is_noop() {
        let mut model = CanvasModel::new();
        model
            .add_element(logo(), Transform::new(100.0, 100.0, 200.0, 120.0))
            .expect("add");
        let revision = model.state().revision;
        let mut ctl = InteractionController::default();

        let t = ctl
            .pointer_move(&mut model, &identity_viewport(), &mv(50.0, 50.0))
            .expect("move");
        assert!(!t.changed);
        assert_eq!(t.phase, InteractionPhase::Idle);
        assert_eq!(model.state().revision, revision);
    }

    #[test]
    fn drag_translates_by_image_space_delta() {
        let mut model = CanvasModel::new();
        let id = model
            .add_element(logo(), Transform::new(100.0, 100.0, 200.0, 120.0))
            .expect("add");
        // Display is half the image size, so display deltas double
        let vp = Viewport::new(500.0, 400.0, 1000.0, 800.0).expect("viewport");
        let mut ctl = InteractionController::default();

        let start = vp.to_display_space(Point::new(200.0, 160.0));
        let t = ctl.pointer_down(&model, &vp, &down(start.x, start.y));
        assert_eq!(t.phase, InteractionPhase::Dragging);

        ctl.pointer_move(&mut model, &vp, &mv(start.x + 10.0, start.y + 5.0))
            .expect("move");
        let tf = model.state().element(id).expect("el").transform;
        assert!((tf.x - 120.0).abs() < 1e-9);
        assert!((tf.y - 110.0).abs() < 1e-9);
        assert!((tf.width - 200.0).abs() < 1e-9);

        let t = ctl.pointer_up(&model, &up(start.x + 10.0, start.y + 5.0));
        assert_eq!(t.phase, InteractionPhase::Idle);
        let tf = model.state().element(id).expect("el").transform;
        assert!((tf.x - 120.0).abs() < 1e-9);
    }

    #[test]
    fn escape_rolls_back_to_start() {
        let mut model = CanvasModel::new();
        let start = Transform::new(100.0, 100.0, 200.0, 120.0);
        let id = model.add_element(logo(), start).expect("add");
        let vp = identity_viewport();
        let mut ctl = InteractionController::default();

        ctl.pointer_down(&model, &vp, &down(150.0, 150.0));
        ctl.pointer_move(&mut model, &vp, &mv(400.0, 300.0)).expect("move");
        assert!((model.state().element(id).expect("el").transform.x - 350.0).abs() < 1e-9);

        let escape = InputEvent::Key {
            key: "Escape".to_string(),
            pressed: true,
            modifiers: crate::KeyModifiers::default(),
        };
        let t = ctl.handle_event(&mut model, &vp, &escape).expect("cancel");
        assert!(t.changed);
        assert_eq!(t.phase, InteractionPhase::Idle);
        assert_eq!(model.state().element(id).expect("el").transform, start);
    }

    #[test]
    fn platform_cancel_keeps_last_transform() {
        let mut model = CanvasModel::new();
        let id = model
            .add_element(logo(), Transform::new(100.0, 100.0, 200.0, 120.0))
            .expect("add");
        let vp = identity_viewport();
        let mut ctl = InteractionController::default();

        ctl.pointer_down(&model, &vp, &down(150.0, 150.0));
        ctl.pointer_move(&mut model, &vp, &mv(160.0, 150.0)).expect("move");
        let cancel = InputEvent::Pointer(PointerEvent::primary(
            PointerPhase::Cancel,
            160.0,
            150.0,
            40,
        ));
        ctl.handle_event(&mut model, &vp, &cancel).expect("cancel");
        assert_eq!(ctl.state().phase(), InteractionPhase::Idle);
        assert!((model.state().element(id).expect("el").transform.x - 110.0).abs() < 1e-9);
    }

    #[test]
    fn secondary_pointers_do_not_drive_sessions() {
        let mut model = CanvasModel::new();
        let id = model
            .add_element(logo(), Transform::new(100.0, 100.0, 200.0, 120.0))
            .expect("add");
        let vp = identity_viewport();
        let mut ctl = InteractionController::default();

        let mut second = down(150.0, 150.0);
        second.pointer_id = 7;
        second.is_primary = false;
        ctl.pointer_down(&model, &vp, &second);
        assert_eq!(ctl.state().phase(), InteractionPhase::Idle);

        ctl.pointer_down(&model, &vp, &down(150.0, 150.0));
        let mut stray = mv(500.0, 500.0);
        stray.pointer_id = 7;
        let t = ctl.pointer_move(&mut model, &vp, &stray).expect("move");
        assert!(!t.changed);
        assert!((model.state().element(id).expect("el").transform.x - 100.0).abs() < 1e-9);
    }

    #[test]
    fn gestures_are_exclusive() {
        let mut model = CanvasModel::new();
        let first = model
            .add_element(logo(), Transform::new(0.0, 0.0, 100.0, 100.0))
            .expect("first");
        model
            .add_element(logo(), Transform::new(500.0, 500.0, 100.0, 100.0))
            .expect("second");
        let vp = identity_viewport();
        let mut ctl = InteractionController::default();

        ctl.pointer_down(&model, &vp, &down(50.0, 50.0));
        ctl.pointer_down(&model, &vp, &down(550.0, 550.0));
        match ctl.state() {
            InteractionState::Dragging(s) => assert_eq!(s.element_id, first),
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[test]
    fn resize_respects_min_scale() {
        let mut model = CanvasModel::new();
        let id = model
            .add_element(logo(), Transform::new(100.0, 100.0, 200.0, 120.0))
            .expect("add");
        let vp = identity_viewport();
        let mut ctl = InteractionController::default();

        // Grab the bottom-right handle and collapse it past the anchor
        ctl.pointer_down(&model, &vp, &down(300.0, 220.0));
        assert_eq!(ctl.state().phase(), InteractionPhase::Resizing);
        ctl.pointer_move(&mut model, &vp, &mv(0.0, 0.0)).expect("move");

        let tf = model.state().element(id).expect("el").transform;
        assert!((tf.scale - 0.1).abs() < 1e-9);
        assert!(tf.width > 0.0 && tf.height > 0.0);
        assert!((tf.x - 100.0).abs() < 1e-9);
        assert!((tf.y - 100.0).abs() < 1e-9);
    }

    #[test]
    fn text_resize_changes_width_only() {
        let mut model = CanvasModel::new();
        let id = model
            .add_element(
                ElementKind::TextOverlay {
                    content: "Grand opening".to_string(),
                    font_size: 24.0,
                    color: "#ffffff".to_string(),
                    rendered: None,
                },
                Transform::new(100.0, 100.0, 200.0, 40.0),
            )
            .expect("add");
        let vp = identity_viewport();
        let mut ctl = InteractionController::default();

        ctl.pointer_down(&model, &vp, &down(300.0, 140.0));
        ctl.pointer_move(&mut model, &vp, &mv(350.0, 200.0)).expect("move");

        let tf = model.state().element(id).expect("el").transform;
        assert!((tf.width - 250.0).abs() < 1e-9);
        assert!((tf.height - 40.0).abs() < 1e-9);
        assert!((tf.scale - 1.0).abs() < 1e-9);
    }

    #[test]
    fn removed_element_aborts_gesture() {
        let mut model = CanvasModel::new();
        let id = model
            .add_element(logo(), Transform::new(100.0, 100.0, 200.0, 120.0))
            .expect("add");
        let vp = identity_viewport();
        let mut ctl = InteractionController::default();

        ctl.pointer_down(&model, &vp, &down(150.0, 150.0));
        model.remove_element(id).expect("remove");
        let result = ctl.pointer_move(&mut model, &vp, &mv(160.0, 150.0));
        assert!(matches!(result, Err(CanvasError::ElementNotFound(_))));
        assert_eq!(ctl.state().phase(), InteractionPhase::Idle);
    }
}

//! Interaction Scenario Tests
//!
//! Drives the controller the way a browser host would:
//! - Corner resize with a fixed anchor
//! - Drag under zoom and crop
//! - Escape rollback after several moves
//! - Snapshot history across a gesture

use canvas_core::{
    AspectRatio, CanvasError, CanvasModel, Corner, ElementId, ElementKind, InputEvent,
    InteractionController, InteractionPhase, InteractionState, KeyModifiers, Point, PointerEvent,
    PointerPhase, Transform, Viewport,
};

fn logo(width: u32, height: u32) -> ElementKind {
    ElementKind::LogoOverlay {
        src: "https://cdn.example.com/logo.png".to_string(),
        natural_width: width,
        natural_height: height,
    }
}

fn pointer(phase: PointerPhase, at: Point) -> InputEvent {
    InputEvent::Pointer(PointerEvent::primary(phase, at.x, at.y, 0))
}

fn escape() -> InputEvent {
    InputEvent::Key {
        key: "Escape".to_string(),
        pressed: true,
        modifiers: KeyModifiers::default(),
    }
}

fn transform_of(model: &CanvasModel, id: ElementId) -> Transform {
    model.state().element(id).expect("element exists").transform
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}

// ============================================================================
// Resize
// ============================================================================

#[test]
fn test_resize_from_top_left_doubles_scale_and_keeps_anchor() {
    let mut model = CanvasModel::new();
    let id = model
        .add_element(logo(200, 100), Transform::new(100.0, 100.0, 100.0, 50.0))
        .expect("add");
    let vp = Viewport::new(1000.0, 800.0, 1000.0, 800.0).expect("viewport");
    let mut ctl = InteractionController::default();

    // Grab the top-left handle; the bottom-right corner is the anchor
    ctl.handle_event(&mut model, &vp, &pointer(PointerPhase::Down, Point::new(100.0, 100.0)))
        .expect("down");
    match ctl.state() {
        InteractionState::Resizing(session) => {
            assert_eq!(session.anchor_corner, Corner::BottomRight);
        }
        other => panic!("expected resize, got {other:?}"),
    }

    let anchor_before = transform_of(&model, id).corner(Corner::BottomRight);
    ctl.handle_event(&mut model, &vp, &pointer(PointerPhase::Move, Point::new(0.0, 50.0)))
        .expect("move");

    let t = transform_of(&model, id);
    assert_close(t.scale, 2.0);
    assert_close(t.width, 200.0);
    assert_close(t.height, 100.0);
    let anchor_after = t.corner(Corner::BottomRight);
    assert_close(anchor_after.0, anchor_before.0);
    assert_close(anchor_after.1, anchor_before.1);

    let done = ctl
        .handle_event(&mut model, &vp, &pointer(PointerPhase::Up, Point::new(0.0, 50.0)))
        .expect("up");
    assert_eq!(done.phase, InteractionPhase::Idle);
    assert_close(transform_of(&model, id).scale, 2.0);
}

#[test]
fn test_resize_keeps_aspect_for_off_diagonal_drags() {
    let mut model = CanvasModel::new();
    let id = model
        .add_element(logo(500, 300), Transform::new(200.0, 200.0, 200.0, 120.0))
        .expect("add");
    let vp = Viewport::new(1000.0, 800.0, 1000.0, 800.0).expect("viewport");
    let mut ctl = InteractionController::default();

    ctl.handle_event(&mut model, &vp, &pointer(PointerPhase::Down, Point::new(400.0, 200.0)))
        .expect("down on top-right handle");
    ctl.handle_event(&mut model, &vp, &pointer(PointerPhase::Move, Point::new(470.0, 230.0)))
        .expect("move");

    let t = transform_of(&model, id);
    assert_close(t.height / t.width, 120.0 / 200.0);
    // Anchor is bottom-left
    assert_close(t.x, 200.0);
    assert_close(t.y + t.height, 320.0);
}

// ============================================================================
// Drag
// ============================================================================

#[test]
fn test_drag_under_zoom_and_crop() {
    let mut model = CanvasModel::new();
    let id = model
        .add_element(logo(500, 300), Transform::new(400.0, 300.0, 200.0, 120.0))
        .expect("add");
    let vp = Viewport::new(600.0, 600.0, 1200.0, 800.0)
        .expect("viewport")
        .with_crop(Some(AspectRatio::Square))
        .with_zoom(1.5)
        .expect("zoom");
    let mut ctl = InteractionController::default();

    let grab = vp.to_display_space(Point::new(500.0, 360.0));
    ctl.handle_event(&mut model, &vp, &pointer(PointerPhase::Down, grab))
        .expect("down");
    assert_eq!(ctl.state().phase(), InteractionPhase::Dragging);

    let target = vp.to_display_space(Point::new(560.0, 330.0));
    ctl.handle_event(&mut model, &vp, &pointer(PointerPhase::Move, target))
        .expect("move");

    let t = transform_of(&model, id);
    assert_close(t.x, 460.0);
    assert_close(t.y, 270.0);
    assert_close(t.width, 200.0);
}

#[test]
fn test_pointer_down_on_empty_area_stays_idle() {
    let mut model = CanvasModel::new();
    model
        .add_element(
            ElementKind::BaseImage {
                src: "base.jpg".to_string(),
                natural_width: 1000,
                natural_height: 800,
            },
            Transform::new(0.0, 0.0, 1000.0, 800.0),
        )
        .expect("base");
    let vp = Viewport::new(1000.0, 800.0, 1000.0, 800.0).expect("viewport");
    let mut ctl = InteractionController::default();

    let t = ctl
        .handle_event(&mut model, &vp, &pointer(PointerPhase::Down, Point::new(500.0, 400.0)))
        .expect("down");
    assert_eq!(t.phase, InteractionPhase::Idle);
    assert!(!t.changed);
}

// ============================================================================
// Cancel and history
// ============================================================================

#[test]
fn test_escape_after_many_moves_restores_start() {
    let mut model = CanvasModel::new();
    let start = Transform::new(100.0, 100.0, 200.0, 120.0);
    let id = model.add_element(logo(500, 300), start).expect("add");
    let vp = Viewport::new(1000.0, 800.0, 1000.0, 800.0).expect("viewport");
    let mut ctl = InteractionController::default();

    ctl.handle_event(&mut model, &vp, &pointer(PointerPhase::Down, Point::new(150.0, 150.0)))
        .expect("down");
    for step in 1..=10 {
        let offset = f64::from(step) * 7.0;
        ctl.handle_event(
            &mut model,
            &vp,
            &pointer(PointerPhase::Move, Point::new(150.0 + offset, 150.0 - offset)),
        )
        .expect("move");
    }
    assert!(transform_of(&model, id) != start);

    let rolled = ctl.handle_event(&mut model, &vp, &escape()).expect("escape");
    assert!(rolled.changed);
    assert_eq!(transform_of(&model, id), start);

    // A second escape with no gesture does nothing
    let again = ctl.handle_event(&mut model, &vp, &escape()).expect("escape");
    assert!(!again.changed);
}

#[test]
fn test_each_move_emits_a_newer_snapshot() {
    let mut model = CanvasModel::new();
    model
        .add_element(logo(500, 300), Transform::new(100.0, 100.0, 200.0, 120.0))
        .expect("add");
    let vp = Viewport::new(1000.0, 800.0, 1000.0, 800.0).expect("viewport");
    let mut ctl = InteractionController::default();

    let before = ctl
        .handle_event(&mut model, &vp, &pointer(PointerPhase::Down, Point::new(150.0, 150.0)))
        .expect("down")
        .snapshot;
    let first = ctl
        .handle_event(&mut model, &vp, &pointer(PointerPhase::Move, Point::new(160.0, 150.0)))
        .expect("move")
        .snapshot;
    let second = ctl
        .handle_event(&mut model, &vp, &pointer(PointerPhase::Move, Point::new(170.0, 150.0)))
        .expect("move")
        .snapshot;

    assert!(first.revision > before.revision);
    assert!(second.revision > first.revision);

    model.restore(before.clone());
    assert_eq!(model.state().elements, before.elements);
}

#[test]
fn test_aspect_ratio_change_rejected_outside_advanced_mode() {
    let mut model = CanvasModel::new();
    let before = model.snapshot();
    let result = model.set_aspect_ratio("1:1".parse().expect("label"));
    assert!(matches!(result, Err(CanvasError::PermissionDenied(_))));
    assert_eq!(model.state().aspect_ratio, before.aspect_ratio);
    assert_eq!(model.state().revision, before.revision);
}

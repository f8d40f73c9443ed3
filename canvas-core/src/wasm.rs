//! WebAssembly bindings for canvas-core.
//!
//! The browser host owns rendering; it forwards pointer and key events here
//! and re-renders from the JSON snapshot returned after each call.

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::{
    AspectRatio, CanvasModel, CanvasState, ElementId, ElementKind, InputEvent,
    InteractionController, InteractionPhase, PointerEvent, PointerPhase, SizingPolicy, Transform,
    Viewport,
};

/// Initialize the canvas WASM module.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

#[derive(Serialize)]
struct TransitionJson {
    phase: InteractionPhase,
    changed: bool,
    revision: u64,
}

/// One editing session exposed to JavaScript.
#[wasm_bindgen]
pub struct WasmEditor {
    model: CanvasModel,
    controller: InteractionController,
    viewport: Option<Viewport>,
    sizing: SizingPolicy,
}

#[wasm_bindgen]
impl WasmEditor {
    /// Create an empty editor.
    #[wasm_bindgen(constructor)]
    #[must_use]
    pub fn new() -> Self {
        Self {
            model: CanvasModel::new(),
            controller: InteractionController::default(),
            viewport: None,
            sizing: SizingPolicy::default(),
        }
    }

    /// Use the compositor's sizing settings so logos are drawn at the size
    /// they will be rendered. Existing logos are refitted.
    ///
    /// # Errors
    ///
    /// Returns an error string unless `0 < target_width_fraction <= 1`.
    #[wasm_bindgen(js_name = setSizing)]
    pub fn set_sizing(
        &mut self,
        target_width_fraction: f64,
        allow_upscale: bool,
    ) -> Result<(), String> {
        self.sizing =
            SizingPolicy::new(target_width_fraction, allow_upscale).map_err(|e| e.to_string())?;
        self.model.refit_overlays(&self.sizing);
        Ok(())
    }

    /// Describe the display area. Must be called before pointer events.
    ///
    /// # Errors
    ///
    /// Returns an error string for non-positive geometry.
    #[wasm_bindgen(js_name = setViewport)]
    pub fn set_viewport(
        &mut self,
        display_width: f64,
        display_height: f64,
        zoom: f64,
        device_pixel_ratio: f64,
    ) -> Result<(), String> {
        let (image_width, image_height) = self
            .model
            .state()
            .base_image()
            .and_then(|base| base.kind.natural_size())
            .ok_or_else(|| "set a base image before the viewport".to_string())?;
        let viewport = Viewport::new(
            display_width,
            display_height,
            f64::from(image_width),
            f64::from(image_height),
        )
        .and_then(|vp| vp.with_zoom(zoom))
        .and_then(|vp| vp.with_device_pixel_ratio(device_pixel_ratio))
        .map_err(|e| e.to_string())?
        .with_crop(self.model.state().output_crop());
        self.viewport = Some(viewport);
        Ok(())
    }

    /// Place the base image, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns an error string for zero dimensions.
    #[wasm_bindgen(js_name = setBaseImage)]
    pub fn set_base_image(&mut self, src: String, width: u32, height: u32) -> Result<String, String> {
        if let Some(old) = self.model.state().base_image().map(|e| e.id) {
            self.model.remove_element(old).map_err(|e| e.to_string())?;
        }
        let transform = Transform::new(0.0, 0.0, f64::from(width), f64::from(height));
        let id = self
            .model
            .add_element(
                ElementKind::BaseImage {
                    src,
                    natural_width: width,
                    natural_height: height,
                },
                transform,
            )
            .map_err(|e| e.to_string())?;
        self.model.refit_overlays(&self.sizing);
        Ok(id.to_string())
    }

    /// Add a logo sized the way the compositor will render it.
    ///
    /// # Errors
    ///
    /// Returns an error string if no base image is set or sizes are zero.
    #[wasm_bindgen(js_name = addLogo)]
    pub fn add_logo(
        &mut self,
        src: String,
        natural_width: u32,
        natural_height: u32,
        scale: f64,
    ) -> Result<String, String> {
        let frame = self
            .model
            .state()
            .output_frame()
            .ok_or_else(|| "set a base image first".to_string())?;
        let transform = Transform::fitted(
            frame.extent(),
            (natural_width, natural_height),
            scale,
            &self.sizing,
        )
        .with_position(f64::from(frame.left), f64::from(frame.top));
        let id = self
            .model
            .add_element(
                ElementKind::LogoOverlay {
                    src,
                    natural_width,
                    natural_height,
                },
                transform,
            )
            .map_err(|e| e.to_string())?;
        Ok(id.to_string())
    }

    /// Add a text overlay.
    ///
    /// # Errors
    ///
    /// Returns an error string for a degenerate box.
    #[wasm_bindgen(js_name = addText)]
    #[allow(clippy::too_many_arguments)]
    pub fn add_text(
        &mut self,
        content: String,
        font_size: f64,
        color: String,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Result<String, String> {
        let id = self
            .model
            .add_element(
                ElementKind::TextOverlay {
                    content,
                    font_size,
                    color,
                    rendered: None,
                },
                Transform::new(x, y, width, height),
            )
            .map_err(|e| e.to_string())?;
        Ok(id.to_string())
    }

    /// Remove an element.
    ///
    /// # Errors
    ///
    /// Returns an error string for an unknown or malformed ID.
    #[wasm_bindgen(js_name = removeElement)]
    pub fn remove_element(&mut self, id: &str) -> Result<(), String> {
        let id = parse_id(id)?;
        self.model.remove_element(id).map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Show or hide an element.
    ///
    /// # Errors
    ///
    /// Returns an error string for an unknown or malformed ID.
    #[wasm_bindgen(js_name = setVisibility)]
    pub fn set_visibility(&mut self, id: &str, visible: bool) -> Result<(), String> {
        let id = parse_id(id)?;
        self.model
            .set_visibility(id, visible)
            .map_err(|e| e.to_string())
    }

    /// Toggle advanced mode.
    #[wasm_bindgen(js_name = setAdvancedMode)]
    pub fn set_advanced_mode(&mut self, enabled: bool) {
        self.model.set_advanced_mode(enabled);
        self.reframe();
    }

    /// Change the aspect ratio (`"16:9"`, `"1:1"`, ...).
    ///
    /// # Errors
    ///
    /// Returns an error string for unknown labels or when advanced mode is off.
    #[wasm_bindgen(js_name = setAspectRatio)]
    pub fn set_aspect_ratio(&mut self, label: &str) -> Result<(), String> {
        let ratio: AspectRatio = label.parse().map_err(|e: crate::CanvasError| e.to_string())?;
        self.model
            .set_aspect_ratio(ratio)
            .map_err(|e| e.to_string())?;
        self.reframe();
        Ok(())
    }

    /// Feed a pointer event in CSS pixels. `phase` is `down`, `move`, `up`
    /// or `cancel`. Returns the transition as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error string if no viewport is set or the phase is unknown.
    #[wasm_bindgen(js_name = pointerEvent)]
    pub fn pointer_event(
        &mut self,
        phase: &str,
        x: f64,
        y: f64,
        pointer_id: u32,
        is_primary: bool,
        timestamp_ms: f64,
    ) -> Result<String, String> {
        let phase: PointerPhase =
            serde_json::from_value(serde_json::Value::String(phase.to_string()))
                .map_err(|e| e.to_string())?;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let event = InputEvent::Pointer(PointerEvent {
            phase,
            pointer_id,
            is_primary,
            x,
            y,
            timestamp_ms: timestamp_ms.max(0.0) as u64,
        });
        self.dispatch(&event)
    }

    /// Feed any [`InputEvent`] serialized as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error string for malformed JSON or a missing viewport.
    #[wasm_bindgen(js_name = handleEventJson)]
    pub fn handle_event_json(&mut self, json: &str) -> Result<String, String> {
        let event: InputEvent = serde_json::from_str(json).map_err(|e| e.to_string())?;
        self.dispatch(&event)
    }

    /// Abort the active gesture and roll it back.
    ///
    /// # Errors
    ///
    /// Returns an error string if the rollback cannot be applied.
    #[wasm_bindgen(js_name = cancelGesture)]
    pub fn cancel_gesture(&mut self) -> Result<String, String> {
        let transition = self
            .controller
            .cancel(&mut self.model)
            .map_err(|e| e.to_string())?;
        transition_json(transition.phase, transition.changed, &transition.snapshot)
    }

    /// Whether nothing is visible on the canvas.
    #[wasm_bindgen(js_name = isEmpty)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.model.state().is_empty()
    }

    /// The current snapshot as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error string if serialization fails.
    #[wasm_bindgen(js_name = getStateJson)]
    pub fn get_state_json(&self) -> Result<String, String> {
        self.model.state().to_json().map_err(|e| e.to_string())
    }

    /// Replace the session with a snapshot serialized as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error string for malformed JSON or duplicate IDs.
    #[wasm_bindgen(js_name = loadStateJson)]
    pub fn load_state_json(&mut self, json: &str) -> Result<(), String> {
        let state = CanvasState::from_json(json).map_err(|e| e.to_string())?;
        self.model = CanvasModel::from_state(state);
        self.controller = InteractionController::default();
        self.viewport = None;
        self.model.refit_overlays(&self.sizing);
        Ok(())
    }
}

impl WasmEditor {
    fn dispatch(&mut self, event: &InputEvent) -> Result<String, String> {
        let viewport = self
            .viewport
            .ok_or_else(|| "viewport not set".to_string())?;
        let transition = self
            .controller
            .handle_event(&mut self.model, &viewport, event)
            .map_err(|e| e.to_string())?;
        if transition.phase == InteractionPhase::Idle && transition.changed {
            // A resize may ask for more than the compositor will render
            self.model.refit_overlays(&self.sizing);
        }
        transition_json(transition.phase, transition.changed, self.model.state())
    }

    /// Follow a change of output frame in the viewport and overlay sizes.
    fn reframe(&mut self) {
        let crop = self.model.state().output_crop();
        self.viewport = self.viewport.map(|vp| vp.with_crop(crop));
        self.model.refit_overlays(&self.sizing);
    }
}

impl Default for WasmEditor {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_id(id: &str) -> Result<ElementId, String> {
    id.parse().map_err(|e: uuid::Error| e.to_string())
}

fn transition_json(
    phase: InteractionPhase,
    changed: bool,
    snapshot: &CanvasState,
) -> Result<String, String> {
    serde_json::to_string(&TransitionJson {
        phase,
        changed,
        revision: snapshot.revision,
    })
    .map_err(|e| e.to_string())
}

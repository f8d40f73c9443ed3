//! Input events for canvas interaction.

use serde::{Deserialize, Serialize};

use crate::Point;

/// Phase of a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerPhase {
    /// Button pressed / finger down.
    Down,
    /// Pointer moved.
    Move,
    /// Button released / finger up.
    Up,
    /// The platform cancelled the pointer (e.g., palm rejection).
    Cancel,
}

/// A pointer (mouse, pen or touch) event in display coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    /// Phase of this event.
    pub phase: PointerPhase,
    /// Pointer identifier (for multi-touch).
    pub pointer_id: u32,
    /// Whether this is the primary pointer.
    pub is_primary: bool,
    /// X position in display coordinates.
    pub x: f64,
    /// Y position in display coordinates.
    pub y: f64,
    /// Timestamp in milliseconds since canvas start.
    pub timestamp_ms: u64,
}

impl PointerEvent {
    /// Create a primary-pointer event.
    #[must_use]
    pub fn primary(phase: PointerPhase, x: f64, y: f64, timestamp_ms: u64) -> Self {
        Self {
            phase,
            pointer_id: 0,
            is_primary: true,
            x,
            y,
            timestamp_ms,
        }
    }

    /// Position as a [`Point`].
    #[must_use]
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// All input events the canvas can receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum InputEvent {
    /// Pointer event.
    Pointer(PointerEvent),

    /// Keyboard event.
    Key {
        /// Key name (DOM `KeyboardEvent.key`).
        key: String,
        /// Whether the key is pressed.
        pressed: bool,
        /// Active modifier keys.
        modifiers: KeyModifiers,
    },
}

impl InputEvent {
    /// Whether this is the key press that aborts a gesture.
    #[must_use]
    pub fn is_cancel_key(&self) -> bool {
        matches!(self, Self::Key { key, pressed: true, .. } if key == "Escape")
    }
}

/// Keyboard modifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct KeyModifiers {
    /// Shift key pressed.
    pub shift: bool,
    /// Control key pressed.
    pub ctrl: bool,
    /// Alt/Option key pressed.
    pub alt: bool,
    /// Meta/Command key pressed.
    pub meta: bool,
}

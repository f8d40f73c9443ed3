//! # Overlay Canvas Core
//!
//! Element model and interaction logic for placing overlays on a base image.
//! Pure and I/O-free, so the same code runs in the browser (WASM) and on the
//! server.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               canvas-core                   │
//! ├─────────────────────────────────────────────┤
//! │  CanvasModel       │  InteractionController │
//! │  - Elements        │  - Drag sessions       │
//! │  - Snapshots       │  - Resize sessions     │
//! │  - Aspect gating   │  - Cancel / rollback   │
//! ├─────────────────────────────────────────────┤
//! │  Viewport          │  Scheduling            │
//! │  - Display <-> px  │  - Request tokens      │
//! │  - Crop / zoom     │  - Debounce            │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! All transforms live in base-image pixel space. The [`Viewport`] is the
//! only place display coordinates are converted, which is what keeps the
//! browser preview and the server render in agreement.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod asset;
pub mod element;
pub mod error;
pub mod event;
pub mod interaction;
pub mod scheduling;
pub mod sizing;
pub mod state;
pub mod viewport;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use asset::{normalize_listing, AssetRef};
pub use element::{
    Corner, Element, ElementId, ElementKind, Transform, DEFAULT_TARGET_WIDTH_FRACTION,
};
pub use error::{CanvasError, CanvasResult};
pub use event::{InputEvent, KeyModifiers, PointerEvent, PointerPhase};
pub use interaction::{
    DragSession, InteractionConfig, InteractionController, InteractionPhase, InteractionState,
    ResizeSession, Transition,
};
pub use scheduling::{ComposeSequencer, DebounceConfig, Debouncer, RequestToken};
pub use sizing::{Frame, SizingPolicy};
pub use state::{AspectRatio, CanvasModel, CanvasState, LegacyText};
pub use viewport::{Point, Rect, Viewport};

/// Canvas core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! # Overlay Canvas Compositor
//!
//! Renders the final image: decodes the base and overlay rasters, sizes each
//! overlay with one canonical policy, clamps it inside the base, alpha-blends
//! the layers in z-order and encodes the result.
//!
//! ```text
//! bytes ──decode──> RgbaImage ──place──> Placement ──resize──> overlay
//!                                                                 │
//! base ───decode──> RgbaImage <──────────── blend ────────────────┘
//!                       │
//!                       └──encode──> PNG / JPEG bytes
//! ```
//!
//! Identical inputs always produce byte-identical output.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod compose;
pub mod config;
pub mod error;
pub mod export;
pub mod layout;
pub mod raster;

pub use compose::{ComposePlan, Compositor, OverlayInput, BASE_LABEL};
pub use config::{CompositionConfig, ConfigError, OutputFormat, ResampleFilter};
pub use error::{ComposeError, ComposeResult};
pub use export::{plan_canvas, required_sources};
pub use layout::{clamp_position, place, target_extent, OverlayFit, Placement};
pub use raster::{decode, decode_data_uri, AssetSource, ImageFormat};

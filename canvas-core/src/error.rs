//! Error types for canvas operations.

use thiserror::Error;

/// Result type for canvas operations.
pub type CanvasResult<T> = Result<T, CanvasError>;

/// Errors that can occur in canvas operations.
#[derive(Debug, Error)]
pub enum CanvasError {
    /// Element not found in the canvas.
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// An element with the same ID already exists.
    #[error("Duplicate element: {0}")]
    DuplicateElement(String),

    /// The operation is gated behind a mode that is not enabled.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A transform would violate the positive-extent invariant.
    #[error("Invalid transform: {0}")]
    InvalidTransform(String),

    /// Overlay sizing settings out of range.
    #[error("Invalid sizing: {0}")]
    InvalidSizing(String),

    /// Viewport dimensions or zoom are unusable for mapping.
    #[error("Invalid viewport: {0}")]
    InvalidViewport(String),

    /// Canvas serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

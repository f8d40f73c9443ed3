//! HTTP error responses.
//!
//! Every failure leaves the server as JSON:
//! `{"error": {"kind": "...", "message": "...", "asset": "..."}}`.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use canvas_compositor::ComposeError;
use canvas_core::CanvasError;
use serde::Serialize;
use thiserror::Error;

use crate::assets::CatalogError;
use crate::metrics;
use crate::validation::ValidationError;

/// Anything a handler can fail with.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The body is not the expected JSON.
    #[error("malformed request body: {0}")]
    Body(#[from] JsonRejection),
    /// Untrusted input rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A snapshot violated a model invariant.
    #[error(transparent)]
    Canvas(#[from] CanvasError),
    /// Fetching, decoding or compositing failed.
    #[error(transparent)]
    Compose(#[from] ComposeError),
    /// The asset listing service failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// The error detail.
    pub error: ErrorDetail,
}

/// Error detail.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Stable machine-readable tag.
    pub kind: &'static str,
    /// Human readable message.
    pub message: String,
    /// Which asset or overlay, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Body(_) | Self::Validation(_) | Self::Canvas(_) => StatusCode::BAD_REQUEST,
            Self::Compose(ComposeError::AssetFetchFailed { .. }) => StatusCode::BAD_GATEWAY,
            Self::Compose(ComposeError::InvalidAsset { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Compose(ComposeError::CompositionFailed(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Catalog(CatalogError::NotConfigured) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Catalog(CatalogError::InvalidUrl(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Catalog(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Stable tag for the `kind` field.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Body(_) => "invalid_request",
            Self::Validation(_) => "validation_failed",
            Self::Canvas(_) => "invalid_canvas",
            Self::Compose(err) => err.kind(),
            Self::Catalog(err) => err.kind(),
        }
    }

    /// The body sent to the client.
    #[must_use]
    pub fn body(&self) -> ErrorBody {
        let asset = match self {
            Self::Validation(err) => err.asset(),
            Self::Compose(err) => err.asset(),
            Self::Body(_) | Self::Canvas(_) | Self::Catalog(_) => None,
        };
        ErrorBody {
            error: ErrorDetail {
                kind: self.kind(),
                message: self.to_string(),
                asset: asset.map(str::to_string),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Validation(err) = &self {
            metrics::record_validation_failure(err.kind());
        }
        (self.status(), Json(self.body())).into_response()
    }
}

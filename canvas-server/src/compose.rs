//! Compose endpoints.
//!
//! `POST /api/compose` takes an explicit base image and overlay list;
//! `POST /api/compose/canvas` takes an editor snapshot. Both resolve every
//! source first, then composite on the blocking pool, so a failure in any
//! asset means no image is returned at all.
//!
//! Clients tag requests with `x-compose-token`; the token is echoed on the
//! response so the client can drop results of superseded requests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use canvas_compositor::{
    plan_canvas, required_sources, AssetSource, ComposeError, ComposePlan, Compositor,
    OutputFormat, OverlayFit, OverlayInput, BASE_LABEL,
};
use canvas_core::{CanvasState, ElementKind, RequestToken, Transform};
use serde::Deserialize;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::error::ApiError;
use crate::fetch::AssetFetcher;
use crate::metrics;
use crate::validation::{
    validate_asset_size, validate_element_count, validate_extent, validate_overlay_count,
    validate_placement, validate_source, ValidationError,
};
use crate::AppState;

/// Header carrying the client's compose request token.
pub const COMPOSE_TOKEN_HEADER: &str = "x-compose-token";

/// Body of `POST /api/compose`.
#[derive(Debug, Clone, Deserialize)]
pub struct ComposeRequest {
    /// Base image source: URL, data URI or base64.
    pub base: String,
    /// Overlays, painted by ascending `z_order`.
    #[serde(default)]
    pub overlays: Vec<OverlayRequest>,
    /// Output encoding.
    #[serde(default)]
    pub format: OutputFormat,
}

/// One overlay in a [`ComposeRequest`].
#[derive(Debug, Clone, Deserialize)]
pub struct OverlayRequest {
    /// Overlay source: URL, data URI or base64.
    pub source: String,
    /// Placement in base-image pixels.
    pub transform: OverlayTransform,
    /// Sizing rule.
    #[serde(default)]
    pub fit: OverlayFit,
    /// Paint order; ties keep request order.
    #[serde(default)]
    pub z_order: u64,
    /// Hidden overlays are not fetched or drawn.
    #[serde(default = "default_visible")]
    pub visible: bool,
}

/// Overlay placement as sent on the wire.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OverlayTransform {
    /// Requested left edge; clamped into the base.
    pub x: f64,
    /// Requested top edge; clamped into the base.
    pub y: f64,
    /// Multiplier on the canonical overlay width.
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Box width, used by stretch-fit overlays only.
    pub width: Option<f64>,
    /// Box height, used by stretch-fit overlays only.
    pub height: Option<f64>,
}

/// Body of `POST /api/compose/canvas`.
#[derive(Debug, Clone, Deserialize)]
pub struct CanvasComposeRequest {
    /// Editor snapshot.
    pub canvas: CanvasState,
    /// Output encoding.
    #[serde(default)]
    pub format: OutputFormat,
}

fn default_visible() -> bool {
    true
}

fn default_scale() -> f64 {
    1.0
}

/// Encoded composite.
#[derive(Debug)]
pub struct Rendered {
    bytes: Vec<u8>,
    format: OutputFormat,
}

impl IntoResponse for Rendered {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, self.format.content_type())],
            self.bytes,
        )
            .into_response()
    }
}

impl OverlayRequest {
    /// Validated transform; aspect-locked overlays ignore the box.
    fn transform(&self, label: &str) -> Result<Transform, ValidationError> {
        let t = self.transform;
        validate_placement(label, t.x, t.y, t.scale)?;
        let (width, height) = match self.fit {
            OverlayFit::Stretch => validate_extent(label, t.width, t.height)?,
            OverlayFit::AspectLocked => (t.width.unwrap_or(1.0), t.height.unwrap_or(1.0)),
        };
        Ok(Transform::new(t.x, t.y, width, height).with_scale(t.scale))
    }
}

/// `POST /api/compose`: composite explicit sources.
#[tracing::instrument(name = "compose", skip_all, fields(token = tracing::field::Empty))]
pub async fn compose_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ComposeRequest>, JsonRejection>,
) -> Response {
    let started = Instant::now();
    let token = match compose_token(&headers) {
        Ok(token) => token,
        Err(err) => return ApiError::from(err).into_response(),
    };
    let result = match payload {
        Ok(Json(request)) => compose_request(&state, request).await,
        Err(rejection) => Err(ApiError::from(rejection)),
    };
    finish("compose", started, token, result)
}

/// `POST /api/compose/canvas`: composite an editor snapshot.
#[tracing::instrument(name = "compose_canvas", skip_all, fields(token = tracing::field::Empty))]
pub async fn compose_canvas_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CanvasComposeRequest>, JsonRejection>,
) -> Response {
    let started = Instant::now();
    let token = match compose_token(&headers) {
        Ok(token) => token,
        Err(err) => return ApiError::from(err).into_response(),
    };
    let result = match payload {
        Ok(Json(request)) => compose_canvas(&state, request).await,
        Err(rejection) => Err(ApiError::from(rejection)),
    };
    finish("canvas", started, token, result)
}

async fn compose_request(state: &AppState, request: ComposeRequest) -> Result<Rendered, ApiError> {
    validate_overlay_count(request.overlays.len())?;

    let visible: Vec<(String, &OverlayRequest)> = request
        .overlays
        .iter()
        .enumerate()
        .filter(|(_, o)| o.visible)
        .map(|(i, o)| (format!("overlay[{i}]"), o))
        .collect();

    let mut sources = vec![(BASE_LABEL.to_string(), request.base.clone())];
    let mut transforms = Vec::with_capacity(visible.len());
    for (label, overlay) in &visible {
        transforms.push(overlay.transform(label)?);
        sources.push((label.clone(), overlay.source.clone()));
    }
    for (label, source) in &sources {
        validate_source(label, source)?;
    }
    tracing::debug!(overlays = visible.len(), "resolving compose sources");

    let mut resolved = resolve_all(&state.fetcher, sources).await?.into_iter();
    let base = resolved.next().unwrap_or_default();
    let mut overlays = Vec::with_capacity(visible.len());
    for (((label, overlay), transform), bytes) in visible.into_iter().zip(transforms).zip(resolved) {
        overlays.push(
            OverlayInput::new(label, bytes, transform)
                .with_fit(overlay.fit)
                .with_z_order(overlay.z_order),
        );
    }

    let plan = ComposePlan {
        base,
        overlays,
        crop: None,
    };
    render(&state.compositor, plan, request.format).await
}

async fn compose_canvas(
    state: &AppState,
    request: CanvasComposeRequest,
) -> Result<Rendered, ApiError> {
    let canvas = request.canvas;
    validate_element_count(canvas.element_count())?;
    canvas.check_unique_ids()?;

    for element in canvas.overlays().filter(|e| e.visible) {
        let label = element.id.to_string();
        let t = &element.transform;
        validate_placement(&label, t.x, t.y, t.scale)?;
        if matches!(element.kind, ElementKind::TextOverlay { rendered: Some(_), .. }) {
            validate_extent(&label, Some(t.width), Some(t.height))?;
        }
    }

    let base_source = canvas.base_image().and_then(|e| e.kind.source());
    let sources: Vec<(String, String)> = required_sources(&canvas)
        .into_iter()
        .map(|source| (source_label(&canvas, base_source, source), source.to_string()))
        .collect();
    for (label, source) in &sources {
        validate_source(label, source)?;
    }

    let keys: Vec<String> = sources.iter().map(|(_, source)| source.clone()).collect();
    let bytes = resolve_all(&state.fetcher, sources).await?;
    let assets: HashMap<String, Vec<u8>> = keys.into_iter().zip(bytes).collect();

    let plan = plan_canvas(&canvas, &assets)?;
    render(&state.compositor, plan, request.format).await
}

/// Errors about a shared source name the first element that uses it.
fn source_label(canvas: &CanvasState, base_source: Option<&str>, source: &str) -> String {
    if base_source == Some(source) {
        return BASE_LABEL.to_string();
    }
    canvas
        .overlays()
        .find(|e| e.visible && e.kind.source() == Some(source))
        .map_or_else(|| source.to_string(), |e| e.id.to_string())
}

/// Resolve sources concurrently. Results come back in input order; if
/// several fail, the first in input order is reported.
async fn resolve_all(
    fetcher: &AssetFetcher,
    sources: Vec<(String, String)>,
) -> Result<Vec<Vec<u8>>, ApiError> {
    let count = sources.len();
    let mut tasks = JoinSet::new();
    for (index, (label, source)) in sources.into_iter().enumerate() {
        let fetcher = fetcher.clone();
        tasks.spawn(
            async move { (index, resolve_source(&fetcher, &label, &source).await) }
                .instrument(tracing::Span::current()),
        );
    }

    let mut resolved: Vec<Option<Result<Vec<u8>, ApiError>>> = (0..count).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        let (index, result) = joined.map_err(|e| {
            ComposeError::CompositionFailed(format!("asset resolution task failed: {e}"))
        })?;
        resolved[index] = Some(result);
    }

    resolved
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| {
                Err(ComposeError::CompositionFailed("asset resolution lost".into()).into())
            })
        })
        .collect()
}

async fn resolve_source(
    fetcher: &AssetFetcher,
    label: &str,
    source: &str,
) -> Result<Vec<u8>, ApiError> {
    match AssetSource::parse(label, source)? {
        AssetSource::Inline(bytes) => {
            validate_asset_size(label, bytes.len(), fetcher.config().max_bytes)?;
            Ok(bytes)
        }
        AssetSource::Remote(url) => Ok(fetcher.fetch(label, &url).await?),
    }
}

async fn render(
    compositor: &Arc<Compositor>,
    plan: ComposePlan,
    format: OutputFormat,
) -> Result<Rendered, ApiError> {
    let compositor = Arc::clone(compositor);
    let bytes = tokio::task::spawn_blocking(move || compositor.compose_plan(&plan, format))
        .await
        .map_err(|e| ComposeError::CompositionFailed(format!("compose task failed: {e}")))??;
    Ok(Rendered { bytes, format })
}

fn compose_token(headers: &HeaderMap) -> Result<Option<RequestToken>, ValidationError> {
    let Some(value) = headers.get(COMPOSE_TOKEN_HEADER) else {
        return Ok(None);
    };
    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.parse::<RequestToken>().ok())
        .ok_or(ValidationError::ComposeToken)?;
    tracing::Span::current().record("token", token.get());
    Ok(Some(token))
}

fn finish(
    endpoint: &'static str,
    started: Instant,
    token: Option<RequestToken>,
    result: Result<Rendered, ApiError>,
) -> Response {
    let outcome = match &result {
        Ok(rendered) => {
            tracing::info!(bytes = rendered.bytes.len(), "composite rendered");
            "ok"
        }
        Err(err @ ApiError::Compose(ComposeError::CompositionFailed(_))) => {
            tracing::error!(error = %err, "composition failed");
            err.kind()
        }
        Err(err) => {
            tracing::warn!(error = %err, kind = err.kind(), "compose failed");
            err.kind()
        }
    };
    metrics::record_compose(endpoint, outcome, started.elapsed().as_secs_f64());

    let mut response = result.into_response();
    if let Some(token) = token {
        response
            .headers_mut()
            .insert(COMPOSE_TOKEN_HEADER, HeaderValue::from(token.get()));
    }
    response
}

//! Request handlers for the health and colorize endpoints

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, Instrument};
use uuid::Uuid;

use crate::bridge::RenderConfig;
use crate::config::{MAX_RENDER_FACTOR, MIN_RENDER_FACTOR};
use crate::error::{AppError, Result};
use crate::imaging::{base64, png};
use crate::AppState;

pub const NO_DATA: &str = "No data provided";
pub const NO_IMAGE: &str = "No image data provided. Expected 'image' field with base64 data.";
pub const INVALID_IMAGE: &str = "Invalid image data format. Expected base64 string.";

/// Health response body
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}

/// Successful colorization body
#[derive(Debug, Serialize)]
pub struct ColorizeResponse {
    pub success: bool,
    pub colorized_image: String,
}

/// Validated fields of a colorize request
#[derive(Debug)]
pub struct ColorizeRequest {
    pub image: String,
    pub render_factor: Option<u32>,
}

impl ColorizeRequest {
    /// Validate a raw JSON body
    pub fn parse(body: &[u8]) -> Result<Self> {
        let mut object = match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) if !map.is_empty() => map,
            _ => return Err(AppError::InvalidRequest(NO_DATA.to_string())),
        };

        let image = match object.remove("image") {
            None => return Err(AppError::InvalidRequest(NO_IMAGE.to_string())),
            Some(Value::String(image)) if !image.is_empty() => image,
            Some(_) => return Err(AppError::InvalidRequest(INVALID_IMAGE.to_string())),
        };

        Ok(Self {
            image,
            render_factor: parse_render_factor(&object)?,
        })
    }
}

fn parse_render_factor(object: &Map<String, Value>) -> Result<Option<u32>> {
    let value = match object.get("render_factor") {
        None | Some(Value::Null) => return Ok(None),
        Some(value) => value,
    };

    value
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .filter(|n| (MIN_RENDER_FACTOR..=MAX_RENDER_FACTOR).contains(n))
        .map(Some)
        .ok_or_else(|| {
            AppError::InvalidRequest(format!(
                "Invalid render_factor. Expected an integer between {} and {}.",
                MIN_RENDER_FACTOR, MAX_RENDER_FACTOR
            ))
        })
}

/// Liveness check, independent of the model state
pub async fn health() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            message: "Server is running",
        }),
    )
}

/// Decode, colorize and re-encode one image
pub async fn colorize(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Result<Json<ColorizeResponse>> {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("colorize", request_id = %request_id);

    process(state, body).instrument(span).await.map(Json)
}

async fn process(
    state: Arc<AppState>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Result<ColorizeResponse> {
    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::Decode(state.decoder.too_large(state.settings.server.max_body_bytes))
        } else {
            AppError::InvalidRequest(NO_DATA.to_string())
        }
    })?;

    let request = ColorizeRequest::parse(&body)?;
    let render = RenderConfig::resolve(request.render_factor, &state.settings.model);
    debug!(payload_chars = request.image.len(), render_factor = render.render_factor, "Received colorize request");

    let decoder = state.decoder.clone();
    let bitmap = tokio::task::spawn_blocking(move || decoder.decode(&request.image))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;
    let (width, height) = bitmap.dimensions();

    let handle = state.lifecycle.ensure_ready().await?;
    let colorized = state.bridge.run(bitmap, render, handle).await?;

    let encoded = tokio::task::spawn_blocking(move || png::encode(&colorized))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map_err(AppError::Encoding)?;

    info!(width, height, png_bytes = encoded.len(), "Colorized image");

    Ok(ColorizeResponse {
        success: true,
        colorized_image: base64::encode(&encoded),
    })
}

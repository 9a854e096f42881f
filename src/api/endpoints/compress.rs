//! Image compression endpoint.
//!
//! `POST /api/compress` — plain compression path: resize to fit, raise to
//! the dimension floor, re-encode within the byte budget. Never sharpens.

use axum::extract::State;
use axum::Json;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::pipeline::imaging::{
    decode_payload, resize, validate_image_bytes, CompressionOptions, SizeBounds,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressRequest {
    #[serde(default)]
    pub image: Option<String>,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub quality: Option<f32>,
    #[serde(rename = "maxSizeKB")]
    pub max_size_kb: Option<u32>,
}

impl CompressRequest {
    /// Per-call overrides on top of the service defaults.
    fn options(&self, defaults: CompressionOptions) -> Result<CompressionOptions, ApiError> {
        let options = CompressionOptions {
            max_width: self.max_width.unwrap_or(defaults.max_width),
            max_height: self.max_height.unwrap_or(defaults.max_height),
            quality: self.quality.unwrap_or(defaults.quality),
            max_size_kb: self.max_size_kb.unwrap_or(defaults.max_size_kb),
        };

        if options.max_width == 0 || options.max_height == 0 {
            return Err(ApiError::BadRequest("maxWidth and maxHeight must be positive".into()));
        }
        if !(options.quality > 0.0 && options.quality <= 1.0) {
            return Err(ApiError::BadRequest("quality must be in (0, 1]".into()));
        }
        if options.max_size_kb == 0 {
            return Err(ApiError::BadRequest("maxSizeKB must be positive".into()));
        }
        Ok(options)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressResponse {
    /// Base64 JPEG.
    pub image: String,
    pub width: u32,
    pub height: u32,
    pub quality: f32,
    pub size_bytes: usize,
    pub iterations: u32,
}

/// `POST /api/compress`
pub async fn compress(
    State(ctx): State<ApiContext>,
    Json(payload): Json<CompressRequest>,
) -> Result<Json<CompressResponse>, ApiError> {
    let options = payload.options(ctx.compression)?;
    let encoded = payload
        .image
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or(ApiError::ImageMissing)?;
    let bytes = decode_payload(encoded)?;
    validate_image_bytes(&bytes, SizeBounds::detect())?;

    let compressed = tokio::task::spawn_blocking(move || resize(&bytes, &options)).await??;

    Ok(Json(CompressResponse {
        image: base64::engine::general_purpose::STANDARD.encode(&compressed.image.bytes),
        width: compressed.image.width,
        height: compressed.image.height,
        quality: compressed.quality,
        size_bytes: compressed.image.len(),
        iterations: compressed.iterations,
    }))
}

//! Plant disease detection endpoint — photo in, diagnosis out.
//!
//! `POST /api/detect` — decodes the photo, prepares it for the classifier,
//! rejects it early when the quality gate fails, then runs the orchestrator.
//! A degraded (fallback) diagnosis is still a 200.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{caller_key, ApiContext};
use crate::pipeline::detection::{DetectionRequest, DetectionResult, Language};
use crate::pipeline::imaging::{
    decode_payload, validate_image_bytes, ImageError, PreprocessingPipeline, QualityAssessor,
    QualityReport, SizeBounds,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectRequest {
    /// Base64 JPEG/PNG, optionally as a data URI.
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    /// Sharpen after resizing. Defaults to on.
    #[serde(default = "default_preprocess")]
    pub preprocess: bool,
}

fn default_preprocess() -> bool {
    true
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectResponse {
    pub request_id: Uuid,
    pub result: DetectionResult,
    /// True when `result` is a synthesized fallback.
    pub degraded: bool,
    pub quality: QualityReport,
}

/// `POST /api/detect`
pub async fn detect(
    State(ctx): State<ApiContext>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(payload): Json<DetectRequest>,
) -> Result<Json<DetectResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    let caller = caller_key(
        &headers,
        connect.map(|ConnectInfo(addr)| addr),
        ctx.trust_forwarded,
    );
    let span = info_span!("detect", %request_id, caller = %caller);

    run(ctx, payload, caller, request_id).instrument(span).await
}

async fn run(
    ctx: ApiContext,
    payload: DetectRequest,
    caller: String,
    request_id: Uuid,
) -> Result<Json<DetectResponse>, ApiError> {
    let encoded = payload
        .image
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or(ApiError::ImageMissing)?;
    let bytes = decode_payload(encoded)?;
    validate_image_bytes(&bytes, SizeBounds::detect())?;

    let pipeline = if payload.preprocess {
        PreprocessingPipeline::for_detection(ctx.compression)
    } else {
        PreprocessingPipeline::compression_only(ctx.compression)
    };
    let assessor = ctx.quality.clone();
    let upload_len = bytes.len();

    let (prepared, quality) = tokio::task::spawn_blocking(move || {
        let prepared = pipeline.run_bytes(&bytes)?;
        let quality = assessor.assess(&prepared.image);
        Ok::<_, ImageError>((prepared, quality))
    })
    .await??;

    info!(
        upload_bytes = upload_len,
        prepared_bytes = prepared.jpeg_bytes().len(),
        score = quality.score,
        "Image prepared"
    );

    if !quality.is_valid {
        info!(issues = ?quality.issues, "Rejected by quality gate");
        return Err(ApiError::PoorImageQuality(Box::new(quality)));
    }

    let request = DetectionRequest {
        image_bytes: prepared.image.encoded.bytes,
        language: Language::from_hint(payload.language.as_deref()),
        caller_key: caller,
    };

    let outcome = ctx.orchestrator.detect(&request).await?;
    let degraded = outcome.is_degraded();

    Ok(Json(DetectResponse {
        request_id,
        result: outcome.into_result(),
        degraded,
        quality,
    }))
}

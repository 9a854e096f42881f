//! Photo quality analysis endpoint.
//!
//! `POST /api/analyze` — runs the quality gate only, so the client can ask
//! the user to retake a photo before spending a classification call.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tracing::debug;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::pipeline::imaging::{
    decode_payload, validate_image_bytes, QualityAssessor, QualityReport, SizeBounds,
};

#[derive(Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub image: Option<String>,
}

/// `POST /api/analyze` — always 200 with a report once the payload passes
/// the size bounds. Undecodable pixels give an invalid report, not an error.
pub async fn analyze(
    State(ctx): State<ApiContext>,
    Json(payload): Json<AnalyzeRequest>,
) -> Result<Json<QualityReport>, ApiError> {
    let encoded = payload
        .image
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or(ApiError::ImageMissing)?;
    let bytes = decode_payload(encoded)?;
    validate_image_bytes(&bytes, SizeBounds::analyze())?;

    let assessor = ctx.quality.clone();
    let report = tokio::task::spawn_blocking(move || assessor.assess_bytes(&bytes)).await?;

    debug!(score = report.score, valid = report.is_valid, "Quality analysed");
    Ok(Json(report))
}

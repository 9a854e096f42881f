//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::pipeline::detection::DetectionError;
use crate::pipeline::imaging::{ImageError, QualityReport};

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
    /// Present on `POOR_IMAGE_QUALITY` so the client can show what to fix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityReport>,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("No image provided")]
    ImageMissing,
    #[error("Image too small: {0}")]
    ImageTooSmall(String),
    #[error("Image too large: {0}")]
    ImageTooLarge(String),
    #[error("Invalid image payload: {0}")]
    ImageInvalid(String),
    #[error("Image could not be decoded: {0}")]
    ImageUndecodable(String),
    #[error("Image quality too poor for analysis")]
    PoorImageQuality(Box<QualityReport>),
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: u64 },
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::ImageMissing => (
                StatusCode::BAD_REQUEST,
                "IMAGE_MISSING",
                "No image was provided".to_string(),
            ),
            ApiError::ImageTooSmall(detail) => (
                StatusCode::BAD_REQUEST,
                "IMAGE_TOO_SMALL",
                detail.clone(),
            ),
            ApiError::ImageTooLarge(detail) => (
                StatusCode::BAD_REQUEST,
                "IMAGE_TOO_LARGE",
                detail.clone(),
            ),
            ApiError::ImageInvalid(detail) => (
                StatusCode::BAD_REQUEST,
                "IMAGE_INVALID",
                detail.clone(),
            ),
            ApiError::ImageUndecodable(detail) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "IMAGE_UNDECODABLE",
                detail.clone(),
            ),
            ApiError::PoorImageQuality(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "POOR_IMAGE_QUALITY",
                "Image quality is too poor for a reliable diagnosis. Please retake the photo."
                    .to_string(),
            ),
            ApiError::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                format!("Rate limit exceeded. Retry after {retry_after}s"),
            ),
            ApiError::ServiceUnavailable(detail) => {
                tracing::error!(detail, "Classification service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "The diagnosis service is temporarily unavailable".to_string(),
                )
            }
            ApiError::BadRequest(detail) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                detail.clone(),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let retry_after = match &self {
            ApiError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        };
        let quality = match self {
            ApiError::PoorImageQuality(report) => Some(*report),
            _ => None,
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
            quality,
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(retry_after) = retry_after {
            if let Ok(val) = axum::http::HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("Retry-After", val);
            }
        }
        response
    }
}

impl From<ImageError> for ApiError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::Missing => ApiError::ImageMissing,
            ImageError::TooSmall { .. } => ApiError::ImageTooSmall(err.to_string()),
            ImageError::TooLarge { .. } => ApiError::ImageTooLarge(err.to_string()),
            ImageError::InvalidEncoding(_) | ImageError::UnsupportedDimensions { .. } => {
                ApiError::ImageInvalid(err.to_string())
            }
            ImageError::Decode(_) => ApiError::ImageUndecodable(err.to_string()),
            ImageError::Encode(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<DetectionError> for ApiError {
    fn from(err: DetectionError) -> Self {
        match err {
            DetectionError::RateLimited { retry_after_secs } => ApiError::RateLimited {
                retry_after: retry_after_secs,
            },
            DetectionError::ServiceUnavailable(detail) => ApiError::ServiceUnavailable(detail),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("image task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn json_of(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn rate_limited_returns_429_with_retry_after() {
        let response = ApiError::RateLimited { retry_after: 60 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("Retry-After").unwrap(), "60");
        let json = json_of(response).await;
        assert_eq!(json["error"]["code"], "RATE_LIMITED");
    }

    #[tokio::test]
    async fn image_input_errors_return_400() {
        let cases = [
            (ImageError::Missing, "IMAGE_MISSING"),
            (ImageError::TooSmall { size: 10, min: 5120 }, "IMAGE_TOO_SMALL"),
            (ImageError::TooLarge { size: 9, max: 1 }, "IMAGE_TOO_LARGE"),
            (ImageError::InvalidEncoding("bad base64".into()), "IMAGE_INVALID"),
            (ImageError::UnsupportedDimensions { width: 1, height: 8000 }, "IMAGE_INVALID"),
        ];
        for (err, code) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(json_of(response).await["error"]["code"], code);
        }
    }

    #[tokio::test]
    async fn undecodable_image_returns_422() {
        let response = ApiError::from(ImageError::Decode("truncated".into())).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_of(response).await["error"]["code"], "IMAGE_UNDECODABLE");
    }

    #[tokio::test]
    async fn poor_quality_carries_report() {
        let report = QualityReport::decode_failure();
        let response = ApiError::PoorImageQuality(Box::new(report)).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let json = json_of(response).await;
        assert_eq!(json["error"]["code"], "POOR_IMAGE_QUALITY");
        assert_eq!(json["quality"]["isValid"], false);
        assert_eq!(json["quality"]["score"], 0);
    }

    #[tokio::test]
    async fn detection_errors_map_to_status() {
        let response = ApiError::from(DetectionError::RateLimited { retry_after_secs: 12 })
            .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("Retry-After").unwrap(), "12");

        let response =
            ApiError::from(DetectionError::ServiceUnavailable("quota".into())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = json_of(response).await;
        assert_eq!(json["error"]["code"], "SERVICE_UNAVAILABLE");
        assert!(json.get("quality").is_none());
    }

    #[tokio::test]
    async fn internal_hides_details() {
        let response = ApiError::Internal("something broke".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_of(response).await;
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }
}

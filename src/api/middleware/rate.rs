//! Per-caller rate limiting middleware for the analysis surfaces.

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{caller_key, ApiContext};
use crate::pipeline::detection::Admission;

/// Rate-limit key for a raw request.
fn rate_key(req: &Request<axum::body::Body>, trust_forwarded: bool) -> String {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    caller_key(req.headers(), peer, trust_forwarded)
}

/// Returns 429 once the caller exceeds the analysis limit.
/// Accesses `ApiContext` from request extensions.
pub async fn limit(req: Request<axum::body::Body>, next: Next) -> Response {
    match limit_inner(req, next).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn limit_inner(req: Request<axum::body::Body>, next: Next) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let key = rate_key(&req, ctx.trust_forwarded);

    // The limiter's lock is taken and released inside `admit`.
    if let Admission::Rejected { retry_after_secs } = ctx.analyze_limiter.admit(&key) {
        return Err(ApiError::RateLimited {
            retry_after: retry_after_secs,
        });
    }

    Ok(next.run(req).await)
}

//! HTTP router for the diagnosis API.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.
//!
//! Detection is rate limited inside the orchestrator, so only the analysis
//! surfaces carry the limiter middleware.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::config::MAX_BODY_BYTES;

/// Build the diagnosis API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(ctx: ApiContext) -> Router {
    let open = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/detect", post(endpoints::detect::detect))
        .with_state(ctx.clone());

    // Extension must be outermost so the limiter can extract ApiContext.
    let limited = Router::new()
        .route("/analyze", post(endpoints::analyze::analyze))
        .route("/compress", post(endpoints::compress::compress))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx));

    Router::new()
        .nest("/api", open)
        .nest("/api", limited)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
}

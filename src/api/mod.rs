//! Diagnosis HTTP API.
//!
//! Exposes the imaging and detection pipelines as JSON endpoints. Routes
//! are nested under `/api/`; the router is composable and can be mounted
//! on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::api_router;
pub use server::{serve, ServerError};
pub use types::ApiContext;

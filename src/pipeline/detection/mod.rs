//! Resilient classification pipeline for plant photos.
//!
//! rate check → classifier call (timeout + bounded retries) → validate /
//! normalize → `ClassificationOutcome`. Every path past admission yields a
//! structurally valid `DetectionResult`; only admission rejection and fatal
//! upstream conditions surface as errors.

pub mod classifier;
pub mod fallback;
pub mod gemini;
pub mod orchestrator;
pub mod prompt;
pub mod rate_limit;
pub mod types;
pub mod validation;

pub use classifier::{Classifier, ClassifierError, MockClassifier, MockReply};
pub use fallback::fallback_result;
pub use gemini::GeminiClassifier;
pub use orchestrator::{DetectionOrchestrator, OrchestratorConfig};
pub use rate_limit::{Admission, FixedWindowLimiter, RateLimit, Unlimited};
pub use types::*;
pub use validation::{validate, validate_outcome};

use thiserror::Error;

/// Failures the caller sees instead of a `DetectionResult`.
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Classification service unavailable: {0}")]
    ServiceUnavailable(String),
}

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{sleep, timeout, Instant};
use tracing::{error, info, warn};

use super::classifier::{Classifier, ClassifierError};
use super::fallback::fallback_result;
use super::prompt::build_instructions;
use super::rate_limit::{Admission, RateLimit};
use super::types::{ClassificationOutcome, DetectionRequest};
use super::validation::validate_outcome;
use super::DetectionError;
use crate::config::{
    ServiceConfig, DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY,
};

/// Retry and timeout discipline for classifier calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Total attempts, initial call included.
    pub max_attempts: u32,
    /// Backoff before attempt `n + 1` is `base_delay × n`.
    pub base_delay: Duration,
    /// Hard deadline per attempt. The in-flight call is dropped when it passes.
    pub attempt_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_RETRY_BASE_DELAY,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_service(config: &ServiceConfig) -> Self {
        Self {
            base_delay: config.retry_base_delay,
            attempt_timeout: config.attempt_timeout,
            ..Self::default()
        }
    }
}

/// Drives one detection request:
/// rate check → classify (timeout, bounded retries) → validate.
///
/// Retryable failures (transport, timeout, throttling, upstream 5xx) loop
/// back after a linear backoff. Quota exhaustion fails fast. Running out of
/// attempts, or any other failure, yields a degraded Fallback Result.
pub struct DetectionOrchestrator {
    classifier: Arc<dyn Classifier>,
    limiter: Arc<dyn RateLimit>,
    config: OrchestratorConfig,
}

impl DetectionOrchestrator {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        limiter: Arc<dyn RateLimit>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            classifier,
            limiter,
            config,
        }
    }

    pub async fn detect(
        &self,
        request: &DetectionRequest,
    ) -> Result<ClassificationOutcome, DetectionError> {
        // Admission is decided once, before any call, and never revisited.
        if let Admission::Rejected { retry_after_secs } = self.limiter.admit(&request.caller_key) {
            return Err(DetectionError::RateLimited { retry_after_secs });
        }

        let instructions = build_instructions(request.language);
        let max_attempts = self.config.max_attempts.max(1);
        let started = Instant::now();

        for attempt in 1..=max_attempts {
            let error = match self.attempt(request, &instructions).await {
                Ok(text) => {
                    let outcome = validate_outcome(&text, Utc::now());
                    info!(
                        attempt,
                        degraded = outcome.is_degraded(),
                        confidence = outcome.result().confidence,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Classification complete"
                    );
                    return Ok(outcome);
                }
                Err(e) => e,
            };

            if error.is_fatal() {
                error!(attempt, error = %error, "Classifier unavailable, not retrying");
                return Err(DetectionError::ServiceUnavailable(error.to_string()));
            }

            if !error.is_retryable() {
                warn!(attempt, error = %error, "Classifier failed with non-retryable error");
                break;
            }

            if attempt < max_attempts {
                let delay = self.config.base_delay * attempt;
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Classifier call failed, retrying"
                );
                sleep(delay).await;
            } else {
                warn!(attempt, error = %error, "Classifier attempts exhausted");
            }
        }

        warn!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Returning fallback result"
        );
        Ok(ClassificationOutcome::Degraded(fallback_result(Utc::now())))
    }

    async fn attempt(
        &self,
        request: &DetectionRequest,
        instructions: &str,
    ) -> Result<String, ClassifierError> {
        let call = self.classifier.classify(&request.image_bytes, instructions);
        match timeout(self.config.attempt_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ClassifierError::Timeout(self.config.attempt_timeout.as_secs())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::detection::classifier::{MockClassifier, MockReply};
    use crate::pipeline::detection::rate_limit::{FixedWindowLimiter, Unlimited};
    use crate::pipeline::detection::types::Language;

    const VALID: &str = r#"{"crop":"Rice","disease":{"en":"Leaf blast"},"category":"fungal","severity":"High","confidence":88,"description":{"en":"Diamond-shaped lesions."},"solutions":{"en":["Apply tricyclazole"]},"prevention":{"en":["Avoid excess nitrogen"]},"ttsScript":{"en":"Your rice has leaf blast."},"actionUrgency":"within_3_days","expertConsultationRecommended":false}"#;

    fn request() -> DetectionRequest {
        DetectionRequest {
            image_bytes: vec![0xFF, 0xD8, 0xFF],
            language: Language::En,
            caller_key: "203.0.113.7".into(),
        }
    }

    fn orchestrator(classifier: Arc<MockClassifier>) -> DetectionOrchestrator {
        DetectionOrchestrator::new(classifier, Arc::new(Unlimited), OrchestratorConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn always_timing_out_upstream_gets_three_attempts_then_fallback() {
        let classifier = Arc::new(MockClassifier::hanging());
        let orch = orchestrator(classifier.clone());
        let started = Instant::now();

        let outcome = orch.detect(&request()).await.unwrap();

        assert_eq!(classifier.calls(), 3);
        assert!(outcome.is_degraded());
        assert_eq!(outcome.result().confidence, 0);
        assert!(outcome.result().satisfies_invariants());
        // 3 × 45 s timeouts + 1 s + 2 s backoff
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(138) && elapsed < Duration::from_secs(139));
    }

    #[tokio::test(start_paused = true)]
    async fn throttling_is_retried_until_success() {
        let classifier = Arc::new(MockClassifier::new(vec![
            MockReply::Fail(ClassifierError::Throttled),
            MockReply::Fail(ClassifierError::Transport("connection reset".into())),
            MockReply::Text(VALID.into()),
        ]));
        let orch = orchestrator(classifier.clone());
        let started = Instant::now();

        let outcome = orch.detect(&request()).await.unwrap();

        assert_eq!(classifier.calls(), 3);
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.result().crop, "Rice");
        assert_eq!(outcome.result().confidence, 88);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn quota_exhaustion_fails_fast() {
        let classifier = Arc::new(MockClassifier::failing(ClassifierError::QuotaExhausted(
            "billing disabled".into(),
        )));
        let orch = orchestrator(classifier.clone());

        let err = orch.detect(&request()).await.unwrap_err();

        assert!(matches!(err, DetectionError::ServiceUnavailable(_)));
        assert_eq!(classifier.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_degrade_without_retry() {
        let classifier = Arc::new(MockClassifier::failing(ClassifierError::Upstream {
            status: 400,
            body: "invalid image".into(),
        }));
        let orch = orchestrator(classifier.clone());

        let outcome = orch.detect(&request()).await.unwrap();

        assert_eq!(classifier.calls(), 1);
        assert!(outcome.is_degraded());
    }

    #[tokio::test(start_paused = true)]
    async fn server_errors_are_retried() {
        let classifier = Arc::new(MockClassifier::failing(ClassifierError::Upstream {
            status: 502,
            body: "bad gateway".into(),
        }));
        let orch = orchestrator(classifier.clone());

        let outcome = orch.detect(&request()).await.unwrap();

        assert_eq!(classifier.calls(), 3);
        assert!(outcome.is_degraded());
    }

    #[tokio::test]
    async fn malformed_output_is_not_retried() {
        let classifier = Arc::new(MockClassifier::answering("I think it is blight."));
        let orch = orchestrator(classifier.clone());

        let outcome = orch.detect(&request()).await.unwrap();

        assert_eq!(classifier.calls(), 1);
        assert!(outcome.is_degraded());
        assert_eq!(outcome.result().category, "unknown");
    }

    #[tokio::test]
    async fn rate_limited_request_never_reaches_classifier() {
        let classifier = Arc::new(MockClassifier::answering(VALID));
        let limiter = Arc::new(FixedWindowLimiter::new(1, Duration::from_secs(60)));
        let orch = DetectionOrchestrator::new(
            classifier.clone(),
            limiter,
            OrchestratorConfig::default(),
        );

        assert!(orch.detect(&request()).await.is_ok());
        let err = orch.detect(&request()).await.unwrap_err();

        assert!(matches!(err, DetectionError::RateLimited { retry_after_secs } if retry_after_secs > 0));
        assert_eq!(classifier.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_do_not_consume_extra_admissions() {
        let classifier = Arc::new(MockClassifier::new(vec![
            MockReply::Fail(ClassifierError::Throttled),
            MockReply::Text(VALID.into()),
        ]));
        let limiter = Arc::new(FixedWindowLimiter::new(2, Duration::from_secs(600)));
        let orch = DetectionOrchestrator::new(
            classifier.clone(),
            limiter,
            OrchestratorConfig::default(),
        );

        assert!(orch.detect(&request()).await.is_ok());
        assert!(orch.detect(&request()).await.is_ok());
        assert_eq!(classifier.calls(), 3);
    }

    #[test]
    fn config_follows_service_settings() {
        let service = ServiceConfig {
            attempt_timeout: Duration::from_secs(10),
            retry_base_delay: Duration::from_millis(250),
            ..ServiceConfig::default()
        };
        let config = OrchestratorConfig::from_service(&service);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.attempt_timeout, Duration::from_secs(10));
        assert_eq!(config.base_delay, Duration::from_millis(250));
    }
}

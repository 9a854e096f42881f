//! Shared types for the HTTP layer.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderMap;

use crate::config::{ServiceConfig, RATE_WINDOW};
use crate::pipeline::detection::{
    Classifier, DetectionOrchestrator, FixedWindowLimiter, OrchestratorConfig, RateLimit,
};
use crate::pipeline::imaging::{CompressionOptions, QualityAssessor, QualityGate};

/// Key used when no caller address can be determined.
pub const ANONYMOUS_CALLER: &str = "anonymous";

// ═══════════════════════════════════════════════════════════
// API context — shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub orchestrator: Arc<DetectionOrchestrator>,
    /// Looser limit for the analysis and compression surfaces.
    pub analyze_limiter: Arc<dyn RateLimit>,
    pub compression: CompressionOptions,
    pub quality: Arc<dyn QualityAssessor>,
    /// Whether `X-Forwarded-For` identifies the caller.
    pub trust_forwarded: bool,
}

impl ApiContext {
    pub fn new(
        orchestrator: Arc<DetectionOrchestrator>,
        analyze_limiter: Arc<dyn RateLimit>,
    ) -> Self {
        Self {
            orchestrator,
            analyze_limiter,
            compression: CompressionOptions::default(),
            quality: Arc::new(QualityGate::default()),
            trust_forwarded: false,
        }
    }

    pub fn with_quality_assessor(mut self, quality: Arc<dyn QualityAssessor>) -> Self {
        self.quality = quality;
        self
    }

    pub fn trusting_forwarded(mut self, trust: bool) -> Self {
        self.trust_forwarded = trust;
        self
    }

    /// Wire a classifier into the production limiters and retry settings.
    pub fn from_config(config: &ServiceConfig, classifier: Arc<dyn Classifier>) -> Self {
        let detect_limiter = Arc::new(FixedWindowLimiter::new(config.detect_limit, RATE_WINDOW));
        let analyze_limiter = Arc::new(FixedWindowLimiter::new(config.analyze_limit, RATE_WINDOW));
        let orchestrator = DetectionOrchestrator::new(
            classifier,
            detect_limiter,
            OrchestratorConfig::from_service(config),
        );
        Self::new(Arc::new(orchestrator), analyze_limiter)
            .trusting_forwarded(config.trust_forwarded)
    }
}

// ═══════════════════════════════════════════════════════════
// Caller identity
// ═══════════════════════════════════════════════════════════

/// Rate-limit key: the peer address, else `"anonymous"`. When
/// `trust_forwarded` is set the first `X-Forwarded-For` entry wins.
pub fn caller_key(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded: bool,
) -> String {
    let forwarded = if trust_forwarded {
        first_forwarded_hop(headers)
    } else {
        None
    };
    forwarded
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| ANONYMOUS_CALLER.to_string())
}

fn first_forwarded_hop(headers: &HeaderMap) -> Option<String> {
    headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-Forwarded-For",
            HeaderValue::from_static("198.51.100.4, 10.0.0.1"),
        );
        let peer = Some(SocketAddr::from(([127, 0, 0, 1], 5000)));
        assert_eq!(caller_key(&headers, peer, true), "198.51.100.4");
    }

    #[test]
    fn forwarded_for_ignored_unless_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Forwarded-For", HeaderValue::from_static("203.0.113.77"));
        let peer = Some(SocketAddr::from(([192, 0, 2, 10], 44321)));
        assert_eq!(caller_key(&headers, peer, false), "192.0.2.10");
        assert_eq!(caller_key(&headers, None, false), ANONYMOUS_CALLER);
    }

    #[test]
    fn peer_address_without_port() {
        let peer = Some(SocketAddr::from(([192, 0, 2, 10], 44321)));
        assert_eq!(caller_key(&HeaderMap::new(), peer, true), "192.0.2.10");
    }

    #[test]
    fn anonymous_when_nothing_known() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Forwarded-For", HeaderValue::from_static("  "));
        assert_eq!(caller_key(&headers, None, true), ANONYMOUS_CALLER);
    }
}

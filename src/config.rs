use std::net::SocketAddr;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "cropdoc";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "cropdoc=info,tower_http=info"
}

// ═══════════════════════════════════════════════════════════
// Request boundary
// ═══════════════════════════════════════════════════════════

/// Encoded uploads above this are rejected before decoding.
pub const MAX_UPLOAD_BYTES: usize = 6 * 1024 * 1024;

/// Detection surface floor. Anything smaller is not a real photograph.
pub const MIN_DETECT_BYTES: usize = 5 * 1024;

/// Analysis surface floor (stricter: the report is only useful on real captures).
pub const MIN_ANALYZE_BYTES: usize = 10 * 1024;

/// JSON body limit. Base64 inflates 6 MB to ~8 MB, plus envelope.
pub const MAX_BODY_BYTES: usize = 9 * 1024 * 1024;

// ═══════════════════════════════════════════════════════════
// Rate limiting
// ═══════════════════════════════════════════════════════════

pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Classification calls per caller per window.
pub const DEFAULT_DETECT_LIMIT: u32 = 12;

/// Analysis/compression calls per caller per window.
pub const DEFAULT_ANALYZE_LIMIT: u32 = 20;

// ═══════════════════════════════════════════════════════════
// Classifier
// ═══════════════════════════════════════════════════════════

pub const DEFAULT_CLASSIFIER_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_CLASSIFIER_MODEL: &str = "gemini-1.5-flash";

/// Low sampling temperature biases the classifier toward well-formed output.
pub const CLASSIFIER_TEMPERATURE: f32 = 0.2;

pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(45);
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(1000);

/// 1 initial call + 2 retries.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

// ═══════════════════════════════════════════════════════════
// Runtime configuration
// ═══════════════════════════════════════════════════════════

/// Service configuration, read once at startup from `CROPDOC_*` variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub classifier_url: String,
    pub classifier_model: String,
    pub api_key: Option<String>,
    pub detect_limit: u32,
    pub analyze_limit: u32,
    pub attempt_timeout: Duration,
    pub retry_base_delay: Duration,
    /// Key callers on `X-Forwarded-For`. Only safe behind a proxy that sets it.
    pub trust_forwarded: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            classifier_url: DEFAULT_CLASSIFIER_URL.to_string(),
            classifier_model: DEFAULT_CLASSIFIER_MODEL.to_string(),
            api_key: None,
            detect_limit: DEFAULT_DETECT_LIMIT,
            analyze_limit: DEFAULT_ANALYZE_LIMIT,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            trust_forwarded: false,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unparseable values keep the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            bind_addr: parse_or("CROPDOC_BIND", &lookup, defaults.bind_addr),
            classifier_url: lookup("CROPDOC_CLASSIFIER_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.classifier_url),
            classifier_model: lookup("CROPDOC_CLASSIFIER_MODEL")
                .unwrap_or(defaults.classifier_model),
            api_key: lookup("CROPDOC_API_KEY").filter(|key| !key.trim().is_empty()),
            detect_limit: parse_or("CROPDOC_DETECT_LIMIT", &lookup, defaults.detect_limit),
            analyze_limit: parse_or("CROPDOC_ANALYZE_LIMIT", &lookup, defaults.analyze_limit),
            attempt_timeout: Duration::from_secs(parse_or(
                "CROPDOC_ATTEMPT_TIMEOUT_SECS",
                &lookup,
                defaults.attempt_timeout.as_secs(),
            )),
            retry_base_delay: Duration::from_millis(parse_or(
                "CROPDOC_RETRY_BASE_DELAY_MS",
                &lookup,
                defaults.retry_base_delay.as_millis() as u64,
            )),
            trust_forwarded: parse_or(
                "CROPDOC_TRUST_FORWARDED",
                &lookup,
                defaults.trust_forwarded,
            ),
        }
    }
}

fn parse_or<T, F>(key: &str, lookup: &F, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, "Invalid config value, using default");
                default
            }
        },
    }
}

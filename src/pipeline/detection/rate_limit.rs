//! Per-caller admission control.
//!
//! `FixedWindowLimiter` keeps one counter-plus-expiry record per caller key.
//! It is a fixed window, not a sliding log: a caller can get up to twice the
//! limit through across a window boundary.
//!
//! State lives in this process only. Several replicas behind a load balancer
//! each keep their own counts; a shared deployment needs a `RateLimit`
//! implementation backed by an external synchronized store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::warn;

/// Records are swept once the map grows past this.
const PRUNE_THRESHOLD: usize = 1000;

/// Admission decision for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// Seconds until the caller's window resets.
    Rejected { retry_after_secs: u64 },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }
}

/// Admission interface. Decisions are final; nothing is held after return.
pub trait RateLimit: Send + Sync {
    fn admit(&self, caller_key: &str) -> Admission;
}

#[derive(Debug, Clone, Copy)]
struct RateLimitRecord {
    count: u32,
    window_reset_at: Instant,
}

/// In-memory fixed-window counter.
pub struct FixedWindowLimiter {
    records: Mutex<HashMap<String, RateLimitRecord>>,
    limit: u32,
    window: Duration,
}

impl FixedWindowLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            limit,
            window,
        }
    }

    /// Admission decision at an explicit instant.
    pub fn admit_at(&self, caller_key: &str, now: Instant) -> Admission {
        // A panic elsewhere while holding the lock leaves the counts usable.
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if records.len() > PRUNE_THRESHOLD {
            records.retain(|_, r| now < r.window_reset_at);
        }

        if let Some(record) = records.get_mut(caller_key) {
            if now < record.window_reset_at {
                if record.count < self.limit {
                    record.count += 1;
                    return Admission::Admitted;
                }
                let remaining = record.window_reset_at.saturating_duration_since(now);
                let retry_after_secs =
                    remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
                warn!(caller = caller_key, retry_after_secs, "Rate limit exceeded");
                return Admission::Rejected { retry_after_secs };
            }
        }

        // No record, or the old window has expired: start a fresh one.
        if self.limit == 0 {
            return Admission::Rejected {
                retry_after_secs: self.window.as_secs(),
            };
        }
        records.insert(
            caller_key.to_string(),
            RateLimitRecord {
                count: 1,
                window_reset_at: now + self.window,
            },
        );
        Admission::Admitted
    }

    #[cfg(test)]
    fn count_for(&self, caller_key: &str) -> Option<u32> {
        self.records
            .lock()
            .ok()
            .and_then(|r| r.get(caller_key).map(|rec| rec.count))
    }
}

impl RateLimit for FixedWindowLimiter {
    fn admit(&self, caller_key: &str) -> Admission {
        self.admit_at(caller_key, Instant::now())
    }
}

/// Admits everything. For deployments that rate limit upstream of this
/// service, and for tests.
pub struct Unlimited;

impl RateLimit for Unlimited {
    fn admit(&self, _caller_key: &str) -> Admission {
        Admission::Admitted
    }
}

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use futures_util::future::BoxFuture;
use thiserror::Error;

/// Failures of one classifier call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("Classifier transport error: {0}")]
    Transport(String),

    #[error("Classifier call timed out after {0}s")]
    Timeout(u64),

    #[error("Classifier is throttling requests")]
    Throttled,

    #[error("Classifier quota or billing exhausted: {0}")]
    QuotaExhausted(String),

    #[error("Classifier returned error (status {status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("Classifier response parsing error: {0}")]
    ResponseParsing(String),
}

impl ClassifierError {
    /// Worth another attempt: transport failures, timeouts, throttling and
    /// upstream 5xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClassifierError::Transport(_)
            | ClassifierError::Timeout(_)
            | ClassifierError::Throttled => true,
            ClassifierError::Upstream { status, .. } => *status >= 500,
            ClassifierError::QuotaExhausted(_) | ClassifierError::ResponseParsing(_) => false,
        }
    }

    /// Cannot succeed no matter how often it is retried; surfaced to the
    /// caller instead of degrading.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ClassifierError::QuotaExhausted(_))
    }
}

/// Opaque image classifier: takes a prepared image plus a natural-language
/// instruction and returns free-form text that should, but may not, be a
/// single JSON record.
pub trait Classifier: Send + Sync {
    fn classify<'a>(
        &'a self,
        image: &'a [u8],
        instructions: &'a str,
    ) -> BoxFuture<'a, Result<String, ClassifierError>>;
}

// ═══════════════════════════════════════════════════════════
// Mock classifier
// ═══════════════════════════════════════════════════════════

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Fail(ClassifierError),
    /// Never resolves.
    Hang,
}

/// Mock classifier for testing: plays back scripted replies in order, then
/// repeats the last one. Counts every call.
pub struct MockClassifier {
    script: Mutex<VecDeque<MockReply>>,
    last: Mutex<MockReply>,
    calls: AtomicUsize,
}

impl MockClassifier {
    pub fn new(replies: Vec<MockReply>) -> Self {
        let last = replies
            .last()
            .cloned()
            .unwrap_or_else(|| MockReply::Text(String::new()));
        Self {
            script: Mutex::new(replies.into()),
            last: Mutex::new(last),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always answers with `text`.
    pub fn answering(text: &str) -> Self {
        Self::new(vec![MockReply::Text(text.to_string())])
    }

    /// Always fails with `error`.
    pub fn failing(error: ClassifierError) -> Self {
        Self::new(vec![MockReply::Fail(error)])
    }

    /// Never answers.
    pub fn hanging() -> Self {
        Self::new(vec![MockReply::Hang])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> MockReply {
        let mut script = self
            .script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match script.pop_front() {
            Some(reply) => reply,
            None => self
                .last
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone(),
        }
    }
}

impl Classifier for MockClassifier {
    fn classify<'a>(
        &'a self,
        _image: &'a [u8],
        _instructions: &'a str,
    ) -> BoxFuture<'a, Result<String, ClassifierError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.next_reply();
        Box::pin(async move {
            match reply {
                MockReply::Text(text) => Ok(text),
                MockReply::Fail(error) => Err(error),
                MockReply::Hang => std::future::pending().await,
            }
        })
    }
}

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════
// Thresholds
// ═══════════════════════════════════════════════════════════

/// Below this, the result always recommends an expert.
pub const MEDIUM_THRESHOLD: u8 = 70;

/// At or above this, confidence is reported as high.
pub const HIGH_THRESHOLD: u8 = 85;

/// Confidence is clamped to `0..=MAX_CONFIDENCE`.
pub const MAX_CONFIDENCE: u8 = 99;

/// Used when the classifier omits confidence or sends something unusable.
pub const DEFAULT_CONFIDENCE: u8 = 50;

// ═══════════════════════════════════════════════════════════
// Closed string sets
// ═══════════════════════════════════════════════════════════

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {field} value: {value}")]
pub struct UnknownVariant {
    pub field: &'static str,
    pub value: String,
}

/// Enum with a fixed wire string per variant, `as_str` and `FromStr`.
macro_rules! str_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;

            /// Case-insensitive; surrounding whitespace ignored.
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let needle = s.trim();
                $(
                    if needle.eq_ignore_ascii_case($s) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(UnknownVariant {
                    field: stringify!($name),
                    value: s.to_string(),
                })
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(
    /// Supported output languages. `En` is the baseline every multilingual
    /// field must carry.
    Language {
        En => "en",
        Hi => "hi",
        Es => "es",
        Fr => "fr",
    }
);

impl Language {
    /// Unrecognised or absent hints fall back to English.
    pub fn from_hint(hint: Option<&str>) -> Self {
        hint.and_then(|h| h.parse().ok()).unwrap_or(Language::En)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Hi => "Hindi",
            Language::Es => "Spanish",
            Language::Fr => "French",
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::En
    }
}

str_enum!(Severity {
    Low => "Low",
    Medium => "Medium",
    High => "High",
});

str_enum!(ActionUrgency {
    Immediate => "immediate",
    Within3Days => "within_3_days",
    WithinWeek => "within_week",
    Routine => "routine",
});

impl ActionUrgency {
    /// Urgency implied by severity when the classifier gives none.
    pub fn for_severity(severity: Severity) -> Self {
        match severity {
            Severity::High => ActionUrgency::Within3Days,
            Severity::Medium => ActionUrgency::WithinWeek,
            Severity::Low => ActionUrgency::Routine,
        }
    }
}

str_enum!(ConfidenceTier {
    Low => "low",
    Medium => "medium",
    High => "high",
});

impl ConfidenceTier {
    pub fn from_confidence(confidence: u8) -> Self {
        if confidence >= HIGH_THRESHOLD {
            ConfidenceTier::High
        } else if confidence >= MEDIUM_THRESHOLD {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Request / result
// ═══════════════════════════════════════════════════════════

/// Language code → text.
pub type LocalizedText = BTreeMap<String, String>;

/// Language code → ordered list of steps.
pub type LocalizedList = BTreeMap<String, Vec<String>>;

/// One inbound classification call.
#[derive(Debug, Clone)]
pub struct DetectionRequest {
    /// Prepared JPEG bytes.
    pub image_bytes: Vec<u8>,
    pub language: Language,
    /// Rate-limit key (originating address).
    pub caller_key: String,
}

/// Final diagnosis, either validated from the classifier or synthesized as a
/// fallback. Never modified after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub crop: String,
    #[serde(alias = "issue")]
    pub disease: LocalizedText,
    pub category: String,
    pub severity: Severity,
    /// 0–99.
    pub confidence: u8,
    pub confidence_level: ConfidenceTier,
    pub description: LocalizedText,
    pub solutions: LocalizedList,
    pub prevention: LocalizedList,
    /// Short text meant to be read aloud.
    pub tts_script: LocalizedText,
    pub action_urgency: ActionUrgency,
    pub expert_consultation_recommended: bool,
    pub timestamp: DateTime<Utc>,
}

impl DetectionResult {
    /// Checks the invariants every result must satisfy: confidence in range,
    /// tier consistent, expert flag set below the medium threshold, and an
    /// English entry in every multilingual field.
    pub fn satisfies_invariants(&self) -> bool {
        let english_text = |m: &LocalizedText| {
            m.get(Language::En.as_str())
                .is_some_and(|s| !s.trim().is_empty())
        };
        let english_list = |m: &LocalizedList| {
            m.get(Language::En.as_str()).is_some_and(|v| !v.is_empty())
        };

        self.confidence <= MAX_CONFIDENCE
            && self.confidence_level == ConfidenceTier::from_confidence(self.confidence)
            && (self.confidence >= MEDIUM_THRESHOLD || self.expert_consultation_recommended)
            && english_text(&self.disease)
            && english_text(&self.description)
            && english_text(&self.tts_script)
            && english_list(&self.solutions)
            && english_list(&self.prevention)
    }
}

/// Tagged terminal state of the pipeline. Both variants carry a valid
/// result; callers treat them alike at the transport boundary and may log
/// the distinction.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationOutcome {
    Success(DetectionResult),
    Degraded(DetectionResult),
}

impl ClassificationOutcome {
    pub fn result(&self) -> &DetectionResult {
        match self {
            ClassificationOutcome::Success(r) | ClassificationOutcome::Degraded(r) => r,
        }
    }

    pub fn into_result(self) -> DetectionResult {
        match self {
            ClassificationOutcome::Success(r) | ClassificationOutcome::Degraded(r) => r,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, ClassificationOutcome::Degraded(_))
    }
}

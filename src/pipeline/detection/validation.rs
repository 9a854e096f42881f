//! Response validation: turns free-form classifier text into a complete
//! `DetectionResult`. Total: parse failures become the Fallback Result,
//! missing or malformed fields are backfilled.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::fallback::{
    default_description, default_disease, default_prevention, default_solutions,
    default_tts_script, fallback_result, UNKNOWN_CATEGORY, UNKNOWN_CROP,
};
use super::types::{
    ActionUrgency, ClassificationOutcome, ConfidenceTier, DetectionResult, Language,
    LocalizedList, LocalizedText, Severity, DEFAULT_CONFIDENCE, MAX_CONFIDENCE, MEDIUM_THRESHOLD,
};

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)```").unwrap());

/// Validate and normalize classifier text. Always returns a valid result.
pub fn validate(raw: &str, timestamp: DateTime<Utc>) -> DetectionResult {
    validate_outcome(raw, timestamp).into_result()
}

/// Like `validate`, but tags whether the result came from the classifier
/// (`Success`) or had to be synthesized (`Degraded`).
pub fn validate_outcome(raw: &str, timestamp: DateTime<Utc>) -> ClassificationOutcome {
    match parse_record(raw) {
        Some(record) => ClassificationOutcome::Success(normalize(&record, timestamp)),
        None => {
            warn!(response_len = raw.len(), "Classifier output unparseable, using fallback");
            ClassificationOutcome::Degraded(fallback_result(timestamp))
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Extraction
// ═══════════════════════════════════════════════════════════

fn parse_record(raw: &str) -> Option<Map<String, Value>> {
    candidate_bodies(raw).find_map(parse_object)
}

fn parse_object(body: &str) -> Option<Map<String, Value>> {
    let span = extract_object_span(body)?;
    match serde_json::from_str::<Value>(span) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => None,
        Err(e) => {
            debug!(error = %e, "Extracted span is not valid JSON");
            None
        }
    }
}

/// Contents of every fenced block in order, then the whole text.
pub fn candidate_bodies(raw: &str) -> impl Iterator<Item = &str> + '_ {
    CODE_FENCE
        .captures_iter(raw)
        .filter_map(|c| c.get(1))
        .map(|inner| inner.as_str().trim())
        .chain(std::iter::once(raw.trim()))
}

/// First balanced `{...}` span, ignoring braces inside JSON strings.
pub fn extract_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

// ═══════════════════════════════════════════════════════════
// Normalization
// ═══════════════════════════════════════════════════════════

fn normalize(record: &Map<String, Value>, timestamp: DateTime<Utc>) -> DetectionResult {
    let confidence = parse_confidence(record.get("confidence"));
    let severity = non_empty_str(record.get("severity"))
        .and_then(|s| s.parse().ok())
        .unwrap_or(Severity::Medium);
    let action_urgency = non_empty_str(record.get("actionUrgency"))
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| ActionUrgency::for_severity(severity));

    let expert_consultation_recommended = match record.get("expertConsultationRecommended") {
        Some(Value::Bool(flag)) => *flag || confidence < MEDIUM_THRESHOLD,
        _ => confidence < MEDIUM_THRESHOLD,
    };

    let disease = record.get("disease").or_else(|| record.get("issue"));

    DetectionResult {
        crop: non_empty_str(record.get("crop"))
            .unwrap_or(UNKNOWN_CROP)
            .to_string(),
        disease: localized_text(disease, "disease").unwrap_or_else(default_disease),
        category: non_empty_str(record.get("category"))
            .map(|c| c.to_lowercase())
            .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string()),
        severity,
        confidence,
        confidence_level: ConfidenceTier::from_confidence(confidence),
        description: localized_text(record.get("description"), "description")
            .unwrap_or_else(default_description),
        solutions: localized_list(record.get("solutions"), "solutions")
            .unwrap_or_else(default_solutions),
        prevention: localized_list(record.get("prevention"), "prevention")
            .unwrap_or_else(default_prevention),
        tts_script: localized_text(record.get("ttsScript"), "ttsScript")
            .unwrap_or_else(default_tts_script),
        action_urgency,
        expert_consultation_recommended,
        // Upstream timestamps are never trusted.
        timestamp,
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Clamp to `0..=MAX_CONFIDENCE`. Accepts numbers and numeric strings
/// (optionally with a trailing `%`). A strictly fractional value in (0, 1)
/// is read as a probability. Anything else, including negatives, gives
/// `DEFAULT_CONFIDENCE`.
pub fn parse_confidence(value: Option<&Value>) -> u8 {
    let number = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    };

    match number {
        Some(n) if n.is_finite() && n >= 0.0 => {
            let scaled = if n > 0.0 && n < 1.0 { n * 100.0 } else { n };
            scaled.round().min(MAX_CONFIDENCE as f64) as u8
        }
        _ => DEFAULT_CONFIDENCE,
    }
}

/// A multilingual text field counts only if it is an object with a
/// non-empty English entry. Otherwise the whole field is replaced by the
/// default set; individual languages are never patched in.
fn localized_text(value: Option<&Value>, field: &str) -> Option<LocalizedText> {
    let object = value.and_then(Value::as_object)?;
    let text: LocalizedText = object
        .iter()
        .filter_map(|(lang, v)| {
            let s = v.as_str()?.trim();
            (!s.is_empty()).then(|| (lang.to_string(), s.to_string()))
        })
        .collect();

    if text.contains_key(Language::En.as_str()) {
        Some(text)
    } else {
        debug!(field, "Multilingual field incomplete, using defaults");
        None
    }
}

/// Same rule as `localized_text`. A bare string per language is read as a
/// one-item list.
fn localized_list(value: Option<&Value>, field: &str) -> Option<LocalizedList> {
    let object = value.and_then(Value::as_object)?;
    let lists: LocalizedList = object
        .iter()
        .filter_map(|(lang, v)| {
            let items: Vec<String> = match v {
                Value::Array(items) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
                Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
                _ => Vec::new(),
            };
            (!items.is_empty()).then(|| (lang.to_string(), items))
        })
        .collect();

    if lists.contains_key(Language::En.as_str()) {
        Some(lists)
    } else {
        debug!(field, "Multilingual list incomplete, using defaults");
        None
    }
}

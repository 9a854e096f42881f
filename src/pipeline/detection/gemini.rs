use std::time::Duration;

use base64::Engine;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::classifier::{Classifier, ClassifierError};
use super::prompt::DETECTION_SYSTEM_PROMPT;
use crate::config::CLASSIFIER_TEMPERATURE;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upstream error bodies are truncated to this many characters.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Gemini `generateContent` client for image classification.
///
/// Sends the fixed system instruction, the JPEG inline and the per-request
/// instruction text in one call. The per-attempt deadline is enforced by the
/// caller; only connection setup is bounded here.
pub struct GeminiClassifier {
    base_url: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiClassifier {
    pub fn new(base_url: &str, model: &str, api_key: &str) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ClassifierError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    async fn generate(&self, image: &[u8], instructions: &str) -> Result<String, ClassifierError> {
        let body = build_request(image, instructions);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClassifierError::Transport(format!("Request timed out: {e}"))
                } else {
                    ClassifierError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_failure(status.as_u16(), &body));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::ResponseParsing(e.to_string()))?;

        let text = parsed.text().ok_or_else(|| {
            ClassifierError::ResponseParsing("response carried no text candidate".into())
        })?;

        debug!(model = %self.model, response_len = text.len(), "Classifier responded");
        Ok(text)
    }
}

impl Classifier for GeminiClassifier {
    fn classify<'a>(
        &'a self,
        image: &'a [u8],
        instructions: &'a str,
    ) -> BoxFuture<'a, Result<String, ClassifierError>> {
        Box::pin(self.generate(image, instructions))
    }
}

/// Map a non-success HTTP status to the error taxonomy.
///
/// 429 and 403 bodies mentioning quota or billing are fatal; a bare 429 is
/// throttling and worth retrying. Everything else is `Upstream`, retryable
/// only for 5xx.
pub fn classify_http_failure(status: u16, body: &str) -> ClassifierError {
    let lower = body.to_lowercase();
    let mentions_quota = lower.contains("quota") || lower.contains("billing");

    match status {
        429 | 403 if mentions_quota => ClassifierError::QuotaExhausted(truncate(body)),
        429 => ClassifierError::Throttled,
        _ => ClassifierError::Upstream {
            status,
            body: truncate(body),
        },
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

// ═══════════════════════════════════════════════════════════
// Wire types
// ═══════════════════════════════════════════════════════════

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

fn build_request(image: &[u8], instructions: &str) -> GenerateRequest {
    GenerateRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part {
                text: Some(DETECTION_SYSTEM_PROMPT.to_string()),
                inline_data: None,
            }],
        },
        contents: vec![Content {
            role: Some("user".into()),
            parts: vec![
                Part {
                    text: None,
                    inline_data: Some(InlineData {
                        mime_type: "image/jpeg".into(),
                        data: base64::engine::general_purpose::STANDARD.encode(image),
                    }),
                },
                Part {
                    text: Some(instructions.to_string()),
                    inline_data: None,
                },
            ],
        }],
        generation_config: GenerationConfig {
            temperature: CLASSIFIER_TEMPERATURE,
            response_mime_type: "application/json",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_exhaustion_is_fatal() {
        let err = classify_http_failure(429, r#"{"error":{"message":"Quota exceeded for project"}}"#);
        assert!(matches!(err, ClassifierError::QuotaExhausted(_)));
        assert!(err.is_fatal());

        let err = classify_http_failure(403, "Billing account disabled");
        assert!(err.is_fatal());
    }

    #[test]
    fn bare_429_is_throttling() {
        let err = classify_http_failure(429, "Too many requests");
        assert_eq!(err, ClassifierError::Throttled);
        assert!(err.is_retryable());
    }

    #[test]
    fn other_statuses_are_upstream() {
        let err = classify_http_failure(503, "overloaded");
        assert!(err.is_retryable());

        let err = classify_http_failure(400, "bad image");
        assert!(matches!(err, ClassifierError::Upstream { status: 400, .. }));
        assert!(!err.is_retryable());
        assert!(!err.is_fatal());

        // 403 without quota wording is a plain upstream failure.
        assert!(!classify_http_failure(403, "permission denied").is_fatal());
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(5000);
        match classify_http_failure(500, &body) {
            ClassifierError::Upstream { body, .. } => assert_eq!(body.len(), MAX_ERROR_BODY_CHARS),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn request_carries_image_prompt_and_low_temperature() {
        let body = serde_json::to_value(build_request(&[1, 2, 3], "Respond in Hindi")).unwrap();

        assert!(body["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("JSON"));
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[0]["inlineData"]["data"], "AQID");
        assert_eq!(parts[1]["text"], "Respond in Hindi");
        assert!((body["generationConfig"]["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn response_text_joins_first_candidate_parts() {
        let raw = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"{\"crop\":"},{"text":"\"Tomato\"}"}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.text().unwrap(), r#"{"crop":"Tomato"}"#);
    }

    #[test]
    fn empty_response_has_no_text() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(parsed.text().is_none());

        let parsed: GenerateResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap();
        assert!(parsed.text().is_none());
    }

    #[test]
    fn endpoint_uses_model_path() {
        let client = GeminiClassifier::new("http://localhost:9999/", "gemini-test", "k").unwrap();
        assert_eq!(
            client.endpoint(),
            "http://localhost:9999/v1beta/models/gemini-test:generateContent"
        );
    }
}

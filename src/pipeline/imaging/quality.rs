//! Quality gate: turns pixel metrics into a pass/fail report with
//! recommendations the user can act on before retaking the photo.
//!
//! Assessment is total. A photo that cannot be decoded still yields a
//! report (invalid, score 0) instead of an error.

use serde::Serialize;
use tracing::debug;

use super::metrics::{measure, PixelMetrics};
use super::types::SourceImage;

/// Score at or above which an image is fit for classification.
pub const PASS_SCORE: u8 = 40;

const MAX_SCORE: i32 = 100;

/// Thresholds and penalties for each independent rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityThresholds {
    pub min_brightness: f32,
    pub max_brightness: f32,
    pub min_contrast: f32,
    pub min_sharpness: f32,
    pub min_dimension: u32,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_brightness: 30.0,
            max_brightness: 220.0,
            min_contrast: 20.0,
            min_sharpness: 15.0,
            min_dimension: 400,
        }
    }
}

const DARK_PENALTY: i32 = 25;
const OVEREXPOSED_PENALTY: i32 = 20;
const LOW_CONTRAST_PENALTY: i32 = 20;
const BLURRY_PENALTY: i32 = 30;
const LOW_RESOLUTION_PENALTY: i32 = 15;

pub const ISSUE_TOO_DARK: &str = "too dark";
pub const ISSUE_OVEREXPOSED: &str = "overexposed";
pub const ISSUE_LOW_CONTRAST: &str = "low contrast";
pub const ISSUE_BLURRY: &str = "blurry";
pub const ISSUE_LOW_RESOLUTION: &str = "low resolution";
pub const ISSUE_UNDECODABLE: &str = "image could not be decoded";

/// Outcome of one quality assessment. Built once, never modified.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityReport {
    pub is_valid: bool,
    /// 0–100, reduced by one fixed penalty per failing rule.
    pub score: u8,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub brightness: f32,
    pub contrast: f32,
    pub sharpness: f32,
}

impl QualityReport {
    /// Report for an image whose pixels could not be read.
    pub fn decode_failure() -> Self {
        Self {
            is_valid: false,
            score: 0,
            issues: vec![ISSUE_UNDECODABLE.to_string()],
            recommendations: vec![
                "Retake the photo and upload it as a JPEG or PNG file".to_string(),
            ],
            brightness: 0.0,
            contrast: 0.0,
            sharpness: 0.0,
        }
    }
}

/// Assesses image fitness without modifying the image.
pub trait QualityAssessor: Send + Sync {
    fn assess(&self, image: &SourceImage) -> QualityReport;

    /// Assess encoded bytes. Decode failures produce an invalid report.
    fn assess_bytes(&self, bytes: &[u8]) -> QualityReport {
        match SourceImage::decode(bytes) {
            Ok(image) => self.assess(&image),
            Err(e) => {
                debug!(error = %e, "Quality gate could not decode image");
                QualityReport::decode_failure()
            }
        }
    }
}

/// Rule-based gate: starts at 100 and subtracts a fixed penalty for every
/// rule that fails. Rules are evaluated independently.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityGate {
    thresholds: QualityThresholds,
}

impl QualityGate {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    /// Evaluate a decoded image.
    pub fn evaluate(&self, image: &SourceImage) -> QualityReport {
        let metrics = measure(&image.pixels);
        let report = self.score(&metrics, image.width(), image.height());
        debug!(
            brightness = report.brightness,
            contrast = report.contrast,
            sharpness = report.sharpness,
            score = report.score,
            valid = report.is_valid,
            "Quality gate evaluated"
        );
        report
    }

    /// Apply the penalty rules to already-computed metrics.
    pub fn score(&self, metrics: &PixelMetrics, width: u32, height: u32) -> QualityReport {
        let t = &self.thresholds;
        let mut score = MAX_SCORE;
        let mut issues = Vec::new();
        let mut recommendations = Vec::new();

        let mut fail = |penalty: i32, issue: &str, recommendation: &str| {
            score -= penalty;
            issues.push(issue.to_string());
            recommendations.push(recommendation.to_string());
        };

        if metrics.brightness < t.min_brightness {
            fail(
                DARK_PENALTY,
                ISSUE_TOO_DARK,
                "Move to better light or photograph the plant in daylight",
            );
        }
        if metrics.brightness > t.max_brightness {
            fail(
                OVEREXPOSED_PENALTY,
                ISSUE_OVEREXPOSED,
                "Avoid direct sunlight or flash glare; shade the leaf before shooting",
            );
        }
        if metrics.contrast < t.min_contrast {
            fail(
                LOW_CONTRAST_PENALTY,
                ISSUE_LOW_CONTRAST,
                "Fill the frame with the affected leaf against a plain background",
            );
        }
        if metrics.sharpness < t.min_sharpness {
            fail(
                BLURRY_PENALTY,
                ISSUE_BLURRY,
                "Hold the camera steady and tap the screen to focus on the leaf",
            );
        }
        if width.min(height) < t.min_dimension {
            fail(
                LOW_RESOLUTION_PENALTY,
                ISSUE_LOW_RESOLUTION,
                "Move closer or use a higher camera resolution",
            );
        }

        let score = score.clamp(0, MAX_SCORE) as u8;

        QualityReport {
            is_valid: score >= PASS_SCORE,
            score,
            issues,
            recommendations,
            brightness: metrics.brightness,
            contrast: metrics.contrast,
            sharpness: metrics.sharpness,
        }
    }
}

impl QualityAssessor for QualityGate {
    fn assess(&self, image: &SourceImage) -> QualityReport {
        self.evaluate(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn good_metrics() -> PixelMetrics {
        PixelMetrics {
            brightness: 120.0,
            contrast: 50.0,
            sharpness: 40.0,
        }
    }

    fn source(pixels: RgbaImage) -> SourceImage {
        SourceImage::from_pixels(pixels).unwrap()
    }

    #[test]
    fn clean_photo_scores_full_marks() {
        let report = QualityGate::default().score(&good_metrics(), 1024, 768);
        assert_eq!(report.score, 100);
        assert!(report.is_valid);
        assert!(report.issues.is_empty());
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn each_rule_applies_its_penalty() {
        let gate = QualityGate::default();
        let cases = [
            (PixelMetrics { brightness: 10.0, ..good_metrics() }, 1000, 75, ISSUE_TOO_DARK),
            (PixelMetrics { brightness: 240.0, ..good_metrics() }, 1000, 80, ISSUE_OVEREXPOSED),
            (PixelMetrics { contrast: 5.0, ..good_metrics() }, 1000, 80, ISSUE_LOW_CONTRAST),
            (PixelMetrics { sharpness: 3.0, ..good_metrics() }, 1000, 70, ISSUE_BLURRY),
            (good_metrics(), 300, 85, ISSUE_LOW_RESOLUTION),
        ];

        for (metrics, side, expected, issue) in cases {
            let report = gate.score(&metrics, side, side);
            assert_eq!(report.score, expected, "{issue}");
            assert_eq!(report.issues, vec![issue.to_string()]);
            assert_eq!(report.recommendations.len(), 1);
        }
    }

    #[test]
    fn penalties_accumulate() {
        let metrics = PixelMetrics {
            brightness: 5.0,
            contrast: 0.0,
            sharpness: 0.0,
        };
        let report = QualityGate::default().score(&metrics, 100, 100);
        // 100 - 25 - 20 - 30 - 15 = 10
        assert_eq!(report.score, 10);
        assert!(!report.is_valid);
        assert_eq!(report.issues.len(), 4);
        assert_eq!(report.recommendations.len(), 4);
    }

    #[test]
    fn custom_thresholds_are_honoured() {
        let strict = QualityGate::new(QualityThresholds {
            min_dimension: 2000,
            ..QualityThresholds::default()
        });
        let report = strict.score(&good_metrics(), 1024, 1024);
        assert_eq!(report.score, 85);
        assert_eq!(report.issues, vec![ISSUE_LOW_RESOLUTION.to_string()]);
    }

    #[test]
    fn validity_tracks_pass_score() {
        let gate = QualityGate::default();
        // blurry + low contrast: 100 - 30 - 20 = 50
        let metrics = PixelMetrics {
            contrast: 1.0,
            sharpness: 1.0,
            ..good_metrics()
        };
        let report = gate.score(&metrics, 800, 800);
        assert_eq!(report.score, 50);
        assert!(report.is_valid);

        // plus low resolution: 35
        let report = gate.score(&metrics, 200, 800);
        assert_eq!(report.score, 35);
        assert!(!report.is_valid);
    }

    #[test]
    fn small_black_image_is_rejected() {
        let report = QualityGate::default()
            .evaluate(&source(RgbaImage::from_pixel(50, 50, Rgba([0, 0, 0, 255]))));

        assert!(report.issues.contains(&ISSUE_TOO_DARK.to_string()));
        assert!(report.issues.contains(&ISSUE_LOW_RESOLUTION.to_string()));
        assert!(report.score <= 60);
        // Solid black also has no contrast and no edges.
        assert_eq!(report.score, 10);
        assert!(!report.is_valid);
    }

    #[test]
    fn undecodable_bytes_produce_failing_report() {
        let report = QualityGate::default().assess_bytes(b"not an image at all");
        assert!(!report.is_valid);
        assert_eq!(report.score, 0);
        assert_eq!(report.issues, vec![ISSUE_UNDECODABLE.to_string()]);
    }

    #[test]
    fn report_serializes_camel_case() {
        let report = QualityGate::default().score(&good_metrics(), 800, 800);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["isValid"], true);
        assert_eq!(json["score"], 100);
        assert!(json["recommendations"].is_array());
    }
}

//! Fallback Result and the built-in multilingual default sets.
//!
//! The fallback is a terminal state, not an error payload: it satisfies every
//! invariant a validated result does.

use chrono::{DateTime, Utc};

use super::types::{
    ActionUrgency, ConfidenceTier, DetectionResult, LocalizedList, LocalizedText, Severity,
};

pub const UNKNOWN_CROP: &str = "Unknown";
pub const UNKNOWN_CATEGORY: &str = "unknown";

fn text(entries: [(&str, &str); 4]) -> LocalizedText {
    entries
        .into_iter()
        .map(|(lang, s)| (lang.to_string(), s.to_string()))
        .collect()
}

fn list(entries: [(&str, &[&str]); 4]) -> LocalizedList {
    entries
        .into_iter()
        .map(|(lang, items)| (lang.to_string(), items.iter().map(|s| s.to_string()).collect()))
        .collect()
}

// ═══════════════════════════════════════════════════════════
// Fallback Result
// ═══════════════════════════════════════════════════════════

/// Low-confidence result used when the pipeline cannot produce a trustworthy
/// answer. Steers the user toward retaking the photo.
pub fn fallback_result(timestamp: DateTime<Utc>) -> DetectionResult {
    DetectionResult {
        crop: UNKNOWN_CROP.to_string(),
        disease: text([
            ("en", "Analysis unavailable"),
            ("hi", "विश्लेषण उपलब्ध नहीं"),
            ("es", "Análisis no disponible"),
            ("fr", "Analyse indisponible"),
        ]),
        category: UNKNOWN_CATEGORY.to_string(),
        severity: Severity::Medium,
        confidence: 0,
        confidence_level: ConfidenceTier::Low,
        description: text([
            (
                "en",
                "We could not analyse this photo reliably. Please try again with a clearer picture of the affected leaf.",
            ),
            (
                "hi",
                "हम इस फ़ोटो का सही विश्लेषण नहीं कर सके। कृपया प्रभावित पत्ती की साफ़ फ़ोटो के साथ फिर से प्रयास करें।",
            ),
            (
                "es",
                "No pudimos analizar esta foto de forma fiable. Inténtelo de nuevo con una imagen más clara de la hoja afectada.",
            ),
            (
                "fr",
                "Nous n'avons pas pu analyser cette photo de façon fiable. Réessayez avec une image plus nette de la feuille atteinte.",
            ),
        ]),
        solutions: list([
            (
                "en",
                &[
                    "Take the photo in daylight without flash",
                    "Hold the camera 20 to 30 cm from one affected leaf",
                    "Make sure the leaf is in focus before taking the picture",
                ],
            ),
            (
                "hi",
                &[
                    "फ़्लैश के बिना दिन की रोशनी में फ़ोटो लें",
                    "कैमरे को प्रभावित पत्ती से 20 से 30 सेमी दूर रखें",
                    "फ़ोटो लेने से पहले पत्ती पर फ़ोकस सुनिश्चित करें",
                ],
            ),
            (
                "es",
                &[
                    "Tome la foto con luz natural y sin flash",
                    "Sostenga la cámara a 20 o 30 cm de una hoja afectada",
                    "Asegúrese de que la hoja esté enfocada antes de tomar la foto",
                ],
            ),
            (
                "fr",
                &[
                    "Prenez la photo à la lumière du jour sans flash",
                    "Tenez l'appareil à 20 ou 30 cm d'une feuille atteinte",
                    "Vérifiez que la feuille est nette avant de prendre la photo",
                ],
            ),
        ]),
        prevention: default_prevention(),
        tts_script: text([
            ("en", "We could not check this photo. Please take a clearer picture of the leaf and try again."),
            ("hi", "हम इस फ़ोटो की जाँच नहीं कर सके। कृपया पत्ती की साफ़ फ़ोटो लेकर फिर से प्रयास करें।"),
            ("es", "No pudimos revisar esta foto. Tome una imagen más clara de la hoja e inténtelo de nuevo."),
            ("fr", "Nous n'avons pas pu vérifier cette photo. Prenez une image plus nette de la feuille et réessayez."),
        ]),
        action_urgency: ActionUrgency::WithinWeek,
        expert_consultation_recommended: true,
        timestamp,
    }
}

// ═══════════════════════════════════════════════════════════
// Default sets for incomplete classifier output
// ═══════════════════════════════════════════════════════════

pub fn default_disease() -> LocalizedText {
    text([
        ("en", "Unidentified plant problem"),
        ("hi", "अज्ञात पौधा समस्या"),
        ("es", "Problema de planta no identificado"),
        ("fr", "Problème de plante non identifié"),
    ])
}

pub fn default_description() -> LocalizedText {
    text([
        ("en", "The analysis did not include a description. Ask a local agricultural extension officer to inspect the plant."),
        ("hi", "विश्लेषण में विवरण शामिल नहीं था। पौधे की जाँच के लिए स्थानीय कृषि विस्तार अधिकारी से संपर्क करें।"),
        ("es", "El análisis no incluyó una descripción. Pida a un técnico agrícola local que revise la planta."),
        ("fr", "L'analyse ne contenait pas de description. Demandez à un conseiller agricole local d'examiner la plante."),
    ])
}

pub fn default_solutions() -> LocalizedList {
    list([
        ("en", &["Remove and destroy badly affected leaves", "Consult a local agricultural expert before applying any treatment"]),
        ("hi", &["बुरी तरह प्रभावित पत्तियों को हटाकर नष्ट करें", "कोई भी उपचार करने से पहले स्थानीय कृषि विशेषज्ञ से सलाह लें"]),
        ("es", &["Retire y destruya las hojas muy afectadas", "Consulte a un experto agrícola local antes de aplicar cualquier tratamiento"]),
        ("fr", &["Retirez et détruisez les feuilles très atteintes", "Consultez un expert agricole local avant tout traitement"]),
    ])
}

pub fn default_prevention() -> LocalizedList {
    list([
        ("en", &["Inspect plants weekly", "Water at the base of the plant, not on the leaves", "Rotate crops between seasons"]),
        ("hi", &["हर सप्ताह पौधों की जाँच करें", "पत्तियों पर नहीं, पौधे की जड़ में पानी दें", "मौसम बदलने पर फसल चक्र अपनाएँ"]),
        ("es", &["Revise las plantas cada semana", "Riegue la base de la planta, no las hojas", "Rote los cultivos entre temporadas"]),
        ("fr", &["Inspectez les plantes chaque semaine", "Arrosez au pied de la plante, pas sur les feuilles", "Pratiquez la rotation des cultures"]),
    ])
}

pub fn default_tts_script() -> LocalizedText {
    text([
        ("en", "The problem could not be fully identified. Please ask a local expert to look at the plant."),
        ("hi", "समस्या की पूरी पहचान नहीं हो सकी। कृपया किसी स्थानीय विशेषज्ञ से पौधे की जाँच कराएँ।"),
        ("es", "No se pudo identificar bien el problema. Pida a un experto local que revise la planta."),
        ("fr", "Le problème n'a pas pu être identifié. Demandez à un expert local d'examiner la plante."),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::detection::types::Language;

    #[test]
    fn fallback_satisfies_invariants() {
        let result = fallback_result(Utc::now());
        assert!(result.satisfies_invariants());
        assert_eq!(result.confidence, 0);
        assert_eq!(result.category, UNKNOWN_CATEGORY);
        assert!(result.expert_consultation_recommended);
    }

    #[test]
    fn default_sets_cover_every_language() {
        for lang in Language::ALL {
            let code = lang.as_str();
            assert!(default_disease().contains_key(code));
            assert!(default_description().contains_key(code));
            assert!(default_tts_script().contains_key(code));
            assert!(!default_solutions()[code].is_empty());
            assert!(!default_prevention()[code].is_empty());

            let fb = fallback_result(Utc::now());
            assert!(fb.disease.contains_key(code));
            assert!(!fb.solutions[code].is_empty());
        }
    }

    #[test]
    fn fallback_keeps_given_timestamp() {
        let ts = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(fallback_result(ts).timestamp, ts);
    }
}

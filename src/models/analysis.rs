//! Analysis result row and the raw inference payload it is normalized from.
//!
//! The inference service reports confidence as a percentage; everything past
//! the ingest boundary uses a 0.0–1.0 fraction. Banding, the chat responder,
//! and display formatting all assume the fraction form.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Model identifier the service falls back to when it omits one.
pub const DEFAULT_AI_MODEL: &str = "DenseNet-121";

/// Raw JSON object returned by the inference service for one upload.
///
/// The service has emitted both snake_case and camelCase variants of these
/// keys over time, so both are accepted. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct InferencePayload {
    #[serde(default)]
    pub scan_id: Option<Uuid>,
    #[serde(alias = "tumorDetected")]
    pub tumor_detected: bool,
    /// Percentage as reported by the service (e.g. 94.5).
    pub confidence: f64,
    #[serde(alias = "tumorType")]
    pub tumor_type: String,
    #[serde(default, alias = "tumorSize")]
    pub tumor_size: Option<String>,
    #[serde(default, alias = "tumorLocation")]
    pub tumor_location: Option<String>,
    #[serde(default, alias = "tumorVolume")]
    pub tumor_volume: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub ai_model: Option<String>,
    #[serde(default)]
    pub processing_time: Option<f64>,
    #[serde(default)]
    pub slices_analyzed: Option<u32>,
    #[serde(default)]
    pub report_pdf_url: Option<String>,
    #[serde(default)]
    pub gradcam_url: Option<String>,
}

/// Normalized `analysis_results` row.
///
/// A pure projection of the inference payload for the enumerated fields,
/// with the confidence rescaled to its canonical fraction form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Assigned by the data store on insert; `None` before persistence.
    /// Absent keys stay absent on the wire so the insert does not override
    /// the column defaults with explicit nulls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_id: Option<Uuid>,
    pub tumor_detected: bool,
    /// Canonical confidence: fraction in [0.0, 1.0].
    pub confidence: f64,
    pub tumor_type: String,
    pub tumor_size: Option<String>,
    pub tumor_location: Option<String>,
    pub tumor_volume: Option<String>,
    pub severity: Option<String>,
    pub description: Option<String>,
    pub recommendations: Vec<String>,
    pub ai_model: String,
    pub processing_time: Option<f64>,
    pub slices_analyzed: Option<u32>,
    #[serde(default)]
    pub gradcam_url: Option<String>,
}

impl AnalysisResult {
    /// Normalize the raw inference payload into the canonical row shape.
    pub fn from_payload(payload: InferencePayload) -> Self {
        Self {
            id: None,
            scan_id: payload.scan_id,
            tumor_detected: payload.tumor_detected,
            confidence: normalize_confidence(payload.confidence),
            tumor_type: payload.tumor_type,
            tumor_size: payload.tumor_size,
            tumor_location: payload.tumor_location,
            tumor_volume: payload.tumor_volume,
            severity: payload.severity,
            description: payload.description,
            recommendations: payload.recommendations,
            ai_model: payload
                .ai_model
                .unwrap_or_else(|| DEFAULT_AI_MODEL.to_string()),
            processing_time: payload.processing_time,
            slices_analyzed: payload.slices_analyzed,
            gradcam_url: payload.gradcam_url,
        }
    }
}

/// Canonicalize a reported confidence value.
///
/// Values above 1.0 are treated as percentages and rescaled; the result is
/// clamped to [0.0, 1.0].
pub fn normalize_confidence(raw: f64) -> f64 {
    if raw > 1.0 {
        (raw / 100.0).clamp(0.0, 1.0)
    } else {
        raw.max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_json() -> &'static str {
        r#"{
            "tumor_detected": true,
            "confidence": 94.5,
            "tumor_type": "Glioblastoma",
            "tumor_size": "3.2 x 2.8 x 2.5 cm",
            "tumor_location": "Right Frontal Lobe",
            "tumor_volume": "23.5 cm3",
            "severity": "high",
            "description": "AI analyzed MRI scan and predicted tumor classification.",
            "recommendations": ["Consult your neurologist for further review."],
            "ai_model": "DenseNet-121",
            "processing_time": 1.8,
            "slices_analyzed": 156,
            "gradcam_url": "https://example.com/gradcam/abc.png"
        }"#
    }

    #[test]
    fn payload_parses_snake_case() {
        let payload: InferencePayload = serde_json::from_str(payload_json()).unwrap();
        assert!(payload.tumor_detected);
        assert_eq!(payload.tumor_type, "Glioblastoma");
        assert_eq!(payload.slices_analyzed, Some(156));
    }

    #[test]
    fn payload_accepts_camel_case_aliases() {
        let json = r#"{
            "tumorDetected": false,
            "confidence": 12.0,
            "tumorType": "No Tumor"
        }"#;
        let payload: InferencePayload = serde_json::from_str(json).unwrap();
        assert!(!payload.tumor_detected);
        assert_eq!(payload.tumor_type, "No Tumor");
        assert!(payload.recommendations.is_empty());
    }

    #[test]
    fn normalization_is_a_pure_projection() {
        let payload: InferencePayload = serde_json::from_str(payload_json()).unwrap();
        let result = AnalysisResult::from_payload(payload.clone());
        assert_eq!(result.tumor_detected, payload.tumor_detected);
        assert_eq!(result.tumor_type, payload.tumor_type);
        assert_eq!(result.tumor_size, payload.tumor_size);
        assert_eq!(result.tumor_location, payload.tumor_location);
        assert_eq!(result.tumor_volume, payload.tumor_volume);
        assert_eq!(result.severity, payload.severity);
        assert_eq!(result.description, payload.description);
        assert_eq!(result.recommendations, payload.recommendations);
        assert_eq!(result.processing_time, payload.processing_time);
        assert_eq!(result.slices_analyzed, payload.slices_analyzed);
        assert_eq!(result.gradcam_url, payload.gradcam_url);
        // Confidence is rescaled at the ingest boundary, nowhere else.
        assert!((result.confidence - 0.945).abs() < 1e-9);
    }

    #[test]
    fn unsaved_row_serializes_without_absent_keys() {
        let payload: InferencePayload = serde_json::from_str(payload_json()).unwrap();
        let row = AnalysisResult::from_payload(payload);
        assert!(row.id.is_none());

        let value = serde_json::to_value(&row).unwrap();
        // Explicit nulls would override column defaults on insert.
        assert!(value.get("id").is_none());
        assert!(value.get("scan_id").is_none());
        assert_eq!(value["tumor_type"], "Glioblastoma");
    }

    #[test]
    fn saved_row_serializes_its_id() {
        let payload: InferencePayload = serde_json::from_str(payload_json()).unwrap();
        let mut row = AnalysisResult::from_payload(payload);
        row.id = Some(Uuid::new_v4());

        let value = serde_json::to_value(&row).unwrap();
        assert!(value.get("id").is_some());
    }

    #[test]
    fn missing_model_falls_back_to_default() {
        let json = r#"{"tumor_detected": true, "confidence": 80.0, "tumor_type": "Meningioma"}"#;
        let payload: InferencePayload = serde_json::from_str(json).unwrap();
        let result = AnalysisResult::from_payload(payload);
        assert_eq!(result.ai_model, DEFAULT_AI_MODEL);
    }

    #[test]
    fn confidence_percentages_are_rescaled() {
        assert!((normalize_confidence(94.5) - 0.945).abs() < 1e-9);
        assert!((normalize_confidence(100.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn confidence_fractions_pass_through() {
        assert!((normalize_confidence(0.945) - 0.945).abs() < 1e-9);
        assert!((normalize_confidence(1.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn confidence_is_clamped() {
        assert!((normalize_confidence(250.0) - 1.0).abs() < 1e-9);
        assert!(normalize_confidence(-3.0).abs() < 1e-9);
    }
}

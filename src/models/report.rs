//! Report row, the merged report view, and confidence banding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::analysis::AnalysisResult;

/// `reports` row: ties a patient to one analysis plus a generation
/// timestamp. The "current" report is the most recently generated one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub analysis_id: Uuid,
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub report_pdf_url: Option<String>,
    #[serde(default)]
    pub gradcam_url: Option<String>,
}

/// Three-level qualitative classification of a confidence fraction.
///
/// Thresholds are fixed constants: ≥ 0.90 is good, ≥ 0.70 is warning,
/// everything below is critical. Boundaries belong to the higher band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    Good,
    Warning,
    Critical,
}

impl ConfidenceBand {
    pub fn from_fraction(confidence: f64) -> Self {
        if confidence >= 0.9 {
            Self::Good
        } else if confidence >= 0.7 {
            Self::Warning
        } else {
            Self::Critical
        }
    }

    /// Presentation class name used by the screens.
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

/// Merged Report + AnalysisResult view the report screen renders.
///
/// Built by the assembler from exactly one report and the analysis it
/// references. On key collision the analysis value wins (the merge the
/// original screen did with object spread), with the report value as the
/// fallback when the analysis omits it.
#[derive(Debug, Clone, Serialize)]
pub struct ReportView {
    pub report_id: Uuid,
    pub patient_id: Uuid,
    pub analysis_id: Uuid,
    pub patient_name: String,
    pub generated_at: Option<DateTime<Utc>>,
    pub tumor_detected: bool,
    /// Confidence fraction in [0.0, 1.0].
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
    pub gradcam_url: Option<String>,
}

impl ReportView {
    pub fn merge(report: &Report, analysis: &AnalysisResult, patient_name: &str) -> Self {
        Self {
            report_id: report.id,
            patient_id: report.patient_id,
            analysis_id: report.analysis_id,
            patient_name: patient_name.to_string(),
            generated_at: report.generated_at,
            tumor_detected: analysis.tumor_detected,
            confidence: analysis.confidence,
            tumor_type: analysis.tumor_type.clone(),
            tumor_size: analysis.tumor_size.clone(),
            tumor_location: analysis.tumor_location.clone(),
            tumor_volume: analysis.tumor_volume.clone(),
            severity: analysis.severity.clone(),
            description: analysis.description.clone(),
            recommendations: analysis.recommendations.clone(),
            ai_model: analysis.ai_model.clone(),
            processing_time: analysis.processing_time,
            slices_analyzed: analysis.slices_analyzed,
            // Present on both rows; the analysis value wins.
            gradcam_url: analysis
                .gradcam_url
                .clone()
                .or_else(|| report.gradcam_url.clone()),
        }
    }

    /// Locale-style display date ("January 15, 2025"), or "N/A" when the
    /// generation timestamp is absent.
    pub fn display_date(&self) -> String {
        match self.generated_at {
            Some(ts) => ts.format("%B %-d, %Y").to_string(),
            None => "N/A".to_string(),
        }
    }

    /// User-facing percentage string ("94.50%").
    pub fn confidence_display(&self) -> String {
        format!("{:.2}%", self.confidence * 100.0)
    }

    pub fn confidence_band(&self) -> ConfidenceBand {
        ConfidenceBand::from_fraction(self.confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_analysis(confidence: f64) -> AnalysisResult {
        AnalysisResult {
            id: Some(Uuid::new_v4()),
            scan_id: None,
            tumor_detected: true,
            confidence,
            tumor_type: "Glioblastoma".to_string(),
            tumor_size: Some("3.2 x 2.8 x 2.5 cm".to_string()),
            tumor_location: Some("Right Frontal Lobe".to_string()),
            tumor_volume: Some("23.5 cm3".to_string()),
            severity: Some("high".to_string()),
            description: Some("Large heterogeneously enhancing mass.".to_string()),
            recommendations: vec!["Immediate neurosurgical consultation".to_string()],
            ai_model: "DenseNet-121".to_string(),
            processing_time: Some(1.8),
            slices_analyzed: Some(156),
            gradcam_url: Some("https://example.com/analysis.png".to_string()),
        }
    }

    fn sample_report() -> Report {
        Report {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            analysis_id: Uuid::new_v4(),
            generated_at: Some(Utc.with_ymd_and_hms(2025, 1, 15, 9, 30, 0).unwrap()),
            report_pdf_url: None,
            gradcam_url: Some("https://example.com/report.png".to_string()),
        }
    }

    #[test]
    fn banding_matches_fixed_thresholds() {
        assert_eq!(ConfidenceBand::from_fraction(0.95), ConfidenceBand::Good);
        assert_eq!(ConfidenceBand::from_fraction(0.75), ConfidenceBand::Warning);
        assert_eq!(ConfidenceBand::from_fraction(0.5), ConfidenceBand::Critical);
    }

    #[test]
    fn band_boundaries_belong_to_higher_band() {
        assert_eq!(ConfidenceBand::from_fraction(0.9), ConfidenceBand::Good);
        assert_eq!(ConfidenceBand::from_fraction(0.7), ConfidenceBand::Warning);
    }

    #[test]
    fn band_class_names() {
        assert_eq!(ConfidenceBand::Good.class_name(), "good");
        assert_eq!(ConfidenceBand::Warning.class_name(), "warning");
        assert_eq!(ConfidenceBand::Critical.class_name(), "critical");
    }

    #[test]
    fn merge_prefers_analysis_on_collision() {
        let report = sample_report();
        let analysis = sample_analysis(0.945);
        let view = ReportView::merge(&report, &analysis, "John Anderson");
        assert_eq!(view.gradcam_url.as_deref(), Some("https://example.com/analysis.png"));
        assert_eq!(view.tumor_type, "Glioblastoma");
        assert_eq!(view.patient_name, "John Anderson");
    }

    #[test]
    fn merge_falls_back_to_report_fields() {
        let report = sample_report();
        let mut analysis = sample_analysis(0.945);
        analysis.gradcam_url = None;
        let view = ReportView::merge(&report, &analysis, "John Anderson");
        assert_eq!(view.gradcam_url.as_deref(), Some("https://example.com/report.png"));
    }

    #[test]
    fn display_date_formats_timestamp() {
        let view = ReportView::merge(&sample_report(), &sample_analysis(0.945), "J");
        assert_eq!(view.display_date(), "January 15, 2025");
    }

    #[test]
    fn display_date_falls_back_to_na() {
        let mut report = sample_report();
        report.generated_at = None;
        let view = ReportView::merge(&report, &sample_analysis(0.945), "J");
        assert_eq!(view.display_date(), "N/A");
    }

    #[test]
    fn confidence_display_scales_to_percent() {
        let view = ReportView::merge(&sample_report(), &sample_analysis(0.8234), "J");
        assert_eq!(view.confidence_display(), "82.34%");
    }
}

//! PDF export of the report screen.
//!
//! Rendering is two parts: a typeset summary page built from the merged
//! report view, and the Grad-CAM heatmap sliced across as many extra A4
//! pages as its height needs. The slicing math lives in `page_offsets` so
//! the pagination is testable without producing a document.

use std::fs;
use std::io::{BufWriter, Cursor};
use std::path::PathBuf;

use chrono::NaiveDate;
use printpdf::image_crate::codecs::png::PngDecoder;
use printpdf::*;
use thiserror::Error;

use crate::models::report::ReportView;

/// A4 portrait.
pub const PAGE_WIDTH_MM: f64 = 210.0;
pub const PAGE_HEIGHT_MM: f64 = 297.0;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("PDF generation failed: {0}")]
    Pdf(String),

    #[error("Could not write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Heatmap image could not be embedded: {0}")]
    Heatmap(String),
}

/// Vertical translation, in mm from the page bottom, of the full image on
/// each page of a sliced render.
///
/// One entry per page, `ceil(image_h / page_h)` entries total. The first
/// page shows the top of the image, so the image bottom starts at
/// `page_h - image_h` (below the page for tall images); each following page
/// lifts it by exactly one page height until the bottom slice is visible.
pub fn page_offsets(image_h: f64, page_h: f64) -> Vec<f64> {
    if image_h <= 0.0 || page_h <= 0.0 {
        return vec![0.0];
    }

    let mut offsets = Vec::new();
    let mut shift = 0.0;
    let mut remaining = image_h;
    while remaining > 0.0 {
        offsets.push(page_h - image_h + shift);
        remaining -= page_h;
        shift += page_h;
    }
    offsets
}

/// Export file name for a given report date.
pub fn file_name(date: NaiveDate) -> String {
    format!("Brainalyze_Report_{}.pdf", date.format("%Y-%m-%d"))
}

/// Writes report PDFs into a fixed export directory.
pub struct PdfExporter {
    out_dir: PathBuf,
}

impl PdfExporter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    /// Exporter writing to the application's exports directory.
    pub fn default_location() -> Self {
        Self::new(crate::config::exports_dir())
    }

    /// Export the loaded report to disk.
    ///
    /// With no loaded report this is a silent no-op: nothing is written and
    /// no error is raised, mirroring the disabled download button. The
    /// heatmap bytes are optional; when present they must be a decodable
    /// PNG.
    pub fn export(
        &self,
        view: Option<&ReportView>,
        heatmap: Option<&[u8]>,
    ) -> Result<Option<PathBuf>, ExportError> {
        let Some(view) = view else {
            return Ok(None);
        };

        let date = view
            .generated_at
            .map(|ts| ts.date_naive())
            .unwrap_or_else(|| chrono::Utc::now().date_naive());
        let path = self.out_dir.join(file_name(date));

        let bytes = render_pdf(view, heatmap)?;

        fs::create_dir_all(&self.out_dir).map_err(|source| ExportError::Io {
            path: self.out_dir.clone(),
            source,
        })?;
        fs::write(&path, bytes).map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;

        tracing::info!(path = %path.display(), "report exported");
        Ok(Some(path))
    }
}

/// Fetch the Grad-CAM heatmap bytes. Best-effort: any failure is logged and
/// the export proceeds without the heatmap pages. The request is bounded so
/// a stalled host cannot hang the export.
pub fn fetch_heatmap(url: &str) -> Option<Vec<u8>> {
    let client = match reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(error = %e, "heatmap HTTP client construction failed");
            return None;
        }
    };
    let response = match client.get(url).send() {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, url, "heatmap fetch failed");
            return None;
        }
    };
    if !response.status().is_success() {
        tracing::warn!(status = %response.status(), url, "heatmap fetch returned non-success");
        return None;
    }
    match response.bytes() {
        Ok(bytes) => Some(bytes.to_vec()),
        Err(e) => {
            tracing::warn!(error = %e, url, "heatmap body read failed");
            None
        }
    }
}

/// Generates the report PDF. Returns PDF bytes.
fn render_pdf(view: &ReportView, heatmap: Option<&[u8]>) -> Result<Vec<u8>, ExportError> {
    let title = format!("Brainalyze Report - {}", view.patient_name);
    let (doc, page1, layer1) = PdfDocument::new(
        &title,
        Mm(PAGE_WIDTH_MM as f32),
        Mm(PAGE_HEIGHT_MM as f32),
        "Layer 1",
    );
    let layer = doc.get_page(page1).get_layer(layer1);
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ExportError::Pdf(format!("font error: {e}")))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ExportError::Pdf(format!("font error: {e}")))?;

    let mut y = Mm(280.0);

    // Header
    layer.use_text("BRAINALYZE MRI ANALYSIS REPORT", 14.0, Mm(20.0), y, &bold);
    y -= Mm(6.0);
    layer.use_text(
        format!("Patient: {}", view.patient_name),
        9.0,
        Mm(20.0),
        y,
        &font,
    );
    y -= Mm(4.5);
    layer.use_text(
        format!("Report date: {}", view.display_date()),
        9.0,
        Mm(20.0),
        y,
        &font,
    );
    y -= Mm(8.0);

    // Diagnosis
    layer.use_text("DIAGNOSIS:", 11.0, Mm(20.0), y, &bold);
    y -= Mm(6.0);
    let diagnosis = if view.tumor_detected {
        format!("  Tumor detected: {}", view.tumor_type)
    } else {
        "  No tumor detected".to_string()
    };
    layer.use_text(&diagnosis, 9.0, Mm(25.0), y, &font);
    y -= Mm(4.5);
    layer.use_text(
        format!(
            "  Confidence: {} ({})",
            view.confidence_display(),
            view.confidence_band().class_name(),
        ),
        9.0,
        Mm(25.0),
        y,
        &font,
    );
    y -= Mm(4.5);
    if let Some(severity) = &view.severity {
        layer.use_text(format!("  Severity: {severity}"), 9.0, Mm(25.0), y, &font);
        y -= Mm(4.5);
    }
    y -= Mm(4.0);

    // Tumor characteristics
    let characteristics = [
        ("Size", view.tumor_size.as_deref()),
        ("Location", view.tumor_location.as_deref()),
        ("Volume", view.tumor_volume.as_deref()),
    ];
    if characteristics.iter().any(|(_, v)| v.is_some()) {
        layer.use_text("TUMOR CHARACTERISTICS:", 11.0, Mm(20.0), y, &bold);
        y -= Mm(6.0);
        for (label, value) in characteristics {
            if let Some(value) = value {
                layer.use_text(format!("  {label}: {value}"), 9.0, Mm(25.0), y, &font);
                y -= Mm(4.5);
            }
        }
        y -= Mm(4.0);
    }

    // Description
    if let Some(description) = &view.description {
        layer.use_text("FINDINGS:", 11.0, Mm(20.0), y, &bold);
        y -= Mm(6.0);
        for line in wrap_text(description, 90) {
            layer.use_text(&line, 9.0, Mm(25.0), y, &font);
            y -= Mm(4.5);
        }
        y -= Mm(4.0);
    }

    // Recommendations
    if !view.recommendations.is_empty() {
        layer.use_text("RECOMMENDATIONS:", 11.0, Mm(20.0), y, &bold);
        y -= Mm(6.0);
        for (i, rec) in view.recommendations.iter().enumerate() {
            let text = format!("  {}. {}", i + 1, rec);
            for line in wrap_text(&text, 90) {
                layer.use_text(&line, 9.0, Mm(25.0), y, &font);
                y -= Mm(4.5);
            }
            y -= Mm(2.0);
        }
        y -= Mm(4.0);
    }

    // Analysis details
    layer.use_text("ANALYSIS DETAILS:", 11.0, Mm(20.0), y, &bold);
    y -= Mm(6.0);
    layer.use_text(format!("  Model: {}", view.ai_model), 9.0, Mm(25.0), y, &font);
    y -= Mm(4.5);
    if let Some(seconds) = view.processing_time {
        layer.use_text(
            format!("  Processing time: {seconds:.1}s"),
            9.0,
            Mm(25.0),
            y,
            &font,
        );
        y -= Mm(4.5);
    }
    if let Some(slices) = view.slices_analyzed {
        layer.use_text(format!("  Slices analyzed: {slices}"), 9.0, Mm(25.0), y, &font);
        y -= Mm(4.5);
    }

    // Disclaimer
    y -= Mm(8.0);
    layer.use_text(
        "This AI-generated report is for informational purposes only and does not",
        8.0,
        Mm(20.0),
        y,
        &font,
    );
    y -= Mm(4.0);
    layer.use_text(
        "replace a diagnosis by a qualified radiologist.",
        8.0,
        Mm(20.0),
        y,
        &font,
    );

    if let Some(bytes) = heatmap {
        add_heatmap_pages(&doc, bytes)?;
    }

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| ExportError::Pdf(format!("save error: {e}")))?;
    buf.into_inner()
        .map_err(|e| ExportError::Pdf(format!("buffer error: {e}")))
}

/// Appends the heatmap, scaled to the full page width and sliced across as
/// many pages as its height requires. Same image object on every page, only
/// the vertical translation changes.
fn add_heatmap_pages(doc: &PdfDocumentReference, bytes: &[u8]) -> Result<(), ExportError> {
    let decoder = PngDecoder::new(Cursor::new(bytes))
        .map_err(|e| ExportError::Heatmap(format!("PNG decode: {e}")))?;
    let image = Image::try_from(decoder)
        .map_err(|e| ExportError::Heatmap(format!("PNG decode: {e}")))?;
    let xobject = image.image;

    let width_px = xobject.width.0 as f64;
    let height_px = xobject.height.0 as f64;
    if width_px <= 0.0 || height_px <= 0.0 {
        return Err(ExportError::Heatmap("empty image".to_string()));
    }

    // Scale so the image spans the full page width; its rendered height in
    // mm then decides the page count.
    let dpi = width_px * 25.4 / PAGE_WIDTH_MM;
    let image_h_mm = height_px * 25.4 / dpi;

    // The slicing math stays f64; printpdf's Mm and dpi are f32, so the
    // narrowing happens only here at the boundary.
    for offset in page_offsets(image_h_mm, PAGE_HEIGHT_MM) {
        let (page, layer) =
            doc.add_page(Mm(PAGE_WIDTH_MM as f32), Mm(PAGE_HEIGHT_MM as f32), "Heatmap");
        let layer = doc.get_page(page).get_layer(layer);
        Image::from(xobject.clone()).add_to_layer(
            layer,
            ImageTransform {
                translate_x: Some(Mm(0.0)),
                translate_y: Some(Mm(offset as f32)),
                dpi: Some(dpi as f32),
                ..Default::default()
            },
        );
    }
    Ok(())
}

fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.len() + word.len() + 1 > max_chars && !current.is_empty() {
            lines.push(current.clone());
            current.clear();
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

//! Extraction result types

use crate::Confidence;

/// How the text of a single page was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    /// The embedded text layer was long enough
    TextLayer,
    /// The text layer was too sparse; OCR produced the text
    Ocr,
    /// The text layer was too sparse and OCR failed or timed out
    OcrFailed,
}

impl ExtractionMethod {
    /// Get the method name as stored in audit records
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::TextLayer => "text_layer",
            ExtractionMethod::Ocr => "ocr",
            ExtractionMethod::OcrFailed => "ocr_failed",
        }
    }
}

/// Text of one page
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    /// 1-based page number
    pub number: usize,
    /// Extracted text (may be empty)
    pub text: String,
    /// Method used for this page
    pub method: ExtractionMethod,
    /// Recognition confidence reported by OCR, if OCR ran
    pub ocr_confidence: Option<Confidence>,
}

/// Result of extracting a whole document
///
/// Lives only for the duration of one document's pipeline; the audit record
/// keeps a summary, never the text itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    /// Per-page text in page order
    pub pages: Vec<PageText>,
    /// Fraction of pages for which the embedded text layer sufficed
    pub confidence: Confidence,
}

impl ExtractionResult {
    /// Build a result, deriving the confidence from the page methods
    pub fn from_pages(pages: Vec<PageText>) -> Self {
        let confidence = if pages.is_empty() {
            Confidence::ZERO
        } else {
            let layered = pages
                .iter()
                .filter(|p| p.method == ExtractionMethod::TextLayer)
                .count();
            Confidence::clamped(layered as f64 / pages.len() as f64)
        };
        Self { pages, confidence }
    }

    /// Number of pages
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Number of pages that needed OCR (successful or not)
    pub fn ocr_page_count(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| p.method != ExtractionMethod::TextLayer)
            .count()
    }

    /// Concatenated text with blank lines between pages
    pub fn full_text(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Short method summary for audit records (`text_layer`, `ocr`, `mixed`, `none`)
    pub fn method_summary(&self) -> &'static str {
        let ocr = self.ocr_page_count();
        match (self.pages.len(), ocr) {
            (0, _) => "none",
            (_, 0) => "text_layer",
            (n, o) if n == o => "ocr",
            _ => "mixed",
        }
    }
}

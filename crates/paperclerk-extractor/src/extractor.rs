//! Core Text Extractor implementation

use crate::config::ExtractionConfig;
use crate::error::ExtractionError;
use crate::ocr::{text_quality, CommandOcr, DisabledOcr, EmbeddedImageSource, PageImageSource};
use crate::pdf::{PdfTextLayer, TextLayer};
use paperclerk_domain::traits::OcrEngine;
use paperclerk_domain::{Document, ExtractionMethod, ExtractionResult, PageText};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// The Text Extractor turns a document into per-page text
///
/// Each page keeps its text layer when the layer has at least
/// `min_text_chars_per_page` visible characters and an alphanumeric share of
/// at least `min_alnum_ratio`; other pages are sent to OCR, up to
/// `ocr_max_pages` per document. Both the text layer parse and every OCR call
/// run on the blocking pool under their own timeout.
pub struct TextExtractor {
    text_layer: Arc<dyn TextLayer + Send + Sync>,
    images: Arc<dyn PageImageSource + Send + Sync>,
    ocr: Arc<dyn OcrEngine + Send + Sync>,
    config: ExtractionConfig,
}

impl TextExtractor {
    /// Create an extractor from explicit collaborators
    pub fn new(
        text_layer: Arc<dyn TextLayer + Send + Sync>,
        images: Arc<dyn PageImageSource + Send + Sync>,
        ocr: Arc<dyn OcrEngine + Send + Sync>,
        config: ExtractionConfig,
    ) -> Self {
        Self {
            text_layer,
            images,
            ocr,
            config,
        }
    }

    /// Create the standard extractor for a configuration
    ///
    /// Uses the `pdf-extract` text layer, embedded page images, and the
    /// configured OCR command (or no OCR when disabled).
    pub fn from_config(config: ExtractionConfig) -> Self {
        let ocr: Arc<dyn OcrEngine + Send + Sync> = if config.ocr_enabled {
            Arc::new(CommandOcr::new(config.ocr_command.clone()))
        } else {
            Arc::new(DisabledOcr)
        };
        Self::new(
            Arc::new(PdfTextLayer),
            Arc::new(EmbeddedImageSource),
            ocr,
            config,
        )
    }

    /// Get the configuration
    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract the text of a document
    pub async fn extract(&self, document: &Document) -> Result<ExtractionResult, ExtractionError> {
        let bytes = Arc::new(tokio::fs::read(&document.source_path).await?);
        self.extract_bytes(&document.file_name(), bytes).await
    }

    /// Extract the text of an in-memory PDF
    pub async fn extract_bytes(
        &self,
        name: &str,
        pdf: Arc<Vec<u8>>,
    ) -> Result<ExtractionResult, ExtractionError> {
        let layer = Arc::clone(&self.text_layer);
        let bytes = Arc::clone(&pdf);
        let layer_texts = timeout(
            self.config.parse_timeout(),
            tokio::task::spawn_blocking(move || layer.page_texts(&bytes)),
        )
        .await
        .map_err(|_| ExtractionError::Timeout(self.config.parse_timeout_secs))?
        .map_err(|e| ExtractionError::Open(format!("Text layer task failed: {}", e)))??;

        let mut pages = Vec::with_capacity(layer_texts.len());
        let mut ocr_budget = self.config.ocr_max_pages;
        for (index, text) in layer_texts.into_iter().enumerate() {
            let page = if self.layer_is_usable(&text) {
                PageText {
                    number: index + 1,
                    text,
                    method: ExtractionMethod::TextLayer,
                    ocr_confidence: None,
                }
            } else if ocr_budget == 0 {
                debug!(document = name, page = index + 1, "OCR page limit reached");
                PageText {
                    number: index + 1,
                    text,
                    method: ExtractionMethod::OcrFailed,
                    ocr_confidence: None,
                }
            } else {
                ocr_budget -= 1;
                self.ocr_page(name, &pdf, index, text).await
            };
            pages.push(page);
        }

        let result = ExtractionResult::from_pages(pages);
        info!(
            document = name,
            pages = result.page_count(),
            ocr_pages = result.ocr_page_count(),
            confidence = %result.confidence,
            "Extracted text"
        );
        Ok(result)
    }

    fn layer_is_usable(&self, text: &str) -> bool {
        visible_chars(text) >= self.config.min_text_chars_per_page
            && text_quality(text).value() >= self.config.min_alnum_ratio
    }

    /// OCR one page; any failure keeps the sparse layer text
    async fn ocr_page(&self, name: &str, pdf: &Arc<Vec<u8>>, index: usize, layer_text: String) -> PageText {
        let number = index + 1;
        let failed = |text: String| PageText {
            number,
            text,
            method: ExtractionMethod::OcrFailed,
            ocr_confidence: None,
        };

        if !self.config.ocr_enabled {
            debug!(document = name, page = number, "Sparse text layer, OCR disabled");
            return failed(layer_text);
        }

        let images = Arc::clone(&self.images);
        let ocr = Arc::clone(&self.ocr);
        let bytes = Arc::clone(pdf);
        let task = tokio::task::spawn_blocking(move || {
            let image = images
                .page_image(&bytes, index)?
                .ok_or_else(|| "page has no embedded image".to_string())?;
            ocr.recognize(&image)
        });

        match timeout(self.config.ocr_timeout(), task).await {
            Ok(Ok(Ok(output))) => {
                debug!(
                    document = name,
                    page = number,
                    confidence = %output.confidence,
                    "OCR recognized page"
                );
                PageText {
                    number,
                    text: output.text,
                    method: ExtractionMethod::Ocr,
                    ocr_confidence: Some(output.confidence),
                }
            }
            Ok(Ok(Err(e))) => {
                warn!(document = name, page = number, error = %e, "OCR failed");
                failed(layer_text)
            }
            Ok(Err(e)) => {
                warn!(document = name, page = number, error = %e, "OCR task failed");
                failed(layer_text)
            }
            Err(_) => {
                warn!(
                    document = name,
                    page = number,
                    timeout_secs = self.config.ocr_timeout_secs,
                    "OCR timed out"
                );
                failed(layer_text)
            }
        }
    }
}

fn visible_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

//! Paperclerk Text Extractor
//!
//! Produces per-page text for a document, preferring the embedded text layer
//! and falling back to OCR page by page.
//!
//! # Overview
//!
//! ```text
//! PDF bytes → TextLayer → sparse page? → PageImageSource → OcrEngine
//! ```
//!
//! Extraction confidence is the fraction of pages whose text layer sufficed.
//! OCR problems (engine missing, no page image, timeout) never fail the
//! document; they mark the page `ocr_failed`. Only an unreadable or
//! encrypted file is an [`ExtractionError`].
//!
//! # Example Usage
//!
//! ```no_run
//! use paperclerk_extractor::{ExtractionConfig, TextExtractor};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let extractor = TextExtractor::from_config(ExtractionConfig::default());
//! let bytes = std::fs::read("inbox/scan.pdf")?;
//! let result = extractor.extract_bytes("scan.pdf", Arc::new(bytes)).await?;
//!
//! println!("{} pages, confidence {}", result.page_count(), result.confidence);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod extractor;
pub mod ocr;
pub mod pdf;

pub use config::{ExtractionConfig, IMAGE_PLACEHOLDER};
pub use error::ExtractionError;
pub use extractor::TextExtractor;
pub use ocr::{CommandOcr, DisabledOcr, EmbeddedImageSource, PageImageSource};
pub use pdf::{pdf_info_date, PdfTextLayer, TextLayer};

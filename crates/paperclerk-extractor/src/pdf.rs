//! PDF container access: text layer and Info dictionary
//!
//! Page text comes from `pdf-extract`; opening, encryption detection, page
//! counting and metadata go through `lopdf` directly.

use crate::error::ExtractionError;
use chrono::NaiveDate;
use lopdf::{Document as PdfDocument, Object};
use tracing::{debug, warn};

/// Source of the embedded text layer, one string per page
pub trait TextLayer {
    /// Text layer of every page, in page order
    ///
    /// The returned vector has one entry per page; pages without a layer are
    /// empty strings. Fails only when the document cannot be opened.
    fn page_texts(&self, pdf: &[u8]) -> Result<Vec<String>, ExtractionError>;
}

/// Text layer backed by `pdf-extract`
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextLayer;

impl TextLayer for PdfTextLayer {
    fn page_texts(&self, pdf: &[u8]) -> Result<Vec<String>, ExtractionError> {
        let doc = load_document(pdf)?;
        let page_count = doc.get_pages().len();

        // pdf-extract (and its font parsers) can panic on malformed glyph data
        let extracted = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(pdf)
        }));

        let mut texts = match extracted {
            Ok(Ok(texts)) => texts,
            Ok(Err(e)) => {
                warn!(error = %e, "Text layer unreadable, every page falls back to OCR");
                Vec::new()
            }
            Err(_) => {
                warn!("Text layer parser panicked, every page falls back to OCR");
                Vec::new()
            }
        };

        texts.resize(page_count, String::new());
        debug!(pages = page_count, "Read text layer");
        Ok(texts)
    }
}

/// Parse a PDF, rejecting encrypted documents
pub fn load_document(pdf: &[u8]) -> Result<PdfDocument, ExtractionError> {
    match PdfDocument::load_mem(pdf) {
        Ok(doc) => {
            if doc.trailer.get(b"Encrypt").is_ok() {
                return Err(ExtractionError::Encrypted);
            }
            Ok(doc)
        }
        // A failed load of a file carrying an Encrypt entry is an encryption
        // problem, not a corrupt file
        Err(_) if contains_token(pdf, b"/Encrypt") => Err(ExtractionError::Encrypted),
        Err(e) => Err(ExtractionError::Open(e.to_string())),
    }
}

fn contains_token(haystack: &[u8], token: &[u8]) -> bool {
    haystack.windows(token.len()).any(|w| w == token)
}

/// Date from the PDF Info dictionary (`CreationDate`, then `ModDate`)
///
/// Returns `None` for unreadable documents, a missing Info dictionary or
/// dates that are not of the form `D:YYYYMMDD...`.
pub fn pdf_info_date(pdf: &[u8]) -> Option<NaiveDate> {
    let doc = PdfDocument::load_mem(pdf).ok()?;

    let info = match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let Object::Dictionary(info) = info else {
        return None;
    };

    [b"CreationDate".as_slice(), b"ModDate".as_slice()]
        .into_iter()
        .find_map(|key| match info.get(key).ok()? {
            Object::String(bytes, _) => parse_pdf_date(&String::from_utf8_lossy(bytes)),
            _ => None,
        })
}

/// Parse the date part of a PDF date string (`D:20240302120000+01'00'`)
pub fn parse_pdf_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let digits = value.strip_prefix("D:").unwrap_or(value);
    if digits.len() < 8 || !digits.as_bytes()[..8].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let year = digits[0..4].parse().ok()?;
    let month = digits[4..6].parse().ok()?;
    let day = digits[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_text_layer_one_entry_per_page() {
        let pdf = pdf_with_pages(&[Some("Invoice number seventeen"), None, Some("Page three")]);
        let texts = PdfTextLayer.page_texts(&pdf).unwrap();

        assert_eq!(texts.len(), 3);
        assert!(texts[0].contains("Invoice"));
        assert!(texts[1].trim().is_empty());
    }

    #[test]
    fn test_garbage_is_open_error() {
        let result = PdfTextLayer.page_texts(b"definitely not a pdf");
        assert!(matches!(result, Err(ExtractionError::Open(_))));
    }

    #[test]
    fn test_encrypted_is_rejected() {
        let result = PdfTextLayer.page_texts(&encrypted_pdf());
        assert!(matches!(result, Err(ExtractionError::Encrypted)));
    }

    #[test]
    fn test_parse_pdf_date() {
        assert_eq!(
            parse_pdf_date("D:20240302120000+01'00'"),
            NaiveDate::from_ymd_opt(2024, 3, 2)
        );
        assert_eq!(parse_pdf_date("20231231"), NaiveDate::from_ymd_opt(2023, 12, 31));
        assert_eq!(parse_pdf_date("D:2024"), None);
        assert_eq!(parse_pdf_date("D:20241340"), None);
        assert_eq!(parse_pdf_date(""), None);
    }

    #[test]
    fn test_pdf_info_date() {
        let pdf = pdf_with_creation_date("D:20240302093000Z");
        assert_eq!(pdf_info_date(&pdf), NaiveDate::from_ymd_opt(2024, 3, 2));

        let without = pdf_with_pages(&[Some("x")]);
        assert_eq!(pdf_info_date(&without), None);
        assert_eq!(pdf_info_date(b"junk"), None);
    }
}

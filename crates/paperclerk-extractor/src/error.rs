//! Error types for the Text Extractor

use thiserror::Error;

/// Errors that end extraction of a whole document
///
/// None of these are retried. The pipeline routes the document to the
/// unclear folder without classifying it.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The file is not a readable PDF
    #[error("Cannot open document: {0}")]
    Open(String),

    /// The PDF is encrypted
    #[error("Document is encrypted")]
    Encrypted,

    /// Reading the file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing the text layer took longer than the configured limit
    #[error("Text layer extraction timed out after {0}s")]
    Timeout(u64),
}

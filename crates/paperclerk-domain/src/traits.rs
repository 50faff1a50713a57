//! Trait definitions for external collaborators
//!
//! These traits define the boundaries between the filing pipeline and its
//! collaborators. Implementations live in other crates.

use crate::{AuditRecord, Confidence, DocumentId, RunId, RunSummary};

/// Trait for the classification model backend
///
/// Implemented by the infrastructure layer (paperclerk-llm)
pub trait ModelBackend {
    /// Error type for model calls (transport failures, missing models)
    type Error;

    /// Run a prompt against the given model and return its raw response
    ///
    /// The model identifier is opaque: it comes from configuration and is
    /// passed through unchanged.
    fn infer(&self, model: &str, prompt: &str) -> Result<String, Self::Error>;
}

/// Output of recognizing one page image
#[derive(Debug, Clone, PartialEq)]
pub struct OcrOutput {
    /// Recognized text (possibly empty)
    pub text: String,
    /// Recognition confidence
    pub confidence: Confidence,
}

/// Trait for the OCR engine
///
/// Low-quality recognition is reported through a low confidence, not an
/// error. Errors are reserved for an engine that could not run at all.
pub trait OcrEngine {
    /// Recognize the text of a page image
    fn recognize(&self, page_image: &[u8]) -> Result<OcrOutput, String>;
}

/// Trait for the append-only audit store
///
/// Implemented by the infrastructure layer (paperclerk-store)
pub trait AuditStore {
    /// Error type for store operations
    type Error;

    /// Durably append a record; records are never updated afterwards
    fn append(&mut self, record: &AuditRecord) -> Result<(), Self::Error>;

    /// Latest record for a document of a run (the one no other record supersedes)
    fn get(&self, run_id: RunId, document_id: DocumentId)
        -> Result<Option<AuditRecord>, Self::Error>;

    /// Every record for a document of a run, oldest first
    fn history(&self, run_id: RunId, document_id: DocumentId)
        -> Result<Vec<AuditRecord>, Self::Error>;

    /// Every record of a run, oldest first
    fn records_for_run(&self, run_id: RunId) -> Result<Vec<AuditRecord>, Self::Error>;

    /// Most recent records that routed to the unclear folder, newest first
    fn unclear_records(&self, limit: usize) -> Result<Vec<AuditRecord>, Self::Error>;

    /// Append the summary of a completed run
    fn append_run(&mut self, summary: &RunSummary) -> Result<(), Self::Error>;

    /// Most recent run summaries, newest first
    fn runs(&self, limit: usize) -> Result<Vec<RunSummary>, Self::Error>;
}

//! Paperclerk Domain Layer
//!
//! This crate contains the value types shared by every stage of the filing
//! pipeline and the trait interfaces for its external collaborators. It does
//! no I/O; infrastructure lives in the other crates.
//!
//! ## Key Concepts
//!
//! - **Document**: one file discovered in the inbox, immutable once scanned
//! - **ExtractionResult**: per-page text plus how each page was obtained
//! - **ClassificationAttempt / ClassificationDecision**: staged model output
//! - **ResolvedTarget**: the canonical destination folder and filename
//! - **AuditRecord**: the immutable, pre-mutation log entry for a document
//!
//! ## Architecture
//!
//! ```text
//! Document → Extractor → Classifier → Resolver → Recorder → Executor
//! ```
//!
//! Collaborators (OCR engine, model backend, audit store) are reached only
//! through the traits in [`traits`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod audit;
pub mod classification;
pub mod confidence;
pub mod document;
pub mod extraction;
mod id;
pub mod target;
pub mod traits;

// Re-exports for convenience
pub use audit::{current_timestamp, AuditRecord, ExtractionSummary, RecordId, RunId, RunMode, RunSummary};
pub use classification::{
    ClassificationAttempt, ClassificationDecision, Label, Stage, StageFailure, UnclearReason,
};
pub use confidence::Confidence;
pub use document::{DateSource, Document, DocumentDate, DocumentId};
pub use extraction::{ExtractionMethod, ExtractionResult, PageText};
pub use target::ResolvedTarget;

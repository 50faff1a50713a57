//! Audit records - the immutable, pre-mutation log of every filing decision

use crate::{ClassificationDecision, DocumentDate, ResolvedTarget};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

pub use crate::id::{RecordId, RunId};

/// Execution mode of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunMode {
    /// Records decisions and moves files
    Normal,
    /// Records decisions, never touches the inbox or archive
    DryRun,
}

impl RunMode {
    /// Get the mode name as stored in audit records
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Normal => "normal",
            RunMode::DryRun => "dry_run",
        }
    }

    /// Parse a stored mode name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(RunMode::Normal),
            "dry_run" => Some(RunMode::DryRun),
            _ => None,
        }
    }

    /// Whether this mode mutates the filesystem
    pub fn executes(&self) -> bool {
        matches!(self, RunMode::Normal)
    }
}

/// What the audit trail keeps of an extraction (never the text itself)
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionSummary {
    /// `text_layer`, `ocr`, `mixed` or `none`
    pub method: String,
    /// Total pages
    pub pages: usize,
    /// Pages that needed OCR
    pub ocr_pages: usize,
    /// Fraction of pages served by the text layer
    pub confidence: f64,
    /// Characters of extracted text
    pub char_count: usize,
}

/// An immutable audit record
///
/// Written before the filesystem is touched. Never updated: later information
/// about the same document (a re-resolution, a failed move) is a new record
/// pointing back through `supersedes`.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    /// Record identifier
    pub id: RecordId,
    /// Run the record belongs to
    pub run_id: RunId,
    /// Document the record describes
    pub document_id: crate::DocumentId,
    /// Inbox path at decision time
    pub source_path: PathBuf,
    /// Content fingerprint of the document
    pub fingerprint: String,
    /// Metadata date used for naming, if any
    pub date: Option<DocumentDate>,
    /// Extraction summary, `None` when extraction failed
    pub extraction: Option<ExtractionSummary>,
    /// Full classification decision with every attempt and failure
    pub decision: ClassificationDecision,
    /// Resolved destination, `None` when resolution failed
    pub target: Option<ResolvedTarget>,
    /// Mode of the run that produced the record
    pub mode: RunMode,
    /// Error that ended the document's pipeline, if any
    pub error: Option<String>,
    /// Earlier record of the same document this one supersedes
    pub supersedes: Option<RecordId>,
    /// Creation time (seconds since Unix epoch)
    pub created_at: u64,
}

impl AuditRecord {
    /// Whether the record describes a dry-run decision
    pub fn is_dry_run(&self) -> bool {
        self.mode == RunMode::DryRun
    }
}

/// Aggregate bookkeeping for one run, appended when the run completes
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Run identifier
    pub run_id: RunId,
    /// Mode of the run
    pub mode: RunMode,
    /// Start time (seconds since Unix epoch)
    pub started_at: u64,
    /// End time (seconds since Unix epoch)
    pub finished_at: u64,
    /// Documents seen
    pub total: usize,
    /// Documents filed into a named folder
    pub filed: usize,
    /// Documents filed into the unclear folder
    pub unclear: usize,
    /// Documents left in the inbox after an error
    pub failed: usize,
}

/// Current timestamp in seconds since Unix epoch
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

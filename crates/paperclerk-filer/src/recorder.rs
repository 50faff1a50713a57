//! Decision Recorder: append the audit record before anything moves

use crate::error::FilingError;
use once_cell::sync::Lazy;
use paperclerk_domain::traits::AuditStore;
use paperclerk_domain::{
    current_timestamp, AuditRecord, ClassificationAttempt, ClassificationDecision, Document,
    ExtractionResult, ExtractionSummary, RecordId, ResolvedTarget, RunId, RunMode, RunSummary,
    StageFailure,
};
use regex::Regex;
use std::sync::{Arc, Mutex};
use tracing::debug;

static IBAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z]{2}\d{2}[A-Z0-9]{11,30}\b").expect("valid IBAN pattern"));

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}").expect("valid e-mail pattern")
});

/// Replace IBANs and e-mail addresses in `text`
pub fn redact(text: &str) -> String {
    let without_ibans = IBAN.replace_all(text, "[REDACTED_IBAN]");
    EMAIL
        .replace_all(&without_ibans, "[REDACTED_EMAIL]")
        .into_owned()
}

/// Everything known about one document at the moment it is recorded
#[derive(Debug, Clone, Copy)]
pub struct RecordRequest<'a> {
    /// Run the document belongs to
    pub run_id: RunId,
    /// The document
    pub document: &'a Document,
    /// Extraction outcome, absent when extraction failed
    pub extraction: Option<&'a ExtractionResult>,
    /// Classification outcome
    pub decision: &'a ClassificationDecision,
    /// Resolved destination, absent when resolution failed
    pub target: Option<&'a ResolvedTarget>,
    /// Normal or dry run
    pub mode: RunMode,
    /// Error that stopped the document, if any
    pub error: Option<&'a str>,
    /// Record this one replaces
    pub supersedes: Option<RecordId>,
}

/// Writes audit records through a shared store
pub struct DecisionRecorder<S: AuditStore> {
    store: Arc<Mutex<S>>,
}

impl<S: AuditStore> Clone for DecisionRecorder<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> DecisionRecorder<S>
where
    S: AuditStore,
    S::Error: std::fmt::Display,
{
    /// Create a recorder owning `store`
    pub fn new(store: S) -> Self {
        Self::with_shared_store(Arc::new(Mutex::new(store)))
    }

    /// Create a recorder over a store shared with readers
    pub fn with_shared_store(store: Arc<Mutex<S>>) -> Self {
        Self { store }
    }

    /// The shared store
    pub fn store(&self) -> Arc<Mutex<S>> {
        Arc::clone(&self.store)
    }

    /// Build and durably append the audit record for `request`
    ///
    /// Model payloads and excerpts are redacted before they are stored.
    pub fn record(&self, request: RecordRequest<'_>) -> Result<AuditRecord, FilingError> {
        let record = AuditRecord {
            id: RecordId::new(),
            run_id: request.run_id,
            document_id: request.document.id,
            source_path: request.document.source_path.clone(),
            fingerprint: request.document.fingerprint.clone(),
            date: request.document.date,
            extraction: request.extraction.map(summarize),
            decision: redacted_decision(request.decision),
            target: request.target.cloned(),
            mode: request.mode,
            error: request.error.map(str::to_string),
            supersedes: request.supersedes,
            created_at: current_timestamp(),
        };

        let mut store = self
            .store
            .lock()
            .map_err(|e| FilingError::Audit(format!("Store lock error: {}", e)))?;
        store
            .append(&record)
            .map_err(|e| FilingError::Audit(e.to_string()))?;

        debug!(
            record = %record.id,
            run_id = %record.run_id,
            document = %request.document.file_name(),
            "Audit record appended"
        );
        Ok(record)
    }

    /// Append the summary of a finished run
    pub fn record_run(&self, summary: &RunSummary) -> Result<(), FilingError> {
        let mut store = self
            .store
            .lock()
            .map_err(|e| FilingError::Audit(format!("Store lock error: {}", e)))?;
        store
            .append_run(summary)
            .map_err(|e| FilingError::Audit(e.to_string()))
    }
}

fn summarize(extraction: &ExtractionResult) -> ExtractionSummary {
    ExtractionSummary {
        method: extraction.method_summary().to_string(),
        pages: extraction.page_count(),
        ocr_pages: extraction.ocr_page_count(),
        confidence: extraction.confidence.value(),
        char_count: extraction.pages.iter().map(|p| p.text.chars().count()).sum(),
    }
}

fn redacted_decision(decision: &ClassificationDecision) -> ClassificationDecision {
    ClassificationDecision {
        attempts: decision
            .attempts
            .iter()
            .map(|attempt| ClassificationAttempt {
                excerpt: redact(&attempt.excerpt),
                raw_response: redact(&attempt.raw_response),
                ..attempt.clone()
            })
            .collect(),
        failures: decision
            .failures
            .iter()
            .map(|failure| StageFailure {
                raw_response: failure.raw_response.as_deref().map(redact),
                ..failure.clone()
            })
            .collect(),
        ..decision.clone()
    }
}

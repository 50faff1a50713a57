//! Run report

use paperclerk_domain::{
    current_timestamp, Confidence, DocumentId, RecordId, RunId, RunMode, RunSummary, Stage,
};
use serde::Serialize;
use std::path::PathBuf;

/// What happened to one document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DocumentOutcome {
    /// Filed (or, in a dry run, planned) under a named folder
    Filed {
        /// Destination path
        destination: PathBuf,
    },
    /// Filed (or planned) under the unclear folder
    Unclear {
        /// Destination path
        destination: PathBuf,
        /// Why the document is unclear
        reason: String,
    },
    /// Left in the inbox
    Failed {
        /// What went wrong
        reason: String,
    },
}

/// Report line for one document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentReport {
    /// Inbox path
    pub source_path: PathBuf,
    /// Document identifier, absent if nothing was recorded for the file
    #[serde(serialize_with = "serialize_opt_display")]
    pub document_id: Option<DocumentId>,
    /// Outcome
    pub outcome: DocumentOutcome,
    /// Highest classification stage that produced an attempt
    #[serde(serialize_with = "serialize_opt_stage")]
    pub stage: Option<Stage>,
    /// Final classification confidence
    #[serde(serialize_with = "serialize_confidence")]
    pub confidence: Confidence,
    /// Audit records written for the document, oldest first
    #[serde(serialize_with = "serialize_display_seq")]
    pub records: Vec<RecordId>,
}

impl DocumentReport {
    pub(crate) fn failed(source_path: PathBuf, reason: String) -> Self {
        Self {
            source_path,
            document_id: None,
            outcome: DocumentOutcome::Failed { reason },
            stage: None,
            confidence: Confidence::ZERO,
            records: Vec::new(),
        }
    }
}

/// Aggregate result of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// Run identifier
    #[serde(serialize_with = "serialize_display")]
    pub run_id: RunId,
    /// Normal or dry run
    #[serde(serialize_with = "serialize_mode")]
    pub mode: RunMode,
    /// Start time (Unix seconds)
    pub started_at: u64,
    /// End time (Unix seconds)
    pub finished_at: u64,
    /// One entry per inbox document, in inbox order
    pub documents: Vec<DocumentReport>,
}

impl RunReport {
    pub(crate) fn finish(
        run_id: RunId,
        mode: RunMode,
        started_at: u64,
        documents: Vec<DocumentReport>,
    ) -> Self {
        Self {
            run_id,
            mode,
            started_at,
            finished_at: current_timestamp(),
            documents,
        }
    }

    /// Documents filed under a named folder
    pub fn filed(&self) -> usize {
        self.count(|o| matches!(o, DocumentOutcome::Filed { .. }))
    }

    /// Documents filed under the unclear folder
    pub fn unclear(&self) -> usize {
        self.count(|o| matches!(o, DocumentOutcome::Unclear { .. }))
    }

    /// Documents left in the inbox
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, DocumentOutcome::Failed { .. }))
    }

    /// Every audit record written during the run
    pub fn record_ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.documents.iter().flat_map(|d| d.records.iter().copied())
    }

    /// Summary row for the audit store
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            mode: self.mode,
            started_at: self.started_at,
            finished_at: self.finished_at,
            total: self.documents.len(),
            filed: self.filed(),
            unclear: self.unclear(),
            failed: self.failed(),
        }
    }

    fn count(&self, pred: impl Fn(&DocumentOutcome) -> bool) -> usize {
        self.documents.iter().filter(|d| pred(&d.outcome)).count()
    }
}

fn serialize_display<T: std::fmt::Display, S: serde::Serializer>(
    value: &T,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

fn serialize_opt_display<T: std::fmt::Display, S: serde::Serializer>(
    value: &Option<T>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => serializer.collect_str(v),
        None => serializer.serialize_none(),
    }
}

fn serialize_display_seq<T: std::fmt::Display, S: serde::Serializer>(
    values: &[T],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(values.iter().map(|v| v.to_string()))
}

fn serialize_opt_stage<S: serde::Serializer>(
    stage: &Option<Stage>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match stage {
        Some(stage) => serializer.serialize_u8(stage.number()),
        None => serializer.serialize_none(),
    }
}

fn serialize_confidence<S: serde::Serializer>(
    confidence: &Confidence,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(confidence.value())
}

fn serialize_mode<S: serde::Serializer>(mode: &RunMode, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(mode.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(outcome: DocumentOutcome, records: usize) -> DocumentReport {
        DocumentReport {
            source_path: PathBuf::from("/inbox/a.pdf"),
            document_id: Some(DocumentId::new()),
            outcome,
            stage: Some(Stage::Cheap),
            confidence: Confidence::clamped(0.9),
            records: (0..records).map(|_| RecordId::new()).collect(),
        }
    }

    #[test]
    fn test_counts_and_summary() {
        let report = RunReport::finish(
            RunId::new(),
            RunMode::DryRun,
            100,
            vec![
                line(DocumentOutcome::Filed { destination: PathBuf::from("/a/X/1.pdf") }, 1),
                line(
                    DocumentOutcome::Unclear {
                        destination: PathBuf::from("/a/_Unclear/1.pdf"),
                        reason: "low".to_string(),
                    },
                    2,
                ),
                DocumentReport::failed(PathBuf::from("/inbox/c.pdf"), "unreadable".to_string()),
            ],
        );

        let summary = report.summary();
        assert_eq!((summary.total, summary.filed, summary.unclear, summary.failed), (3, 1, 1, 1));
        assert_eq!(summary.mode, RunMode::DryRun);
        assert_eq!(report.record_ids().count(), 3);
    }

    #[test]
    fn test_report_serializes_to_json() {
        let report = RunReport::finish(
            RunId::new(),
            RunMode::Normal,
            1,
            vec![line(DocumentOutcome::Filed { destination: PathBuf::from("/a/X/1.pdf") }, 1)],
        );
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["mode"], "normal");
        assert_eq!(json["run_id"], report.run_id.to_string());
        assert_eq!(json["documents"][0]["outcome"]["outcome"], "filed");
        assert_eq!(json["documents"][0]["outcome"]["destination"], "/a/X/1.pdf");
        assert_eq!(json["documents"][0]["stage"], 1);
        assert_eq!(json["documents"][0]["confidence"], 0.9);
    }
}

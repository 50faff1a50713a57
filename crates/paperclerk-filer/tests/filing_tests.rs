//! Resolve, record and file against a real directory and audit store

use chrono::NaiveDate;
use paperclerk_domain::traits::AuditStore;
use paperclerk_domain::{
    ClassificationAttempt, ClassificationDecision, Confidence, DateSource, Document,
    DocumentDate, DocumentId, Label, RunId, RunMode, Stage,
};
use paperclerk_filer::{
    DecisionRecorder, FilingExecutor, FsArchiveView, NamingConfig, PathResolver, RecordRequest,
    SenderMapping,
};
use paperclerk_store::SqliteAuditStore;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn inbox_document(inbox: &Path, name: &str) -> Document {
    let path = inbox.join(name);
    fs::write(&path, format!("%PDF-1.4 {}", name)).unwrap();
    Document {
        id: DocumentId::new(),
        size_bytes: fs::metadata(&path).unwrap().len(),
        source_path: path,
        fingerprint: name.to_string(),
        date: Some(DocumentDate {
            date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            source: DateSource::Created,
        }),
    }
}

fn invoices() -> ClassificationDecision {
    ClassificationDecision {
        label: Label::Named("Invoices".to_string()),
        confidence: Confidence::clamped(0.92),
        attempts: vec![ClassificationAttempt {
            stage: Stage::Cheap,
            model: "small".to_string(),
            excerpt: "Rechnung".to_string(),
            raw_response: r#"{"label": "Invoices", "confidence": 0.92}"#.to_string(),
            label: "Invoices".to_string(),
            confidence: Confidence::clamped(0.92),
        }],
        failures: Vec::new(),
        unclear_reason: None,
    }
}

#[test]
fn test_record_reconstructs_filed_path() {
    let dir = TempDir::new().unwrap();
    let inbox = dir.path().join("inbox");
    let archive = dir.path().join("archive");
    fs::create_dir_all(archive.join("Invoices")).unwrap();
    fs::create_dir(&inbox).unwrap();
    fs::write(archive.join("Invoices/2024-03-02.pdf"), b"old").unwrap();
    fs::write(archive.join("Invoices/2024-03-02_1.pdf"), b"old").unwrap();

    let resolver = PathResolver::new(&archive, NamingConfig::default(), SenderMapping::default());
    let recorder = DecisionRecorder::new(SqliteAuditStore::new(dir.path().join("audit.db")).unwrap());
    let run_id = RunId::new();
    let document = inbox_document(&inbox, "scan.pdf");
    let decision = invoices();

    let target = resolver.resolve(&document, &decision, &FsArchiveView).unwrap();
    assert_eq!(target.file_name, "2024-03-02_2.pdf");

    let record = recorder
        .record(RecordRequest {
            run_id,
            document: &document,
            extraction: None,
            decision: &decision,
            target: Some(&target),
            mode: RunMode::Normal,
            error: None,
            supersedes: None,
        })
        .unwrap();
    FilingExecutor::new()
        .file(&document, &target, RunMode::Normal)
        .unwrap();

    let stored = recorder
        .store()
        .lock()
        .unwrap()
        .get(run_id, document.id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.id, record.id);
    let filed = stored.target.unwrap().path();
    assert_eq!(filed, archive.join("Invoices/2024-03-02_2.pdf"));
    assert!(filed.exists());
    assert!(!document.source_path.exists());
}

#[test]
fn test_dry_run_records_same_target_without_moving() {
    let dir = TempDir::new().unwrap();
    let inbox = dir.path().join("inbox");
    let archive = dir.path().join("archive");
    fs::create_dir(&inbox).unwrap();

    let resolver = PathResolver::new(&archive, NamingConfig::default(), SenderMapping::default());
    let recorder = DecisionRecorder::new(SqliteAuditStore::new(":memory:").unwrap());
    let document = inbox_document(&inbox, "scan.pdf");
    let decision = invoices();

    let target = resolver.resolve(&document, &decision, &FsArchiveView).unwrap();
    let record = recorder
        .record(RecordRequest {
            run_id: RunId::new(),
            document: &document,
            extraction: None,
            decision: &decision,
            target: Some(&target),
            mode: RunMode::DryRun,
            error: None,
            supersedes: None,
        })
        .unwrap();
    let outcome = FilingExecutor::new()
        .file(&document, &target, RunMode::DryRun)
        .unwrap();

    assert!(record.is_dry_run());
    assert_eq!(outcome.destination(), archive.join("Invoices/2024-03-02.pdf"));
    assert!(document.source_path.exists());
    assert!(!archive.exists());
}

#[test]
fn test_existing_folders_listing() {
    let dir = TempDir::new().unwrap();
    for name in ["Steuern", ".git", "Energie"] {
        fs::create_dir(dir.path().join(name)).unwrap();
    }
    fs::write(dir.path().join("loose.pdf"), b"x").unwrap();

    assert_eq!(
        FsArchiveView::folders(dir.path()).unwrap(),
        vec!["Energie".to_string(), "Steuern".to_string()]
    );
}

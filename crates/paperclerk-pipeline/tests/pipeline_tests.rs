//! End-to-end runs over a temporary inbox and archive

use chrono::{Local, TimeZone};
use filetime::FileTime;
use paperclerk_classifier::{ClassifierConfig, StagedClassifier};
use paperclerk_domain::traits::{AuditStore, OcrEngine, OcrOutput};
use paperclerk_domain::{
    AuditRecord, Confidence, DateSource, DocumentId, RunId, RunMode, RunSummary, UnclearReason,
};
use paperclerk_extractor::{ExtractionConfig, ExtractionError, PageImageSource, TextExtractor, TextLayer};
use paperclerk_filer::{
    ArchiveView, DecisionRecorder, FsArchiveView, NamingConfig, PathResolver, SenderMapping,
};
use paperclerk_llm::MockBackend;
use paperclerk_pipeline::{scan_inbox, DocumentOutcome, Pipeline};
use paperclerk_store::SqliteAuditStore;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

const INVOICE_TEXT: &str =
    "Stadtwerke Musterstadt, Rechnung Nr. 4711 fuer den Abrechnungszeitraum Februar, Betrag 42,00 EUR";

/// Treats the file bytes as the single page's text layer
struct PlainTextLayer;

impl TextLayer for PlainTextLayer {
    fn page_texts(&self, pdf: &[u8]) -> Result<Vec<String>, ExtractionError> {
        if pdf.starts_with(b"ENCRYPTED") {
            return Err(ExtractionError::Encrypted);
        }
        Ok(vec![String::from_utf8_lossy(pdf).into_owned()])
    }
}

struct NoImages;

impl PageImageSource for NoImages {
    fn page_image(&self, _pdf: &[u8], _page_index: usize) -> Result<Option<Vec<u8>>, String> {
        Ok(None)
    }
}

struct NoOcr;

impl OcrEngine for NoOcr {
    fn recognize(&self, _page_image: &[u8]) -> Result<OcrOutput, String> {
        Ok(OcrOutput {
            text: String::new(),
            confidence: Confidence::ZERO,
        })
    }
}

/// Archive view that misses one existing file the first time it is asked
struct StaleOnce {
    path: PathBuf,
    asked: AtomicBool,
}

impl ArchiveView for StaleOnce {
    fn folder_exists(&self, folder: &Path) -> bool {
        FsArchiveView.folder_exists(folder)
    }

    fn is_taken(&self, path: &Path) -> bool {
        if path == self.path && !self.asked.swap(true, Ordering::SeqCst) {
            return false;
        }
        FsArchiveView.is_taken(path)
    }
}

/// Archive view that never sees any file
struct Blind;

impl ArchiveView for Blind {
    fn folder_exists(&self, folder: &Path) -> bool {
        FsArchiveView.folder_exists(folder)
    }

    fn is_taken(&self, _path: &Path) -> bool {
        false
    }
}

/// Store that refuses every record of one inbox file
struct RefusingStore {
    inner: SqliteAuditStore,
    refused: &'static str,
}

impl AuditStore for RefusingStore {
    type Error = String;

    fn append(&mut self, record: &AuditRecord) -> Result<(), String> {
        if record.source_path.ends_with(self.refused) {
            return Err("disk full".to_string());
        }
        self.inner.append(record).map_err(|e| e.to_string())
    }

    fn get(&self, run_id: RunId, document_id: DocumentId) -> Result<Option<AuditRecord>, String> {
        self.inner.get(run_id, document_id).map_err(|e| e.to_string())
    }

    fn history(&self, run_id: RunId, document_id: DocumentId) -> Result<Vec<AuditRecord>, String> {
        self.inner.history(run_id, document_id).map_err(|e| e.to_string())
    }

    fn records_for_run(&self, run_id: RunId) -> Result<Vec<AuditRecord>, String> {
        self.inner.records_for_run(run_id).map_err(|e| e.to_string())
    }

    fn unclear_records(&self, limit: usize) -> Result<Vec<AuditRecord>, String> {
        self.inner.unclear_records(limit).map_err(|e| e.to_string())
    }

    fn append_run(&mut self, summary: &RunSummary) -> Result<(), String> {
        self.inner.append_run(summary).map_err(|e| e.to_string())
    }

    fn runs(&self, limit: usize) -> Result<Vec<RunSummary>, String> {
        self.inner.runs(limit).map_err(|e| e.to_string())
    }
}

struct Fixture {
    dir: TempDir,
    backend: MockBackend,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("inbox")).unwrap();
        Self {
            dir,
            backend: MockBackend::default(),
        }
    }

    fn inbox(&self) -> PathBuf {
        self.dir.path().join("inbox")
    }

    fn archive(&self) -> PathBuf {
        self.dir.path().join("Archive")
    }

    fn stage1(&mut self, response: &str) {
        let model = ClassifierConfig::default().stage1_model;
        self.backend.add_response(model, response);
    }

    fn stage2(&mut self, response: &str) {
        let model = ClassifierConfig::default().stage2_model;
        self.backend.add_response(model, response);
    }

    /// Drop a document into the inbox, modified on 2024-03-02
    fn drop_document(&self, name: &str, content: &str) -> PathBuf {
        let path = self.inbox().join(name);
        fs::write(&path, content).unwrap();
        let noon = Local.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();
        filetime::set_file_mtime(&path, FileTime::from_unix_time(noon.timestamp(), 0)).unwrap();
        path
    }

    fn archive_file(&self, relative: &str) {
        let path = self.archive().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"already filed").unwrap();
    }

    fn pipeline(&self, workers: usize) -> Pipeline<MockBackend, SqliteAuditStore> {
        self.pipeline_with(NamingConfig::default(), workers)
    }

    fn pipeline_with(&self, naming: NamingConfig, workers: usize) -> Pipeline<MockBackend, SqliteAuditStore> {
        self.pipeline_over(self.store(), naming, workers)
    }

    fn store(&self) -> SqliteAuditStore {
        SqliteAuditStore::new(self.dir.path().join("audit.db")).unwrap()
    }

    fn pipeline_over<S>(&self, store: S, naming: NamingConfig, workers: usize) -> Pipeline<MockBackend, S>
    where
        S: AuditStore,
        S::Error: std::fmt::Display,
    {
        let extractor = TextExtractor::new(
            Arc::new(PlainTextLayer),
            Arc::new(NoImages),
            Arc::new(NoOcr),
            ExtractionConfig::default(),
        );
        let classifier = StagedClassifier::new(self.backend.clone(), ClassifierConfig::default());
        let resolver = PathResolver::new(self.archive(), naming, SenderMapping::default());

        Pipeline::new(extractor, classifier, resolver, DecisionRecorder::new(store))
            .with_workers(workers)
            .with_date_sources(vec![DateSource::Modified])
    }

    fn listing(&self) -> Vec<PathBuf> {
        scan_inbox(&self.inbox(), false).unwrap()
    }
}

fn destination(outcome: &DocumentOutcome) -> &Path {
    match outcome {
        DocumentOutcome::Filed { destination } | DocumentOutcome::Unclear { destination, .. } => {
            destination
        }
        DocumentOutcome::Failed { reason } => panic!("document failed: {}", reason),
    }
}

#[tokio::test]
async fn test_confident_stage1_files_directly() {
    let mut fx = Fixture::new();
    fx.stage1(r#"{"label": "Invoices", "confidence": 0.92}"#);
    let source = fx.drop_document("scan.pdf", INVOICE_TEXT);
    let pipeline = fx.pipeline(1);

    let report = pipeline.run(&fx.listing(), RunMode::Normal).await;

    assert_eq!((report.filed(), report.unclear(), report.failed()), (1, 0, 0));
    let expected = fx.archive().join("Invoices/2024-03-02.pdf");
    assert_eq!(destination(&report.documents[0].outcome), expected);
    assert!(expected.exists());
    assert!(!source.exists());
    assert_eq!(fx.backend.calls_for(&ClassifierConfig::default().stage2_model), 0);

    let store = pipeline.recorder().store();
    let store = store.lock().unwrap();
    let document_id = report.documents[0].document_id.unwrap();
    let record = store.get(report.run_id, document_id).unwrap().unwrap();
    assert_eq!(record.decision.attempts.len(), 1);
    assert_eq!(record.target.unwrap().path(), expected);
    assert_eq!(store.records_for_run(report.run_id).unwrap().len(), 1);

    let runs = store.runs(5).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!((runs[0].total, runs[0].filed), (1, 1));
}

#[tokio::test]
async fn test_escalated_stage2_files_with_two_attempts() {
    let mut fx = Fixture::new();
    fx.stage1(r#"{"label": "Invoices", "confidence": 0.4}"#);
    fx.stage2(r#"{"label": "Invoices", "confidence": 0.55}"#);
    fx.drop_document("scan.pdf", INVOICE_TEXT);
    let pipeline = fx.pipeline(1);

    let report = pipeline.run(&fx.listing(), RunMode::Normal).await;

    let line = &report.documents[0];
    assert_eq!(destination(&line.outcome), fx.archive().join("Invoices/2024-03-02.pdf"));
    let store = pipeline.recorder().store();
    let record = store
        .lock()
        .unwrap()
        .get(report.run_id, line.document_id.unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(record.decision.attempts.len(), 2);
}

#[tokio::test]
async fn test_low_final_confidence_goes_to_unclear() {
    let mut fx = Fixture::new();
    fx.stage1(r#"{"label": "Invoices", "confidence": 0.4}"#);
    fx.stage2(r#"{"label": "Invoices", "confidence": 0.3}"#);
    fx.drop_document("scan.pdf", INVOICE_TEXT);

    let report = fx.pipeline(1).run(&fx.listing(), RunMode::Normal).await;

    assert_eq!(report.unclear(), 1);
    let expected = fx.archive().join("_Unclear/2024-03-02.pdf");
    assert_eq!(destination(&report.documents[0].outcome), expected);
    assert!(expected.exists());
}

#[tokio::test]
async fn test_collision_takes_next_suffix() {
    let mut fx = Fixture::new();
    fx.stage1(r#"{"label": "Invoices", "confidence": 0.92}"#);
    fx.archive_file("Invoices/2024-03-02.pdf");
    fx.archive_file("Invoices/2024-03-02_1.pdf");
    fx.drop_document("scan.pdf", INVOICE_TEXT);

    let report = fx.pipeline(1).run(&fx.listing(), RunMode::Normal).await;

    let expected = fx.archive().join("Invoices/2024-03-02_2.pdf");
    assert_eq!(destination(&report.documents[0].outcome), expected);
    assert_eq!(fs::read_to_string(expected).unwrap(), INVOICE_TEXT);
    assert_eq!(
        fs::read(fx.archive().join("Invoices/2024-03-02.pdf")).unwrap(),
        b"already filed"
    );
}

#[tokio::test]
async fn test_dry_run_plans_distinct_names_without_touching_disk() {
    let mut fx = Fixture::new();
    fx.stage1(r#"{"label": "Invoices", "confidence": 0.92}"#);
    let a = fx.drop_document("a.pdf", INVOICE_TEXT);
    let b = fx.drop_document("b.pdf", INVOICE_TEXT);
    let pipeline = fx.pipeline(1);

    let report = pipeline.run(&fx.listing(), RunMode::DryRun).await;

    let planned: Vec<_> = report
        .documents
        .iter()
        .map(|d| destination(&d.outcome).to_path_buf())
        .collect();
    assert_eq!(
        planned,
        vec![
            fx.archive().join("Invoices/2024-03-02.pdf"),
            fx.archive().join("Invoices/2024-03-02_1.pdf"),
        ]
    );
    assert!(a.exists() && b.exists());
    assert!(!fx.archive().exists());

    let store = pipeline.recorder().store();
    let records = store.lock().unwrap().records_for_run(report.run_id).unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.is_dry_run()));
}

#[tokio::test]
async fn test_encrypted_document_skips_classification() {
    let fx = Fixture::new();
    fx.drop_document("locked.pdf", "ENCRYPTED payload");
    let pipeline = fx.pipeline(1);

    let report = pipeline.run(&fx.listing(), RunMode::Normal).await;

    assert_eq!(report.unclear(), 1);
    assert_eq!(
        destination(&report.documents[0].outcome),
        fx.archive().join("_Unclear/2024-03-02.pdf")
    );
    assert_eq!(fx.backend.call_count(), 0);

    let store = pipeline.recorder().store();
    let unclear = store.lock().unwrap().unclear_records(10).unwrap();
    assert_eq!(unclear.len(), 1);
    assert!(unclear[0].decision.attempts.is_empty());
    assert!(matches!(
        unclear[0].decision.unclear_reason,
        Some(UnclearReason::ExtractionFailed(_))
    ));
}

#[tokio::test]
async fn test_failing_document_does_not_stop_the_run() {
    let mut fx = Fixture::new();
    fx.stage1(r#"{"label": "Invoices", "confidence": 0.92}"#);
    fx.drop_document("good.pdf", INVOICE_TEXT);
    let mut listing = fx.listing();
    listing.insert(0, fx.inbox().join("vanished.pdf"));

    let report = fx.pipeline(2).run(&listing, RunMode::Normal).await;

    assert_eq!((report.filed(), report.failed()), (1, 1));
    let failed = report
        .documents
        .iter()
        .find(|d| d.source_path.ends_with("vanished.pdf"))
        .unwrap();
    assert!(matches!(failed.outcome, DocumentOutcome::Failed { .. }));
    assert_eq!(failed.records.len(), 1);

    let record = fx.store().record(failed.records[0]).unwrap().unwrap();
    assert!(record.target.is_none());
    assert!(record.error.as_deref().unwrap().contains("unreadable"));
}


#[tokio::test]
async fn test_missing_date_fails_and_stays_in_inbox() {
    let mut fx = Fixture::new();
    fx.stage1(r#"{"label": "Invoices", "confidence": 0.92}"#);
    let source = fx.drop_document("scan.pdf", INVOICE_TEXT);
    let pipeline = fx.pipeline(1).with_date_sources(vec![DateSource::PdfInfo]);

    let report = pipeline.run(&fx.listing(), RunMode::Normal).await;

    assert_eq!(report.failed(), 1);
    assert!(source.exists());
    let store = pipeline.recorder().store();
    let records = store.lock().unwrap().records_for_run(report.run_id).unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].target.is_none());
    assert!(records[0].error.as_deref().unwrap().contains("date"));
}

#[tokio::test]
async fn test_concurrent_workers_never_share_a_destination() {
    let mut fx = Fixture::new();
    fx.stage1(r#"{"label": "Invoices", "confidence": 0.92}"#);
    for i in 0..5 {
        fx.drop_document(&format!("scan{}.pdf", i), INVOICE_TEXT);
    }

    let report = fx.pipeline(3).run(&fx.listing(), RunMode::Normal).await;

    assert_eq!(report.filed(), 5);
    let mut names: Vec<String> = fs::read_dir(fx.archive().join("Invoices"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "2024-03-02.pdf",
            "2024-03-02_1.pdf",
            "2024-03-02_2.pdf",
            "2024-03-02_3.pdf",
            "2024-03-02_4.pdf",
        ]
    );
    assert!(fs::read_dir(fx.inbox()).unwrap().next().is_none());
}

#[tokio::test]
async fn test_dry_run_record_matches_normal_record_except_mode() {
    let mut fx = Fixture::new();
    fx.stage1(r#"{"label": "Invoices", "confidence": 0.4}"#);
    fx.stage2(r#"{"label": "Invoices", "confidence": 0.88}"#);
    fx.drop_document("scan.pdf", INVOICE_TEXT);
    let pipeline = fx.pipeline(1);

    let planned = pipeline.run(&fx.listing(), RunMode::DryRun).await;
    let filed = pipeline.run(&fx.listing(), RunMode::Normal).await;

    let store = pipeline.recorder().store();
    let store = store.lock().unwrap();
    let mut planned = store.records_for_run(planned.run_id).unwrap().remove(0);
    let filed = store.records_for_run(filed.run_id).unwrap().remove(0);

    assert_eq!(planned.mode, RunMode::DryRun);
    assert_eq!(filed.mode, RunMode::Normal);
    planned.id = filed.id;
    planned.run_id = filed.run_id;
    planned.document_id = filed.document_id;
    planned.created_at = filed.created_at;
    planned.mode = RunMode::Normal;
    assert_eq!(planned, filed);
}

#[tokio::test]
async fn test_unknown_sender_routed_to_unclear_is_reviewable() {
    let mut fx = Fixture::new();
    fx.stage1(r#"{"label": "Nobody GmbH", "confidence": 0.95}"#);
    fx.drop_document("scan.pdf", INVOICE_TEXT);
    let naming = NamingConfig {
        route_unknown_to_unclear: true,
        ..NamingConfig::default()
    };
    let pipeline = fx.pipeline_with(naming, 1);

    let report = pipeline.run(&fx.listing(), RunMode::Normal).await;

    assert_eq!(report.unclear(), 1);
    let expected = fx.archive().join("_Unclear/2024-03-02.pdf");
    assert_eq!(destination(&report.documents[0].outcome), expected);
    assert!(expected.exists());

    let store = pipeline.recorder().store();
    let unclear = store.lock().unwrap().unclear_records(10).unwrap();
    assert_eq!(unclear.len(), 1);
    assert_eq!(unclear[0].decision.label.as_str(), "Nobody GmbH");
}

#[tokio::test]
async fn test_destination_taken_before_move_resolves_once_more() {
    let mut fx = Fixture::new();
    fx.stage1(r#"{"label": "Invoices", "confidence": 0.92}"#);
    fx.archive_file("Invoices/2024-03-02.pdf");
    fx.drop_document("scan.pdf", INVOICE_TEXT);
    let stale = StaleOnce {
        path: fx.archive().join("Invoices/2024-03-02.pdf"),
        asked: AtomicBool::new(false),
    };
    let pipeline = fx.pipeline(1).with_archive_view(Arc::new(stale));

    let report = pipeline.run(&fx.listing(), RunMode::Normal).await;

    let line = &report.documents[0];
    let expected = fx.archive().join("Invoices/2024-03-02_1.pdf");
    assert_eq!(destination(&line.outcome), expected);
    assert_eq!(fs::read_to_string(&expected).unwrap(), INVOICE_TEXT);
    assert_eq!(
        fs::read(fx.archive().join("Invoices/2024-03-02.pdf")).unwrap(),
        b"already filed"
    );

    let store = pipeline.recorder().store();
    let store = store.lock().unwrap();
    let history = store.history(report.run_id, line.document_id.unwrap()).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].target.as_ref().unwrap().file_name, "2024-03-02.pdf");
    assert_eq!(history[1].supersedes, Some(history[0].id));
    assert_eq!(history[1].target.as_ref().unwrap().path(), expected);
    let latest = store.get(report.run_id, line.document_id.unwrap()).unwrap().unwrap();
    assert_eq!(latest.id, history[1].id);
}

#[tokio::test]
async fn test_second_race_fails_and_keeps_document() {
    let mut fx = Fixture::new();
    fx.stage1(r#"{"label": "Invoices", "confidence": 0.92}"#);
    fx.archive_file("Invoices/2024-03-02.pdf");
    let source = fx.drop_document("scan.pdf", INVOICE_TEXT);
    let pipeline = fx.pipeline(1).with_archive_view(Arc::new(Blind));

    let report = pipeline.run(&fx.listing(), RunMode::Normal).await;

    assert_eq!(report.failed(), 1);
    assert!(source.exists());
    assert_eq!(
        fs::read(fx.archive().join("Invoices/2024-03-02.pdf")).unwrap(),
        b"already filed"
    );

    let line = &report.documents[0];
    let store = pipeline.recorder().store();
    let history = store
        .lock()
        .unwrap()
        .history(report.run_id, line.document_id.unwrap())
        .unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[1].supersedes, Some(history[0].id));
    assert_eq!(history[2].supersedes, Some(history[1].id));
    assert!(history[2].error.as_deref().unwrap().contains("taken before the move"));
}

#[tokio::test]
async fn test_audit_failure_leaves_document_and_run_continues() {
    let mut fx = Fixture::new();
    fx.stage1(r#"{"label": "Invoices", "confidence": 0.92}"#);
    let good = fx.drop_document("good.pdf", INVOICE_TEXT);
    let poison = fx.drop_document("poison.pdf", INVOICE_TEXT);
    let store = RefusingStore {
        inner: fx.store(),
        refused: "poison.pdf",
    };
    let pipeline = fx.pipeline_over(store, NamingConfig::default(), 1);

    let report = pipeline.run(&fx.listing(), RunMode::Normal).await;

    assert_eq!((report.filed(), report.failed()), (1, 1));
    assert!(!good.exists());
    assert!(poison.exists());
    let refused = report
        .documents
        .iter()
        .find(|d| d.source_path == poison)
        .unwrap();
    match &refused.outcome {
        DocumentOutcome::Failed { reason } => assert!(reason.contains("disk full")),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(refused.records.is_empty());

    let runs = fx.store().runs(5).unwrap();
    assert_eq!((runs[0].filed, runs[0].failed), (1, 1));
}

//! Pipeline Orchestrator

use crate::context::RunContext;
use crate::metadata::load_document;
use crate::report::{DocumentOutcome, DocumentReport, RunReport};
use futures::stream::{self, StreamExt};
use paperclerk_classifier::{ClassificationHints, StagedClassifier};
use paperclerk_domain::traits::{AuditStore, ModelBackend};
use paperclerk_domain::{
    ClassificationDecision, DateSource, Document, DocumentId, ExtractionResult, RecordId,
    ResolvedTarget, RunMode,
};
use paperclerk_extractor::TextExtractor;
use paperclerk_filer::{
    ArchiveView, DecisionRecorder, FilingError, FilingExecutor, FsArchiveView, PathResolver,
    RecordRequest, ReservedView,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runs extraction, classification, resolution, recording and filing over
/// an inbox listing
///
/// Each document is processed independently; a failing document becomes a
/// [`DocumentOutcome::Failed`] line and the run continues. Up to `workers`
/// documents are in flight at once, but resolve → record → move always runs
/// under the run's placement lock.
pub struct Pipeline<B, S>
where
    B: ModelBackend,
    S: AuditStore,
{
    extractor: TextExtractor,
    classifier: StagedClassifier<B>,
    resolver: PathResolver,
    recorder: DecisionRecorder<S>,
    executor: FilingExecutor,
    archive: Arc<dyn ArchiveView + Send + Sync>,
    date_sources: Vec<DateSource>,
    workers: usize,
}

/// Everything the placement step needs about one document
struct Classified<'a> {
    document: &'a Document,
    extraction: Option<&'a ExtractionResult>,
    decision: &'a ClassificationDecision,
}

impl<B, S> Pipeline<B, S>
where
    B: ModelBackend + Send + Sync + 'static,
    B::Error: std::fmt::Display,
    S: AuditStore,
    S::Error: std::fmt::Display,
{
    /// Assemble a pipeline from its components
    pub fn new(
        extractor: TextExtractor,
        classifier: StagedClassifier<B>,
        resolver: PathResolver,
        recorder: DecisionRecorder<S>,
    ) -> Self {
        Self {
            extractor,
            classifier,
            resolver,
            recorder,
            executor: FilingExecutor::new(),
            archive: Arc::new(FsArchiveView),
            date_sources: vec![DateSource::Created, DateSource::Modified],
            workers: 1,
        }
    }

    /// Set the number of documents processed concurrently (at least 1)
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the metadata sources for the file name date, in priority order
    pub fn with_date_sources(mut self, sources: Vec<DateSource>) -> Self {
        self.date_sources = sources;
        self
    }

    /// Replace the on-disk view of the archive consulted while resolving
    pub fn with_archive_view(mut self, archive: Arc<dyn ArchiveView + Send + Sync>) -> Self {
        self.archive = archive;
        self
    }

    /// Recorder shared with readers of the audit store
    pub fn recorder(&self) -> &DecisionRecorder<S> {
        &self.recorder
    }

    /// Process every document of `listing`
    pub async fn run(&self, listing: &[PathBuf], mode: RunMode) -> RunReport {
        let ctx = RunContext::new(mode);
        info!(
            run_id = %ctx.run_id(),
            mode = mode.as_str(),
            documents = listing.len(),
            "Starting run"
        );

        let hints = self.hints();
        let mut documents: Vec<DocumentReport> = stream::iter(listing)
            .map(|path| self.process(&ctx, &hints, path))
            .buffer_unordered(self.workers)
            .collect()
            .await;
        documents.sort_by(|a, b| a.source_path.cmp(&b.source_path));

        let report = RunReport::finish(ctx.run_id(), mode, ctx.started_at(), documents);
        if let Err(e) = self.recorder.record_run(&report.summary()) {
            warn!(run_id = %ctx.run_id(), error = %e, "Failed to record run summary");
        }

        info!(
            run_id = %ctx.run_id(),
            filed = report.filed(),
            unclear = report.unclear(),
            failed = report.failed(),
            "Run complete"
        );
        report
    }

    fn hints(&self) -> ClassificationHints {
        let existing_folders = match FsArchiveView::folders(self.resolver.archive_root()) {
            Ok(folders) => folders
                .into_iter()
                .filter(|f| *f != self.resolver.config().unclear_folder)
                .collect(),
            Err(e) => {
                debug!(error = %e, "Archive folders unavailable for hints");
                Vec::new()
            }
        };
        ClassificationHints {
            known_labels: self.resolver.mapping().known_labels(),
            existing_folders,
        }
    }

    async fn process(
        &self,
        ctx: &RunContext,
        hints: &ClassificationHints,
        path: &Path,
    ) -> DocumentReport {
        let owned_path = path.to_path_buf();
        let sources = self.date_sources.clone();
        let loaded =
            tokio::task::spawn_blocking(move || load_document(&owned_path, &sources)).await;
        let document = match loaded {
            Ok(Ok(document)) => document,
            Ok(Err(e)) => {
                warn!(document = %path.display(), error = %e, "Cannot read document");
                return self.unreadable(ctx, path, format!("unreadable: {}", e));
            }
            Err(e) => {
                return self.unreadable(ctx, path, format!("metadata task failed: {}", e));
            }
        };

        let (extraction, decision) = match self.extractor.extract(&document).await {
            Ok(extraction) => {
                let decision = self.classifier.classify(&extraction.full_text(), hints).await;
                (Some(extraction), decision)
            }
            Err(e) => {
                warn!(
                    run_id = %ctx.run_id(),
                    document = %document.file_name(),
                    error = %e,
                    "Extraction failed, routing to unclear"
                );
                (None, ClassificationDecision::extraction_failed(e.to_string()))
            }
        };

        let classified = Classified {
            document: &document,
            extraction: extraction.as_ref(),
            decision: &decision,
        };
        let (outcome, records) = self.place(ctx, &classified).await;

        DocumentReport {
            source_path: document.source_path.clone(),
            document_id: Some(document.id),
            outcome,
            stage: decision.stage_used(),
            confidence: decision.confidence,
            records,
        }
    }

    /// Report a document whose metadata could not be read, with an
    /// error-only audit record so the trail covers every attempted document
    fn unreadable(&self, ctx: &RunContext, path: &Path, reason: String) -> DocumentReport {
        let document = Document {
            id: DocumentId::new(),
            source_path: path.to_path_buf(),
            size_bytes: 0,
            fingerprint: String::new(),
            date: None,
        };
        let decision = ClassificationDecision::extraction_failed(reason.clone());
        let item = Classified {
            document: &document,
            extraction: None,
            decision: &decision,
        };

        let mut report = DocumentReport::failed(document.source_path.clone(), reason.clone());
        match self.recorder.record(self.request(ctx, &item, None, Some(reason.as_str()), None)) {
            Ok(record) => {
                report.document_id = Some(document.id);
                report.records.push(record.id);
            }
            Err(e) => warn!(document = %path.display(), error = %e, "Failure record not written"),
        }
        report
    }

    /// Resolve, record and move while holding the placement lock
    async fn place(
        &self,
        ctx: &RunContext,
        item: &Classified<'_>,
    ) -> (DocumentOutcome, Vec<RecordId>) {
        let mut reserved = ctx.placement().await;
        let mut records = Vec::new();
        let mut supersedes = None;
        let mut retried = false;

        loop {
            let view = ReservedView::new(self.archive.as_ref(), &reserved);
            let resolved = self.resolver.resolve(item.document, item.decision, &view);
            let target = match resolved {
                Ok(target) => target,
                Err(e) => {
                    records.extend(self.record_failure(ctx, item, None, &e, supersedes));
                    return (failed(&e), records);
                }
            };

            let request = self.request(ctx, item, Some(&target), None, supersedes);
            let record = match self.recorder.record(request) {
                Ok(record) => record,
                Err(e) => {
                    warn!(
                        document = %item.document.file_name(),
                        error = %e,
                        "Audit record not written, leaving document"
                    );
                    return (failed(&e), records);
                }
            };
            records.push(record.id);

            match self.executor.file(item.document, &target, ctx.mode()) {
                Ok(outcome) => {
                    reserved.insert(outcome.destination().to_path_buf());
                    return (self.outcome(item.decision, &target), records);
                }
                Err(FilingError::CollisionRace(path)) if !retried => {
                    warn!(
                        destination = %path.display(),
                        "Destination taken before the move, resolving again"
                    );
                    supersedes = Some(record.id);
                    retried = true;
                }
                Err(e) => {
                    warn!(document = %item.document.file_name(), error = %e, "Filing failed");
                    let failure = self.record_failure(ctx, item, Some(&target), &e, Some(record.id));
                    records.extend(failure);
                    return (failed(&e), records);
                }
            }
        }
    }

    fn request<'a>(
        &self,
        ctx: &RunContext,
        item: &'a Classified<'a>,
        target: Option<&'a ResolvedTarget>,
        error: Option<&'a str>,
        supersedes: Option<RecordId>,
    ) -> RecordRequest<'a> {
        RecordRequest {
            run_id: ctx.run_id(),
            document: item.document,
            extraction: item.extraction,
            decision: item.decision,
            target,
            mode: ctx.mode(),
            error,
            supersedes,
        }
    }

    fn record_failure(
        &self,
        ctx: &RunContext,
        item: &Classified<'_>,
        target: Option<&ResolvedTarget>,
        error: &FilingError,
        supersedes: Option<RecordId>,
    ) -> Option<RecordId> {
        let message = error.to_string();
        let request = self.request(ctx, item, target, Some(&message), supersedes);
        match self.recorder.record(request) {
            Ok(record) => Some(record.id),
            Err(e) => {
                warn!(document = %item.document.file_name(), error = %e, "Failure record not written");
                None
            }
        }
    }

    fn outcome(
        &self,
        decision: &ClassificationDecision,
        target: &ResolvedTarget,
    ) -> DocumentOutcome {
        let destination = target.path();
        if !target.unclear {
            return DocumentOutcome::Filed { destination };
        }
        let reason = match &decision.unclear_reason {
            Some(reason) => reason.to_string(),
            None => format!("no archive folder for '{}'", decision.label),
        };
        DocumentOutcome::Unclear { destination, reason }
    }
}

fn failed(error: &FilingError) -> DocumentOutcome {
    DocumentOutcome::Failed {
        reason: error.to_string(),
    }
}

//! Paperclerk Storage Layer
//!
//! Implements the `AuditStore` trait on top of SQLite.
//!
//! # Architecture
//!
//! - `audit_records`: one row per decision, append-only (triggers reject
//!   `UPDATE` and `DELETE`)
//! - `runs`: one summary row per completed run
//!
//! Attempts and stage failures are stored as JSON arrays next to the
//! flattened decision and target columns. The database runs in WAL mode with
//! `synchronous = FULL`, so `append` returning `Ok` means the row is on disk.
//!
//! # Examples
//!
//! ```no_run
//! use paperclerk_store::SqliteAuditStore;
//!
//! let store = SqliteAuditStore::new(":memory:").unwrap();
//! // Store is now ready to take audit records
//! ```

#![warn(missing_docs)]

use chrono::NaiveDate;
use paperclerk_domain::traits::AuditStore;
use paperclerk_domain::{
    AuditRecord, ClassificationAttempt, ClassificationDecision, Confidence, DateSource,
    DocumentDate, DocumentId, ExtractionSummary, Label, RecordId, ResolvedTarget, RunId, RunMode,
    RunSummary, Stage, StageFailure, UnclearReason,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored JSON payload could not be read
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

const RECORD_COLUMNS: &str = "id, run_id, document_id, source_path, fingerprint, \
     doc_date, date_source, \
     extraction_method, extraction_pages, extraction_ocr_pages, extraction_confidence, extraction_chars, \
     label, confidence, unclear_reason, unclear_detail, attempts_json, failures_json, \
     archive_root, target_folder, target_file_name, collision_suffix, target_unclear, folder_created, \
     mode, error, supersedes, created_at";

/// SQLite-based implementation of `AuditStore`
///
/// # Thread Safety
///
/// SQLite connections are not thread-safe. The pipeline owns one store and
/// serializes appends through it.
pub struct SqliteAuditStore {
    conn: Connection,
}

impl SqliteAuditStore {
    /// Open (or create) the audit database at the given path
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use paperclerk_store::SqliteAuditStore;
    ///
    /// let store = SqliteAuditStore::new("audit.db").unwrap();
    /// ```
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let mut store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&mut self) -> Result<(), StoreError> {
        // journal_mode answers with the resulting mode ("memory" for :memory:)
        let _mode: String =
            self.conn
                .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        self.conn.pragma_update(None, "synchronous", "FULL")?;
        self.conn.execute_batch(include_str!("schema.sql"))?;
        Ok(())
    }

    /// Latest record whose source path matches, across all runs
    ///
    /// Lets an operator find out where an inbox file went.
    pub fn latest_for_path(&self, source_path: &Path) -> Result<Option<AuditRecord>, StoreError> {
        let sql = format!(
            "SELECT {} FROM audit_records WHERE source_path = ?1 ORDER BY seq DESC LIMIT 1",
            RECORD_COLUMNS
        );
        let raw = self
            .conn
            .query_row(
                &sql,
                params![source_path.to_string_lossy().into_owned()],
                RawRecord::from_row,
            )
            .optional()?;
        raw.map(RawRecord::into_record).transpose()
    }

    /// Look up a single record by id
    pub fn record(&self, id: RecordId) -> Result<Option<AuditRecord>, StoreError> {
        let sql = format!("SELECT {} FROM audit_records WHERE id = ?1", RECORD_COLUMNS);
        let raw = self
            .conn
            .query_row(&sql, params![id_to_bytes(id.value())], RawRecord::from_row)
            .optional()?;
        raw.map(RawRecord::into_record).transpose()
    }

    /// Total number of audit records
    pub fn record_count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM audit_records", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn query_records<P: rusqlite::Params>(
        &self,
        where_clause: &str,
        params: P,
    ) -> Result<Vec<AuditRecord>, StoreError> {
        let sql = format!("SELECT {} FROM audit_records {}", RECORD_COLUMNS, where_clause);
        let mut stmt = self.conn.prepare(&sql)?;
        let raws = stmt
            .query_map(params, RawRecord::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawRecord::into_record).collect()
    }
}

impl AuditStore for SqliteAuditStore {
    type Error = StoreError;

    fn append(&mut self, record: &AuditRecord) -> Result<(), Self::Error> {
        let decision = &record.decision;
        let (unclear_reason, unclear_detail) = match &decision.unclear_reason {
            Some(reason) => {
                let (tag, detail) = unclear_reason_to_columns(reason);
                (Some(tag), detail)
            }
            None => (None, None),
        };
        let extraction = record.extraction.as_ref();
        let target = record.target.as_ref();

        self.conn.execute(
            &format!(
                "INSERT INTO audit_records ({}) VALUES \
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, \
                  ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28)",
                RECORD_COLUMNS
            ),
            params![
                id_to_bytes(record.id.value()),
                id_to_bytes(record.run_id.value()),
                id_to_bytes(record.document_id.value()),
                record.source_path.to_string_lossy().into_owned(),
                &record.fingerprint,
                record.date.map(|d| d.prefix()),
                record.date.map(|d| d.source.as_str()),
                extraction.map(|e| e.method.clone()),
                extraction.map(|e| e.pages as i64),
                extraction.map(|e| e.ocr_pages as i64),
                extraction.map(|e| e.confidence),
                extraction.map(|e| e.char_count as i64),
                decision.label.as_str(),
                decision.confidence.value(),
                unclear_reason,
                unclear_detail,
                attempts_to_json(&decision.attempts).to_string(),
                failures_to_json(&decision.failures).to_string(),
                target.map(|t| t.archive_root.to_string_lossy().into_owned()),
                target.map(|t| t.folder.clone()),
                target.map(|t| t.file_name.clone()),
                target.and_then(|t| t.collision_suffix).map(|s| s as i64),
                target.map(|t| t.unclear),
                target.map(|t| t.folder_created),
                record.mode.as_str(),
                &record.error,
                record.supersedes.map(|s| id_to_bytes(s.value())),
                record.created_at as i64,
            ],
        )?;

        Ok(())
    }

    fn get(
        &self,
        run_id: RunId,
        document_id: DocumentId,
    ) -> Result<Option<AuditRecord>, Self::Error> {
        let mut records = self.query_records(
            "WHERE run_id = ?1 AND document_id = ?2 ORDER BY seq DESC LIMIT 1",
            params![id_to_bytes(run_id.value()), id_to_bytes(document_id.value())],
        )?;
        Ok(records.pop())
    }

    fn history(
        &self,
        run_id: RunId,
        document_id: DocumentId,
    ) -> Result<Vec<AuditRecord>, Self::Error> {
        self.query_records(
            "WHERE run_id = ?1 AND document_id = ?2 ORDER BY seq ASC",
            params![id_to_bytes(run_id.value()), id_to_bytes(document_id.value())],
        )
    }

    fn records_for_run(&self, run_id: RunId) -> Result<Vec<AuditRecord>, Self::Error> {
        self.query_records(
            "WHERE run_id = ?1 ORDER BY seq ASC",
            params![id_to_bytes(run_id.value())],
        )
    }

    fn unclear_records(&self, limit: usize) -> Result<Vec<AuditRecord>, Self::Error> {
        // Superseded records are history, not open review items
        self.query_records(
            "WHERE (label = ?1 OR target_unclear = 1) AND id NOT IN \
             (SELECT supersedes FROM audit_records WHERE supersedes IS NOT NULL) \
             ORDER BY seq DESC LIMIT ?2",
            params![Label::UNCLEAR, limit as i64],
        )
    }

    fn append_run(&mut self, summary: &RunSummary) -> Result<(), Self::Error> {
        self.conn.execute(
            "INSERT INTO runs (run_id, mode, started_at, finished_at, total, filed, unclear, failed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id_to_bytes(summary.run_id.value()),
                summary.mode.as_str(),
                summary.started_at as i64,
                summary.finished_at as i64,
                summary.total as i64,
                summary.filed as i64,
                summary.unclear as i64,
                summary.failed as i64,
            ],
        )?;
        Ok(())
    }

    fn runs(&self, limit: usize) -> Result<Vec<RunSummary>, Self::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, mode, started_at, finished_at, total, filed, unclear, failed
             FROM runs ORDER BY seq DESC LIMIT ?1",
        )?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((
                    row.get::<_, Vec<u8>>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, i64>(7)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(
                |(id, mode, started_at, finished_at, total, filed, unclear, failed)| {
                    Ok(RunSummary {
                        run_id: RunId::from_value(bytes_to_id(&id)?),
                        mode: parse_mode(&mode)?,
                        started_at: started_at as u64,
                        finished_at: finished_at as u64,
                        total: total as usize,
                        filed: filed as usize,
                        unclear: unclear as usize,
                        failed: failed as usize,
                    })
                },
            )
            .collect()
    }
}

/// Column values of one `audit_records` row, before domain conversion
struct RawRecord {
    id: Vec<u8>,
    run_id: Vec<u8>,
    document_id: Vec<u8>,
    source_path: String,
    fingerprint: String,
    doc_date: Option<String>,
    date_source: Option<String>,
    extraction_method: Option<String>,
    extraction_pages: Option<i64>,
    extraction_ocr_pages: Option<i64>,
    extraction_confidence: Option<f64>,
    extraction_chars: Option<i64>,
    label: String,
    confidence: f64,
    unclear_reason: Option<String>,
    unclear_detail: Option<String>,
    attempts_json: String,
    failures_json: String,
    archive_root: Option<String>,
    target_folder: Option<String>,
    target_file_name: Option<String>,
    collision_suffix: Option<i64>,
    target_unclear: Option<bool>,
    folder_created: Option<bool>,
    mode: String,
    error: Option<String>,
    supersedes: Option<Vec<u8>>,
    created_at: i64,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            run_id: row.get(1)?,
            document_id: row.get(2)?,
            source_path: row.get(3)?,
            fingerprint: row.get(4)?,
            doc_date: row.get(5)?,
            date_source: row.get(6)?,
            extraction_method: row.get(7)?,
            extraction_pages: row.get(8)?,
            extraction_ocr_pages: row.get(9)?,
            extraction_confidence: row.get(10)?,
            extraction_chars: row.get(11)?,
            label: row.get(12)?,
            confidence: row.get(13)?,
            unclear_reason: row.get(14)?,
            unclear_detail: row.get(15)?,
            attempts_json: row.get(16)?,
            failures_json: row.get(17)?,
            archive_root: row.get(18)?,
            target_folder: row.get(19)?,
            target_file_name: row.get(20)?,
            collision_suffix: row.get(21)?,
            target_unclear: row.get(22)?,
            folder_created: row.get(23)?,
            mode: row.get(24)?,
            error: row.get(25)?,
            supersedes: row.get(26)?,
            created_at: row.get(27)?,
        })
    }

    fn into_record(self) -> Result<AuditRecord, StoreError> {
        let date = match (self.doc_date, self.date_source) {
            (Some(date), Some(source)) => Some(DocumentDate {
                date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                    .map_err(|e| StoreError::InvalidData(format!("Bad date {}: {}", date, e)))?,
                source: DateSource::parse(&source).ok_or_else(|| {
                    StoreError::InvalidData(format!("Unknown date source: {}", source))
                })?,
            }),
            _ => None,
        };

        let extraction = self.extraction_method.map(|method| ExtractionSummary {
            method,
            pages: self.extraction_pages.unwrap_or(0) as usize,
            ocr_pages: self.extraction_ocr_pages.unwrap_or(0) as usize,
            confidence: self.extraction_confidence.unwrap_or(0.0),
            char_count: self.extraction_chars.unwrap_or(0) as usize,
        });

        let unclear_reason = self
            .unclear_reason
            .as_deref()
            .map(|tag| unclear_reason_from_columns(tag, self.unclear_detail))
            .transpose()?;

        let decision = ClassificationDecision {
            label: Label::from_stored(&self.label),
            confidence: Confidence::clamped(self.confidence),
            attempts: attempts_from_json(&serde_json::from_str(&self.attempts_json)?)?,
            failures: failures_from_json(&serde_json::from_str(&self.failures_json)?)?,
            unclear_reason,
        };

        let target = match (self.archive_root, self.target_folder, self.target_file_name) {
            (Some(root), Some(folder), Some(file_name)) => Some(ResolvedTarget {
                archive_root: PathBuf::from(root),
                folder,
                file_name,
                collision_suffix: self.collision_suffix.map(|s| s as u32),
                unclear: self.target_unclear.unwrap_or(false),
                folder_created: self.folder_created.unwrap_or(false),
            }),
            _ => None,
        };

        Ok(AuditRecord {
            id: RecordId::from_value(bytes_to_id(&self.id)?),
            run_id: RunId::from_value(bytes_to_id(&self.run_id)?),
            document_id: DocumentId::from_value(bytes_to_id(&self.document_id)?),
            source_path: PathBuf::from(self.source_path),
            fingerprint: self.fingerprint,
            date,
            extraction,
            decision,
            target,
            mode: parse_mode(&self.mode)?,
            error: self.error,
            supersedes: self
                .supersedes
                .map(|b| bytes_to_id(&b).map(RecordId::from_value))
                .transpose()?,
            created_at: self.created_at as u64,
        })
    }
}

fn id_to_bytes(value: u128) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

fn bytes_to_id(bytes: &[u8]) -> Result<u128, StoreError> {
    let arr: [u8; 16] = bytes.try_into().map_err(|_| {
        StoreError::InvalidData(format!("Expected 16 bytes for id, got {}", bytes.len()))
    })?;
    Ok(u128::from_be_bytes(arr))
}

fn parse_mode(s: &str) -> Result<RunMode, StoreError> {
    RunMode::parse(s).ok_or_else(|| StoreError::InvalidData(format!("Unknown run mode: {}", s)))
}

fn unclear_reason_to_columns(reason: &UnclearReason) -> (&'static str, Option<String>) {
    match reason {
        UnclearReason::LowConfidence => ("low_confidence", None),
        UnclearReason::NoSuccessfulAttempt => ("no_successful_attempt", None),
        UnclearReason::ModelUnclear => ("model_unclear", None),
        UnclearReason::ExtractionFailed(e) => ("extraction_failed", Some(e.clone())),
    }
}

fn unclear_reason_from_columns(
    tag: &str,
    detail: Option<String>,
) -> Result<UnclearReason, StoreError> {
    match tag {
        "low_confidence" => Ok(UnclearReason::LowConfidence),
        "no_successful_attempt" => Ok(UnclearReason::NoSuccessfulAttempt),
        "model_unclear" => Ok(UnclearReason::ModelUnclear),
        "extraction_failed" => Ok(UnclearReason::ExtractionFailed(detail.unwrap_or_default())),
        _ => Err(StoreError::InvalidData(format!("Unknown unclear reason: {}", tag))),
    }
}

fn attempts_to_json(attempts: &[ClassificationAttempt]) -> Value {
    Value::Array(
        attempts
            .iter()
            .map(|a| {
                json!({
                    "stage": a.stage.number(),
                    "model": a.model,
                    "excerpt": a.excerpt,
                    "raw_response": a.raw_response,
                    "label": a.label,
                    "confidence": a.confidence.value(),
                })
            })
            .collect(),
    )
}

fn failures_to_json(failures: &[StageFailure]) -> Value {
    Value::Array(
        failures
            .iter()
            .map(|f| {
                json!({
                    "stage": f.stage.number(),
                    "model": f.model,
                    "reason": f.reason,
                    "raw_response": f.raw_response,
                })
            })
            .collect(),
    )
}

fn str_field(value: &Value, key: &str) -> Result<String, StoreError> {
    value[key]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| StoreError::InvalidData(format!("Missing field '{}'", key)))
}

fn stage_field(value: &Value) -> Result<Stage, StoreError> {
    value["stage"]
        .as_u64()
        .and_then(|n| Stage::from_number(n as u8))
        .ok_or_else(|| StoreError::InvalidData(format!("Invalid stage: {}", value["stage"])))
}

fn attempts_from_json(value: &Value) -> Result<Vec<ClassificationAttempt>, StoreError> {
    let items = value
        .as_array()
        .ok_or_else(|| StoreError::InvalidData("attempts is not an array".to_string()))?;

    items
        .iter()
        .map(|item| {
            Ok(ClassificationAttempt {
                stage: stage_field(item)?,
                model: str_field(item, "model")?,
                excerpt: str_field(item, "excerpt")?,
                raw_response: str_field(item, "raw_response")?,
                label: str_field(item, "label")?,
                confidence: Confidence::clamped(item["confidence"].as_f64().unwrap_or(0.0)),
            })
        })
        .collect()
}

fn failures_from_json(value: &Value) -> Result<Vec<StageFailure>, StoreError> {
    let items = value
        .as_array()
        .ok_or_else(|| StoreError::InvalidData("failures is not an array".to_string()))?;

    items
        .iter()
        .map(|item| {
            Ok(StageFailure {
                stage: stage_field(item)?,
                model: str_field(item, "model")?,
                reason: str_field(item, "reason")?,
                raw_response: item["raw_response"].as_str().map(str::to_string),
            })
        })
        .collect()
}

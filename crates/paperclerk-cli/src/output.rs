//! Output formatting for the CLI.

use crate::cli::OutputFormat;
use crate::error::Result;
use colored::*;
use paperclerk_domain::{AuditRecord, RunSummary};
use paperclerk_pipeline::{DocumentOutcome, RunReport};
use std::path::Path;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Format the report of a finished run.
    pub fn format_report(&self, report: &RunReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
            OutputFormat::Quiet => Ok(report
                .record_ids()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => Ok(self.report_table(report)),
        }
    }

    fn report_table(&self, report: &RunReport) -> String {
        let summary = format!(
            "Run {} ({}): {} filed, {} unclear, {} failed",
            report.run_id,
            report.mode.as_str(),
            report.filed(),
            report.unclear(),
            report.failed()
        );
        if report.documents.is_empty() {
            return format!("{}\n{}", summary, self.colorize("Inbox is empty.", "yellow"));
        }

        let mut builder = Builder::default();
        builder.push_record(["Document", "Outcome", "Destination / Reason", "Stage", "Confidence"]);
        for line in &report.documents {
            let (outcome, detail) = match &line.outcome {
                DocumentOutcome::Filed { destination } => {
                    (self.colorize("filed", "green"), destination.display().to_string())
                }
                DocumentOutcome::Unclear { destination, reason } => (
                    self.colorize("unclear", "yellow"),
                    format!("{} ({})", destination.display(), reason),
                ),
                DocumentOutcome::Failed { reason } => (self.colorize("failed", "red"), reason.clone()),
            };
            builder.push_record([
                file_name(&line.source_path),
                outcome,
                detail,
                line.stage.map(|s| s.number().to_string()).unwrap_or_else(|| "-".to_string()),
                line.confidence.to_string(),
            ]);
        }

        format!("{}\n{}", self.table(builder), summary)
    }

    /// Format audit records.
    pub fn format_records(&self, records: &[AuditRecord]) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.records_json(records),
            OutputFormat::Quiet => Ok(records
                .iter()
                .map(|r| r.id.to_string())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => Ok(self.records_table(records)),
        }
    }

    fn records_json(&self, records: &[AuditRecord]) -> Result<String> {
        let json: Vec<serde_json::Value> = records
            .iter()
            .map(|r| {
                serde_json::json!({
                    "id": r.id.to_string(),
                    "run_id": r.run_id.to_string(),
                    "document_id": r.document_id.to_string(),
                    "source_path": r.source_path.display().to_string(),
                    "fingerprint": r.fingerprint,
                    "date": r.date.map(|d| d.prefix()),
                    "date_source": r.date.map(|d| d.source.as_str()),
                    "label": r.decision.label.as_str(),
                    "confidence": r.decision.confidence.value(),
                    "unclear_reason": r.decision.unclear_reason.as_ref().map(|u| u.to_string()),
                    "attempts": r.decision.attempts.iter().map(|a| serde_json::json!({
                        "stage": a.stage.number(),
                        "model": a.model,
                        "label": a.label,
                        "confidence": a.confidence.value(),
                        "raw_response": a.raw_response,
                    })).collect::<Vec<_>>(),
                    "failures": r.decision.failures.iter().map(|f| serde_json::json!({
                        "stage": f.stage.number(),
                        "model": f.model,
                        "reason": f.reason,
                    })).collect::<Vec<_>>(),
                    "destination": r.target.as_ref().map(|t| t.path().display().to_string()),
                    "mode": r.mode.as_str(),
                    "error": r.error,
                    "supersedes": r.supersedes.map(|s| s.to_string()),
                    "created_at": r.created_at,
                })
            })
            .collect();

        Ok(serde_json::to_string_pretty(&json)?)
    }

    fn records_table(&self, records: &[AuditRecord]) -> String {
        if records.is_empty() {
            return self.colorize("No records found.", "yellow");
        }

        let mut builder = Builder::default();
        builder.push_record(["Record", "Document", "Label", "Confidence", "Destination", "Mode", "Recorded"]);
        for record in records {
            let destination = match (&record.target, &record.error) {
                (_, Some(error)) => self.colorize(error, "red"),
                (Some(target), None) => target.relative_path().display().to_string(),
                (None, None) => "-".to_string(),
            };
            let id = record.id.to_string();
            builder.push_record([
                id[..8.min(id.len())].to_string(),
                file_name(&record.source_path),
                record.decision.label.to_string(),
                record.decision.confidence.to_string(),
                destination,
                record.mode.as_str().to_string(),
                format_timestamp(record.created_at),
            ]);
        }
        self.table(builder)
    }

    /// Format run summaries.
    pub fn format_runs(&self, runs: &[RunSummary]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let json: Vec<serde_json::Value> = runs
                    .iter()
                    .map(|r| {
                        serde_json::json!({
                            "run_id": r.run_id.to_string(),
                            "mode": r.mode.as_str(),
                            "started_at": r.started_at,
                            "finished_at": r.finished_at,
                            "total": r.total,
                            "filed": r.filed,
                            "unclear": r.unclear,
                            "failed": r.failed,
                        })
                    })
                    .collect();
                Ok(serde_json::to_string_pretty(&json)?)
            }
            OutputFormat::Quiet => Ok(runs
                .iter()
                .map(|r| r.run_id.to_string())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                if runs.is_empty() {
                    return Ok(self.colorize("No runs recorded.", "yellow"));
                }
                let mut builder = Builder::default();
                builder.push_record(["Run", "Mode", "Started", "Total", "Filed", "Unclear", "Failed"]);
                for run in runs {
                    builder.push_record([
                        run.run_id.to_string(),
                        run.mode.as_str().to_string(),
                        format_timestamp(run.started_at),
                        run.total.to_string(),
                        run.filed.to_string(),
                        run.unclear.to_string(),
                        run.failed.to_string(),
                    ]);
                }
                Ok(self.table(builder))
            }
        }
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    fn table(&self, builder: Builder) -> String {
        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));
        table.to_string()
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "yellow" => text.yellow().to_string(),
            _ => text.to_string(),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn format_timestamp(secs: u64) -> String {
    chrono::DateTime::from_timestamp(secs as i64, 0)
        .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| secs.to_string())
}

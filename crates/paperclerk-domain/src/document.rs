//! Document module - one input file from the inbox

use chrono::NaiveDate;
use std::path::{Path, PathBuf};

pub use crate::id::DocumentId;

/// Where the filename date of a document came from
///
/// All sources are file or container metadata; page text is never consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateSource {
    /// Filesystem birth time
    Created,
    /// Filesystem modification time
    Modified,
    /// `CreationDate` entry of the PDF Info dictionary
    PdfInfo,
}

impl DateSource {
    /// Get the source name as stored in configuration and audit records
    pub fn as_str(&self) -> &'static str {
        match self {
            DateSource::Created => "created",
            DateSource::Modified => "modified",
            DateSource::PdfInfo => "pdf_info",
        }
    }

    /// Parse a source name
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "created" | "file_birthtime" => Some(DateSource::Created),
            "modified" | "mtime" => Some(DateSource::Modified),
            "pdf_info" | "pdf_meta" => Some(DateSource::PdfInfo),
            _ => None,
        }
    }
}

impl std::str::FromStr for DateSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid date source: {}", s))
    }
}

/// The metadata date used as filename prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentDate {
    /// Calendar date
    pub date: NaiveDate,
    /// Which metadata source produced it
    pub source: DateSource,
}

impl DocumentDate {
    /// Format as `YYYY-MM-DD`
    pub fn prefix(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// One input file
///
/// Immutable after the inbox scan; the pipeline never rewrites it, it only
/// moves it once the decision has been recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Unique identifier for this run
    pub id: DocumentId,

    /// Path inside the inbox
    pub source_path: PathBuf,

    /// Size on disk in bytes
    pub size_bytes: u64,

    /// Hex SHA-256 over size and leading content, stable across renames
    pub fingerprint: String,

    /// Metadata date for the filename prefix, if any source yielded one
    pub date: Option<DocumentDate>,
}

impl Document {
    /// Original file name (lossy for non UTF-8 names)
    pub fn file_name(&self) -> String {
        self.source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Lowercased extension including the dot, `.pdf` when absent
    pub fn extension(&self) -> String {
        extension_of(&self.source_path)
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_else(|| ".pdf".to_string())
}

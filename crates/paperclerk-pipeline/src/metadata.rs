//! Document metadata: fingerprint and filename date

use chrono::{DateTime, Local};
use paperclerk_domain::{DateSource, Document, DocumentDate, DocumentId};
use paperclerk_extractor::pdf_info_date;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::SystemTime;
use tracing::debug;

/// Bytes of the file that enter the fingerprint
pub const FINGERPRINT_PREFIX_BYTES: u64 = 5_000_000;

/// SHA-256 over the file size and the first 5 MB, hex encoded
pub fn fingerprint(path: &Path) -> std::io::Result<String> {
    let file = File::open(path)?;
    let size = file.metadata()?.len();

    let mut hasher = Sha256::new();
    hasher.update(size.to_string().as_bytes());
    hasher.update(b"|");

    let mut prefix = Vec::new();
    file.take(FINGERPRINT_PREFIX_BYTES).read_to_end(&mut prefix)?;
    hasher.update(&prefix);

    Ok(hex::encode(hasher.finalize()))
}

/// Date for the file name, from the first source in `sources` that has one
pub fn document_date(path: &Path, sources: &[DateSource]) -> Option<DocumentDate> {
    let metadata = std::fs::metadata(path).ok();
    sources.iter().find_map(|source| {
        let date = match source {
            DateSource::Created => metadata
                .as_ref()
                .and_then(|m| m.created().ok())
                .map(local_date),
            DateSource::Modified => metadata
                .as_ref()
                .and_then(|m| m.modified().ok())
                .map(local_date),
            DateSource::PdfInfo => std::fs::read(path).ok().and_then(|b| pdf_info_date(&b)),
        };
        date.map(|date| DocumentDate {
            date,
            source: *source,
        })
    })
}

fn local_date(time: SystemTime) -> chrono::NaiveDate {
    DateTime::<Local>::from(time).date_naive()
}

/// Build the [`Document`] for an inbox file
///
/// A missing date is not an error here; the resolver refuses to name the
/// document later so the failure is recorded.
pub fn load_document(path: &Path, sources: &[DateSource]) -> std::io::Result<Document> {
    let size_bytes = std::fs::metadata(path)?.len();
    let fingerprint = fingerprint(path)?;
    let date = document_date(path, sources);
    debug!(
        document = %path.display(),
        date = ?date.as_ref().map(DocumentDate::prefix),
        source = ?date.as_ref().map(|d| d.source.as_str()),
        "Loaded document metadata"
    );

    Ok(Document {
        id: DocumentId::new(),
        source_path: path.to_path_buf(),
        size_bytes,
        fingerprint,
        date,
    })
}

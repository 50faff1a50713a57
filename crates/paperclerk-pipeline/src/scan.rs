//! Inbox scanning

use crate::error::PipelineError;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// List the PDF documents currently in `inbox`, sorted
///
/// Hidden resource forks (`._*`), editor lock files (`~*`) and `.DS_Store`
/// are skipped. A missing inbox is an empty inbox.
pub fn scan_inbox(inbox: &Path, recursive: bool) -> Result<Vec<PathBuf>, PipelineError> {
    if !inbox.exists() {
        return Ok(Vec::new());
    }

    let scan_error = |message: String| PipelineError::Scan {
        path: inbox.to_path_buf(),
        message,
    };

    let mut found = Vec::new();
    if recursive {
        for entry in WalkDir::new(inbox).follow_links(false) {
            let entry = entry.map_err(|e| scan_error(e.to_string()))?;
            if entry.file_type().is_file() && is_document(entry.path()) {
                found.push(entry.into_path());
            }
        }
    } else {
        let entries = std::fs::read_dir(inbox).map_err(|e| scan_error(e.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|e| scan_error(e.to_string()))?;
            let is_file = entry
                .file_type()
                .map_err(|e| scan_error(e.to_string()))?
                .is_file();
            if is_file && is_document(&entry.path()) {
                found.push(entry.path());
            }
        }
    }

    found.sort();
    Ok(found)
}

fn is_document(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with("._") || name.starts_with('~') || name == ".DS_Store" {
        return false;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

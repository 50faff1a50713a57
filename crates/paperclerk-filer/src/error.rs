//! Error types for resolving, recording and filing

use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop a document from being filed
///
/// Every variant leaves the document at its inbox path.
#[derive(Error, Debug)]
pub enum FilingError {
    /// No configured metadata source yielded a date
    #[error("No metadata date available for {0}")]
    MissingDate(String),

    /// The destination folder is absent and folder creation is disabled
    #[error("Destination folder does not exist and folder creation is disabled: {0}")]
    FolderMissing(PathBuf),

    /// Every suffix up to the bound is taken
    #[error("Collision suffixes exhausted for {base}{extension} in {folder} (bound {bound})")]
    CollisionResolutionExhausted {
        /// Destination folder
        folder: PathBuf,
        /// Base name without suffix
        base: String,
        /// Extension including the dot
        extension: String,
        /// Highest suffix tried
        bound: u32,
    },

    /// The resolved destination appeared between resolution and the move
    #[error("Destination was taken before the move: {0}")]
    CollisionRace(PathBuf),

    /// Creating the folder or moving the file failed
    #[error("Filesystem error on {path}: {source}")]
    Io {
        /// Path the failed operation touched
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The audit record could not be written
    #[error("Audit store error: {0}")]
    Audit(String),
}

impl FilingError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FilingError::Io {
            path: path.into(),
            source,
        }
    }
}

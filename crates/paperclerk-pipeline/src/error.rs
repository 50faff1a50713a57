//! Error types for the pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop a run before any document is processed
///
/// Failures of individual documents are never errors of the run; they end up
/// as [`DocumentOutcome::Failed`](crate::DocumentOutcome::Failed).
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Failed to read a configuration file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// A configuration value is out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The inbox could not be listed
    #[error("Failed to scan inbox {path}: {message}")]
    Scan {
        /// Inbox directory
        path: PathBuf,
        /// What went wrong
        message: String,
    },
}

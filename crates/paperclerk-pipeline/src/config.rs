//! Aggregate configuration file

use crate::error::PipelineError;
use paperclerk_classifier::ClassifierConfig;
use paperclerk_domain::DateSource;
use paperclerk_extractor::ExtractionConfig;
use paperclerk_filer::NamingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete configuration, one TOML section per component
///
/// ```toml
/// [paths]
/// inbox = "/home/me/Scans/Inbox"
/// archive = "/home/me/Scans/Archive"
///
/// [classification]
/// escalation_threshold = 0.85
///
/// [naming]
/// template = "{date}_{abbrev}"
///
/// [pipeline]
/// workers = 2
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Inbox, archive and store locations
    pub paths: PathsConfig,
    /// Text extraction
    pub extraction: ExtractionConfig,
    /// Staged classification
    pub classification: ClassifierConfig,
    /// Destination naming
    pub naming: NamingConfig,
    /// Run behavior
    pub pipeline: RunConfig,
}

/// Filesystem locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Folder scanned for new documents
    pub inbox: PathBuf,
    /// Root of the archive
    pub archive: PathBuf,
    /// SQLite audit database
    pub audit_db: PathBuf,
    /// Optional sender mapping JSON
    pub sender_mapping: Option<PathBuf>,
    /// Scan the inbox recursively
    pub recursive: bool,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            inbox: PathBuf::from("inbox"),
            archive: PathBuf::from("archive"),
            audit_db: PathBuf::from("paperclerk.db"),
            sender_mapping: None,
            recursive: false,
        }
    }
}

/// Run behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Documents processed concurrently
    pub workers: usize,
    /// Metadata sources for the file name date, in priority order
    pub date_sources: Vec<String>,
    /// Model backend endpoint
    pub model_endpoint: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            date_sources: vec![
                DateSource::Created.as_str().to_string(),
                DateSource::Modified.as_str().to_string(),
            ],
            model_endpoint: "http://localhost:11434".to_string(),
        }
    }
}

impl RunConfig {
    /// Parsed date sources
    pub fn date_sources(&self) -> Result<Vec<DateSource>, String> {
        self.date_sources
            .iter()
            .map(|s| DateSource::parse(s).ok_or_else(|| format!("unknown date source '{}'", s)))
            .collect()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err("workers must be greater than 0".to_string());
        }
        if self.date_sources()?.is_empty() {
            return Err("at least one date source is required".to_string());
        }
        if self.model_endpoint.trim().is_empty() {
            return Err("model_endpoint must be set".to_string());
        }
        Ok(())
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, PipelineError> {
        let config: PipelineConfig = toml::from_str(toml_str)?;
        config.validate().map_err(PipelineError::InvalidConfig)?;
        Ok(config)
    }

    /// Serialize configuration to a TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), String> {
        self.extraction
            .validate()
            .map_err(|e| format!("[extraction] {}", e))?;
        self.classification
            .validate()
            .map_err(|e| format!("[classification] {}", e))?;
        self.naming.validate().map_err(|e| format!("[naming] {}", e))?;
        self.pipeline
            .validate()
            .map_err(|e| format!("[pipeline] {}", e))?;
        Ok(())
    }
}

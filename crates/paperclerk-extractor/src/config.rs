//! Configuration for the Text Extractor

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Placeholder in `ocr_command` replaced by the page image path
pub const IMAGE_PLACEHOLDER: &str = "{image}";

/// Configuration for the Text Extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Minimum non-whitespace characters for a page's text layer to count
    pub min_text_chars_per_page: usize,

    /// Minimum share of alphanumeric characters for a page's text layer to
    /// count; broken font encodings produce long runs of symbols
    pub min_alnum_ratio: f64,

    /// Maximum number of pages of one document sent to OCR
    pub ocr_max_pages: usize,

    /// Maximum time to parse the text layer of one document (seconds)
    pub parse_timeout_secs: u64,

    /// Maximum time for OCR of one page (seconds)
    pub ocr_timeout_secs: u64,

    /// Whether pages with a sparse text layer go to OCR at all
    pub ocr_enabled: bool,

    /// OCR command line; `{image}` is replaced by the page image path and
    /// the recognized text is read from stdout
    pub ocr_command: Vec<String>,
}

impl ExtractionConfig {
    /// Get the text layer timeout as a Duration
    pub fn parse_timeout(&self) -> Duration {
        Duration::from_secs(self.parse_timeout_secs)
    }

    /// Get the per-page OCR timeout as a Duration
    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_secs(self.ocr_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.parse_timeout_secs == 0 {
            return Err("parse_timeout_secs must be greater than 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.min_alnum_ratio) {
            return Err("min_alnum_ratio must be between 0.0 and 1.0".to_string());
        }
        if self.ocr_max_pages == 0 {
            return Err("ocr_max_pages must be greater than 0".to_string());
        }
        if self.ocr_timeout_secs == 0 {
            return Err("ocr_timeout_secs must be greater than 0".to_string());
        }
        if self.ocr_enabled {
            match self.ocr_command.first() {
                None => return Err("ocr_command cannot be empty when OCR is enabled".to_string()),
                Some(program) if program.trim().is_empty() => {
                    return Err("ocr_command program cannot be blank".to_string())
                }
                _ => {}
            }
            if !self.ocr_command.iter().any(|arg| arg.contains(IMAGE_PLACEHOLDER)) {
                return Err(format!(
                    "ocr_command must reference the page image as {}",
                    IMAGE_PLACEHOLDER
                ));
            }
        }
        Ok(())
    }

    /// Text-layer-only preset: never shells out to OCR
    pub fn text_layer_only() -> Self {
        Self {
            ocr_enabled: false,
            ..Self::default()
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_text_chars_per_page: 50,
            min_alnum_ratio: 0.35,
            ocr_max_pages: 5,
            parse_timeout_secs: 60,
            ocr_timeout_secs: 60,
            ocr_enabled: true,
            ocr_command: vec![
                "tesseract".to_string(),
                IMAGE_PLACEHOLDER.to_string(),
                "stdout".to_string(),
            ],
        }
    }
}

//! Classifier configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the Staged Classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Stage-1 confidence below which stage 2 runs
    pub escalation_threshold: f64,

    /// Final confidence below which the label is forced to unclear
    pub acceptance_threshold: f64,

    /// Model identifier of the cheap stage
    pub stage1_model: String,

    /// Model identifier of the escalated stage
    pub stage2_model: String,

    /// Characters of text sent to stage 1
    pub excerpt_chars: usize,

    /// Characters of text sent to stage 2
    pub escalated_excerpt_chars: usize,

    /// Maximum time for one model call (seconds)
    pub model_timeout_secs: u64,

    /// Sampling temperature passed to the backend
    pub temperature: f64,

    /// Maximum known labels listed in the prompt
    pub max_label_hints: usize,
}

impl ClassifierConfig {
    /// Get the model timeout as a Duration
    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("escalation_threshold", self.escalation_threshold),
            ("acceptance_threshold", self.acceptance_threshold),
        ] {
            if value.is_nan() || !(0.0..=1.0).contains(&value) {
                return Err(format!("{} must be between 0.0 and 1.0", name));
            }
        }
        if self.acceptance_threshold > self.escalation_threshold {
            return Err("acceptance_threshold cannot exceed escalation_threshold".to_string());
        }
        if self.stage1_model.trim().is_empty() || self.stage2_model.trim().is_empty() {
            return Err("stage1_model and stage2_model must be set".to_string());
        }
        if self.excerpt_chars == 0 || self.escalated_excerpt_chars == 0 {
            return Err("excerpt sizes must be greater than 0".to_string());
        }
        if self.model_timeout_secs == 0 {
            return Err("model_timeout_secs must be greater than 0".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err("temperature must be between 0.0 and 2.0".to_string());
        }
        Ok(())
    }

    /// Strict preset: escalates more often and accepts less
    pub fn strict() -> Self {
        Self {
            escalation_threshold: 0.90,
            acceptance_threshold: 0.70,
            ..Self::default()
        }
    }

    /// Permissive preset: trusts the cheap model sooner
    pub fn permissive() -> Self {
        Self {
            escalation_threshold: 0.70,
            acceptance_threshold: 0.40,
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

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            escalation_threshold: 0.80,
            acceptance_threshold: 0.50,
            stage1_model: "qwen2.5:1.5b-instruct".to_string(),
            stage2_model: "qwen2.5:7b-instruct".to_string(),
            excerpt_chars: 4_000,
            escalated_excerpt_chars: 12_000,
            model_timeout_secs: 90,
            temperature: 0.0,
            max_label_hints: 300,
        }
    }
}

//! Sender mapping: canonical names, synonyms, folders and abbreviations

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Mapping from classifier labels to archive folders
///
/// Loaded from an optional JSON file:
///
/// ```json
/// {
///   "folders": { "Stadtwerke München": "Stadtwerke" },
///   "synonyms": { "SWM": "Stadtwerke München" },
///   "abbreviations": { "Stadtwerke München": "SWM" }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderMapping {
    /// Canonical sender name to folder name
    pub folders: BTreeMap<String, String>,
    /// Alternative spelling to canonical sender name
    pub synonyms: BTreeMap<String, String>,
    /// Canonical sender name to short template token
    pub abbreviations: BTreeMap<String, String>,
}

/// Where a label is routed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderRoute {
    /// Canonical sender name
    pub canonical: String,
    /// Folder name before sanitization
    pub folder: String,
    /// Abbreviation token, if configured
    pub abbrev: Option<String>,
    /// Whether the canonical name has a folder entry
    pub known: bool,
}

impl SenderMapping {
    /// Parse a mapping from JSON
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("Failed to parse sender mapping: {}", e))
    }

    /// Load a mapping file
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::from_json(&json)
    }

    /// Map a label onto its canonical sender name
    pub fn canonicalize(&self, label: &str) -> String {
        let normalized = normalize(label);
        if let Some(canonical) = self.synonyms.get(&normalized) {
            return canonical.clone();
        }
        self.synonyms
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case(&normalized))
            .map(|(_, canonical)| canonical.clone())
            .unwrap_or(normalized)
    }

    /// Route a label to its folder
    pub fn route(&self, label: &str) -> SenderRoute {
        let canonical = self.canonicalize(label);
        let folder = self.folders.get(&canonical).cloned();
        SenderRoute {
            known: folder.is_some(),
            folder: folder.unwrap_or_else(|| canonical.clone()),
            abbrev: self.abbreviations.get(&canonical).cloned(),
            canonical,
        }
    }

    /// Canonical sender names offered to the model as hints
    pub fn known_labels(&self) -> Vec<String> {
        self.folders.keys().cloned().collect()
    }
}

fn normalize(label: &str) -> String {
    label.split_whitespace().collect::<Vec<_>>().join(" ")
}

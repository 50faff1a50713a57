//! Naming configuration

use serde::{Deserialize, Serialize};

/// Token that must lead every naming template
pub const DATE_TOKEN: &str = "{date}";

const KNOWN_TOKENS: [&str; 4] = ["{date}", "{label}", "{folder}", "{abbrev}"];

/// Configuration for destination folders and file names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// File name template; tokens are `{date}`, `{label}`, `{folder}` and `{abbrev}`
    pub template: String,

    /// Folder that receives unclear documents
    pub unclear_folder: String,

    /// Highest collision suffix tried before giving up
    pub collision_bound: u32,

    /// Create missing destination folders
    pub create_folders: bool,

    /// File labels without a mapping entry under the unclear folder
    pub route_unknown_to_unclear: bool,
}

impl NamingConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.template.starts_with(DATE_TOKEN) {
            return Err(format!("template must start with {}", DATE_TOKEN));
        }
        let mut rest = self.template.as_str();
        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}') else {
                return Err("template has an unterminated token".to_string());
            };
            let token = &rest[open..open + close + 1];
            if !KNOWN_TOKENS.contains(&token) {
                return Err(format!("unknown template token {}", token));
            }
            rest = &rest[open + close + 1..];
        }
        if crate::naming::sanitize_component(&self.unclear_folder) != self.unclear_folder {
            return Err("unclear_folder must be a plain folder name".to_string());
        }
        if self.collision_bound == 0 {
            return Err("collision_bound must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            template: DATE_TOKEN.to_string(),
            unclear_folder: "_Unclear".to_string(),
            collision_bound: 999,
            create_folders: true,
            route_unknown_to_unclear: false,
        }
    }
}

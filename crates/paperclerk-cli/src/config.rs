//! Configuration file location and defaults for the CLI.

use crate::error::{CliError, Result};
use paperclerk_pipeline::PipelineConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory holding the configuration and the audit database.
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
    Ok(home.join(".paperclerk"))
}

/// Default configuration file path.
pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Default configuration with paths below the home directory.
pub fn home_defaults() -> Result<PipelineConfig> {
    let home = dirs::home_dir()
        .ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
    let mut config = PipelineConfig::default();
    config.paths.inbox = home.join("Scans").join("Inbox");
    config.paths.archive = home.join("Scans").join("Archive");
    config.paths.audit_db = config_dir()?.join("audit.db");
    Ok(config)
}

/// Load the configuration.
///
/// An explicitly given file must exist. Without one, the default file is
/// used when present and the home defaults otherwise.
pub fn load(explicit: Option<&Path>) -> Result<PipelineConfig> {
    if let Some(path) = explicit {
        return Ok(PipelineConfig::from_file(path)?);
    }
    let path = default_config_path()?;
    if path.exists() {
        Ok(PipelineConfig::from_file(&path)?)
    } else {
        home_defaults()
    }
}

/// Write `config` to `path`, refusing to overwrite unless `force` is set.
pub fn write(config: &PipelineConfig, path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(CliError::InvalidInput(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let contents = config.to_toml().map_err(CliError::Config)?;
    fs::write(path, contents)?;
    Ok(())
}

//! Init-config command implementation.

use crate::cli::InitConfigArgs;
use crate::config;
use crate::error::Result;
use crate::output::Formatter;
use std::path::Path;

/// Write the default configuration to `target` (or the default location).
pub fn execute_init_config(
    args: InitConfigArgs,
    target: Option<&Path>,
    formatter: &Formatter,
) -> Result<()> {
    let path = match target {
        Some(path) => path.to_path_buf(),
        None => config::default_config_path()?,
    };
    config::write(&config::home_defaults()?, &path, args.force)?;
    println!(
        "{}",
        formatter.success(&format!("Wrote configuration to {}", path.display()))
    );
    Ok(())
}

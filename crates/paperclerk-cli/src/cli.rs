//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Paperclerk - File scanned documents from an inbox into an archive.
#[derive(Debug, Parser)]
#[command(name = "paperclerk")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true, default_value = "table")]
    pub format: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path (default: ~/.paperclerk/config.toml)
    #[arg(short, long, global = true, env = "PAPERCLERK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (identifiers only)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Process every document currently in the inbox
    Run(RunArgs),

    /// List documents filed as unclear
    Review(ReviewArgs),

    /// Show the audit records of a run
    Show(ShowArgs),

    /// List recent runs
    Runs(RunsArgs),

    /// Write a configuration file with the default settings
    InitConfig(InitConfigArgs),
}

/// Arguments for the run command.
#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Compute and record decisions without moving anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Inbox folder (overrides the configuration)
    #[arg(long)]
    pub inbox: Option<PathBuf>,

    /// Archive root (overrides the configuration)
    #[arg(long)]
    pub archive: Option<PathBuf>,

    /// Documents processed concurrently (overrides the configuration)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Scan the inbox recursively
    #[arg(short, long)]
    pub recursive: bool,
}

/// Arguments for the review command.
#[derive(Debug, Parser)]
pub struct ReviewArgs {
    /// Maximum number of records
    #[arg(short, long, default_value = "20")]
    pub limit: usize,
}

/// Arguments for the show command.
#[derive(Debug, Parser)]
pub struct ShowArgs {
    /// Run identifier
    pub run_id: String,
}

/// Arguments for the runs command.
#[derive(Debug, Parser)]
pub struct RunsArgs {
    /// Maximum number of runs
    #[arg(short, long, default_value = "10")]
    pub limit: usize,
}

/// Arguments for the init-config command.
#[derive(Debug, Parser)]
pub struct InitConfigArgs {
    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

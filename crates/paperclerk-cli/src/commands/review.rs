//! Read-back commands: review, show and runs.

use crate::cli::{ReviewArgs, RunsArgs, ShowArgs};
use crate::commands::open_store;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use paperclerk_domain::traits::AuditStore;
use paperclerk_domain::RunId;
use paperclerk_pipeline::PipelineConfig;

/// List the most recent documents filed as unclear.
pub fn execute_review(
    args: ReviewArgs,
    config: &PipelineConfig,
    formatter: &Formatter,
) -> Result<()> {
    let store = open_store(config)?;
    let records = store.unclear_records(args.limit)?;
    println!("{}", formatter.format_records(&records)?);
    Ok(())
}

/// Show every audit record of one run.
pub fn execute_show(
    args: ShowArgs,
    config: &PipelineConfig,
    formatter: &Formatter,
) -> Result<()> {
    let run_id = RunId::from_string(args.run_id.trim()).map_err(CliError::InvalidInput)?;
    let store = open_store(config)?;
    let records = store.records_for_run(run_id)?;
    println!("{}", formatter.format_records(&records)?);
    Ok(())
}

/// List recent runs.
pub fn execute_runs(
    args: RunsArgs,
    config: &PipelineConfig,
    formatter: &Formatter,
) -> Result<()> {
    let store = open_store(config)?;
    let runs = store.runs(args.limit)?;
    println!("{}", formatter.format_runs(&runs)?);
    Ok(())
}

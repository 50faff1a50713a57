//! Run command implementation.

use crate::cli::RunArgs;
use crate::commands::open_store;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use paperclerk_classifier::StagedClassifier;
use paperclerk_domain::RunMode;
use paperclerk_extractor::TextExtractor;
use paperclerk_filer::{DecisionRecorder, PathResolver, SenderMapping};
use paperclerk_llm::OllamaBackend;
use paperclerk_pipeline::{scan_inbox, Pipeline, PipelineConfig};
use tracing::info;

/// Execute the run command.
pub async fn execute_run(
    args: RunArgs,
    mut config: PipelineConfig,
    formatter: &Formatter,
) -> Result<()> {
    apply_overrides(&args, &mut config);
    config.validate().map_err(CliError::Config)?;

    let mapping = match &config.paths.sender_mapping {
        Some(path) => SenderMapping::from_file(path).map_err(CliError::Config)?,
        None => SenderMapping::default(),
    };
    let date_sources = config.pipeline.date_sources().map_err(CliError::Config)?;

    let backend = OllamaBackend::new(config.pipeline.model_endpoint.clone())
        .with_timeout(config.classification.model_timeout())
        .with_temperature(config.classification.temperature);
    let pipeline = Pipeline::new(
        TextExtractor::from_config(config.extraction.clone()),
        StagedClassifier::new(backend, config.classification.clone()),
        PathResolver::new(&config.paths.archive, config.naming.clone(), mapping),
        DecisionRecorder::new(open_store(&config)?),
    )
    .with_workers(config.pipeline.workers)
    .with_date_sources(date_sources);

    let listing = scan_inbox(&config.paths.inbox, config.paths.recursive)?;
    let mode = if args.dry_run {
        RunMode::DryRun
    } else {
        RunMode::Normal
    };
    info!(
        inbox = %config.paths.inbox.display(),
        archive = %config.paths.archive.display(),
        documents = listing.len(),
        "Inbox scanned"
    );

    let report = pipeline.run(&listing, mode).await;
    println!("{}", formatter.format_report(&report)?);
    if report.failed() > 0 {
        eprintln!(
            "{}",
            formatter.warning(&format!(
                "{} document(s) left in the inbox, see 'paperclerk show {}'",
                report.failed(),
                report.run_id
            ))
        );
    }
    Ok(())
}

fn apply_overrides(args: &RunArgs, config: &mut PipelineConfig) {
    if let Some(inbox) = &args.inbox {
        config.paths.inbox = inbox.clone();
    }
    if let Some(archive) = &args.archive {
        config.paths.archive = archive.clone();
    }
    if let Some(workers) = args.workers {
        config.pipeline.workers = workers;
    }
    if args.recursive {
        config.paths.recursive = true;
    }
}

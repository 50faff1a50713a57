//! Paperclerk CLI - File scanned documents from an inbox into an archive.

use clap::Parser;
use paperclerk_cli::{commands, config, Cli, Command, Formatter};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> paperclerk_cli::Result<()> {
    let cli = Cli::parse();

    // Log to stderr; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let formatter = Formatter::new(cli.format, !cli.no_color);

    match cli.command {
        Command::InitConfig(args) => {
            commands::execute_init_config(args, cli.config.as_deref(), &formatter)?;
        }
        Command::Run(args) => {
            let config = config::load(cli.config.as_deref())?;
            commands::execute_run(args, config, &formatter).await?;
        }
        Command::Review(args) => {
            let config = config::load(cli.config.as_deref())?;
            commands::execute_review(args, &config, &formatter)?;
        }
        Command::Show(args) => {
            let config = config::load(cli.config.as_deref())?;
            commands::execute_show(args, &config, &formatter)?;
        }
        Command::Runs(args) => {
            let config = config::load(cli.config.as_deref())?;
            commands::execute_runs(args, &config, &formatter)?;
        }
    }

    Ok(())
}

//! Starline CLI - Main entry point

use clap::Parser;
use starline_cli::{commands, log_defaults, Cli, Commands};
use starline_common::logging::init_logging;
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let defaults = log_defaults(cli.verbose);

    // environment variables take precedence over the flags
    let log_config = match defaults.clone().merge_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: ignoring logging environment: {}", e);
            defaults
        }
    };

    // the CLI still works without logging; the guard flushes the file writer on exit
    let _guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Warning: logging disabled: {}", e);
            None
        }
    };

    if let Err(e) = execute_command(cli.command).await {
        error!(error = %format!("{:#}", e), "Command failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn execute_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Extract { output } => commands::extract::run(output).await,
        Commands::Transform { manifest, output } => commands::transform::run(manifest, output).await,
        Commands::Load { manifest } => commands::load::run(manifest).await,
        Commands::Run => commands::run::run().await,
    }
}

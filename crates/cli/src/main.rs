//! RWA E2E CLI - Main Entry Point
//!
//! Runs browser scenarios against the Real World App, lists them, and
//! manages visual baselines and configuration.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{config, run, visual};
use rwa_e2e::config::DEFAULT_CONFIG_FILE;
use rwa_e2e::E2eConfig;

/// Exit code when the harness itself failed
const EXIT_HARNESS_ERROR: i32 = 2;

/// RWA E2E - browser scenario runner for the Real World App
#[derive(Parser)]
#[command(name = "rwa-e2e")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenarios in a browser
    Run(run::RunArgs),

    /// List scenarios without running them
    List(run::Selection),

    /// Compare captured snapshots against baselines
    Compare {
        /// Percentage of differing pixels tolerated
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Adopt captured snapshots as the new baselines
    UpdateBaselines,

    /// Manage the configuration file
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let code = match dispatch(cli).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            EXIT_HARNESS_ERROR
        }
    };
    std::process::exit(code);
}

/// Ok(false) when scenarios or snapshots failed
async fn dispatch(cli: Cli) -> anyhow::Result<bool> {
    tracing::debug!("Using configuration file {}", cli.config.display());
    match cli.command {
        Commands::Config(cmd) => {
            config::execute(cmd, &cli.config, cli.format)?;
            Ok(true)
        }
        Commands::List(selection) => {
            run::list(selection, cli.format)?;
            Ok(true)
        }
        Commands::Run(args) => {
            let config = E2eConfig::resolve(&cli.config)?;
            run::execute(args, &config, cli.format).await
        }
        Commands::Compare { threshold } => {
            let config = E2eConfig::resolve(&cli.config)?;
            visual::compare(&config, threshold, cli.format)
        }
        Commands::UpdateBaselines => {
            let config = E2eConfig::resolve(&cli.config)?;
            visual::update_baselines(&config)?;
            Ok(true)
        }
    }
}

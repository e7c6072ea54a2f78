//! Configuration file management

use std::path::Path;

use anyhow::{bail, Result};
use clap::Subcommand;

use rwa_e2e::E2eConfig;

use crate::output::{print_json, print_success, OutputFormat};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration, environment overrides applied
    Show,
}

pub fn execute(cmd: ConfigCommands, path: &Path, format: OutputFormat) -> Result<()> {
    match cmd {
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            E2eConfig::default().save(path)?;
            print_success(&format!("Wrote {}", path.display()));
        }
        ConfigCommands::Show => {
            let config = E2eConfig::resolve(path)?;
            match format {
                OutputFormat::Json => print_json(&config),
                OutputFormat::Table => println!("{}", toml::to_string_pretty(&config)?),
            }
        }
    }
    Ok(())
}

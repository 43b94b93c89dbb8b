//! Command-line client for remote device location tracking.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `status` | Show whether tracking is on |
//! | `start` | Start tracking |
//! | `stop` | Stop tracking |
//! | `watch` | Follow the device, polling while tracking is on |
//! | `config` | Manage the configuration file |
//! | `completions` | Generate shell completions |
//!
//! # Environment Variables
//!
//! - `GEOTRACK_URL`, `GEOTRACK_API_KEY`, `GEOTRACK_DEVICE`: override the
//!   configuration file (overridden in turn by the matching flags)
//! - `GEOTRACK_CONFIG`: configuration file path
//! - `NO_COLOR`: disable colored output when set

mod cli;
mod commands;
mod config;
mod format;

use std::io;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use geotrack_core::config::default_config_path;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use config::load_validated;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle completions command early (before tracing init)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "geotrack", &mut io::stdout());
        return Ok(());
    }

    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // Logs go to stderr so stdout stays parseable with --format json
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let no_color = cli.no_color || std::env::var_os("NO_COLOR").is_some();

    match cli.command {
        Commands::Status { format } => {
            let config = load_validated(&config_path, &cli.gateway)?;
            commands::cmd_status(&config, format, no_color).await?;
        }
        Commands::Start => {
            let config = load_validated(&config_path, &cli.gateway)?;
            commands::cmd_start(&config, cli.quiet).await?;
        }
        Commands::Stop => {
            let config = load_validated(&config_path, &cli.gateway)?;
            commands::cmd_stop(&config, cli.quiet).await?;
        }
        Commands::Watch { start, format } => {
            let config = load_validated(&config_path, &cli.gateway)?;
            commands::cmd_watch(&config, start, format, no_color).await?;
        }
        Commands::Config { action } => {
            commands::cmd_config(action, &config_path, &cli.gateway)?;
        }
        Commands::Completions { .. } => unreachable!("handled before tracing init"),
    }

    Ok(())
}

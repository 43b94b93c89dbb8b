//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Connection settings that override the configuration file
#[derive(Debug, Clone, Default, Args)]
pub struct GatewayArgs {
    /// Base URL of the tracking service
    #[arg(long, global = true, env = "GEOTRACK_URL")]
    pub url: Option<String>,

    /// API key sent with every request
    #[arg(long, global = true, env = "GEOTRACK_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Identifier of the tracked device
    #[arg(short, long, global = true, env = "GEOTRACK_DEVICE")]
    pub device: Option<String>,
}

#[derive(Parser)]
#[command(name = "geotrack")]
#[command(author, version, about = "Client for remote device location tracking", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true, env = "GEOTRACK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(flatten)]
    pub gateway: GatewayArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show whether tracking is on for the device
    Status {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Start tracking the device
    Start,

    /// Stop tracking the device
    Stop,

    /// Follow the device's location, polling while tracking is on
    ///
    /// Type `start`, `stop` or `quit` followed by Enter to control tracking.
    Watch {
        /// Start tracking after reconciling
        #[arg(long)]
        start: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum ConfigAction {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration
    Show,

    /// Print the configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_watch_with_global_overrides() {
        let cli = Cli::try_parse_from([
            "geotrack",
            "watch",
            "--start",
            "--format",
            "json",
            "--url",
            "http://tracker.local",
            "--device",
            "truck-7",
        ])
        .unwrap();

        assert_eq!(cli.gateway.url.as_deref(), Some("http://tracker.local"));
        assert_eq!(cli.gateway.device.as_deref(), Some("truck-7"));
        match cli.command {
            Commands::Watch { start, format } => {
                assert!(start);
                assert_eq!(format, OutputFormat::Json);
            }
            _ => panic!("expected watch"),
        }
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["geotrack", "-v", "-q", "status"]).is_err());
    }

    #[test]
    fn test_parse_config_init() {
        let cli = Cli::try_parse_from(["geotrack", "config", "init", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Init { force: true }
            }
        ));
    }
}

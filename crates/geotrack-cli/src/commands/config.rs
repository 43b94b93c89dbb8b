//! Config command implementation.

use std::path::Path;

use anyhow::{Result, bail};
use geotrack_core::Config;

use crate::cli::{ConfigAction, GatewayArgs};
use crate::config::load_config;

pub fn cmd_config(action: ConfigAction, path: &Path, overrides: &GatewayArgs) -> Result<()> {
    match action {
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                bail!(
                    "Config file already exists at {} (use --force to overwrite)",
                    path.display()
                );
            }
            Config::default().save(path)?;
            println!("Wrote default configuration to {}", path.display());
            println!("Set gateway.api_key before connecting.");
        }
        ConfigAction::Show => {
            let config = load_config(path, overrides)?;
            print!("{}", render_config(&config)?);
        }
        ConfigAction::Path => {
            println!("{}", path.display());
        }
    }
    Ok(())
}

/// Render the effective configuration as TOML with the API key masked.
fn render_config(config: &Config) -> Result<String> {
    let mut shown = config.clone();
    shown.gateway.api_key = config.gateway.masked_api_key();
    Ok(toml::to_string_pretty(&shown)?)
}

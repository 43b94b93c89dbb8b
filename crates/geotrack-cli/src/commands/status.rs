//! Status command implementation.

use anyhow::{Context, Result};
use geotrack_core::{Config, DeviceGateway, HttpGateway};

use crate::cli::OutputFormat;
use crate::format::{format_status_json, format_status_text};

pub async fn cmd_status(config: &Config, format: OutputFormat, no_color: bool) -> Result<()> {
    let gateway = HttpGateway::from_config(&config.gateway)?;
    let state = gateway
        .get_status()
        .await
        .context("Failed to read tracking status")?;

    let content = match format {
        OutputFormat::Text => format_status_text(gateway.device_id(), state, no_color),
        OutputFormat::Json => format_status_json(gateway.device_id(), state)?,
    };
    print!("{}", content);
    Ok(())
}

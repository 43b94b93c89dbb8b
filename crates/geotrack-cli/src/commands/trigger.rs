//! Start and stop commands.

use anyhow::{Result, anyhow};
use geotrack_core::{Config, Controller, Error, GatewayError, HttpGateway};

pub async fn cmd_start(config: &Config, quiet: bool) -> Result<()> {
    let controller = Controller::new(HttpGateway::from_config(&config.gateway)?);
    controller
        .start_tracking()
        .await
        .map_err(|e| command_error("start", e))?;
    if !quiet {
        println!("Tracking started for {}", controller.device_id());
    }
    Ok(())
}

pub async fn cmd_stop(config: &Config, quiet: bool) -> Result<()> {
    let controller = Controller::new(HttpGateway::from_config(&config.gateway)?);
    controller
        .stop_tracking()
        .await
        .map_err(|e| command_error("stop", e))?;
    if !quiet {
        println!("Tracking stopped for {}", controller.device_id());
    }
    Ok(())
}

/// Turn a failed command into a user-facing error, leading with the
/// service's reason when it declined.
pub(crate) fn command_error(action: &str, error: Error) -> anyhow::Error {
    match error.as_gateway() {
        Some(GatewayError::Rejected { reason }) => {
            anyhow!("The service declined to {} tracking: {}", action, reason)
        }
        _ => anyhow::Error::new(error).context(format!("Failed to {} tracking", action)),
    }
}

//! Configuration loading for the CLI.
//!
//! The file holds the defaults; `--url`, `--api-key` and `--device` (or their
//! `GEOTRACK_*` environment variables) override it.

use std::path::Path;

use anyhow::{Context, Result};
use geotrack_core::Config;
use tracing::debug;

use crate::cli::GatewayArgs;

/// Load the configuration file, falling back to defaults when it does not
/// exist, and apply command-line overrides. The result is not validated.
pub fn load_config(path: &Path, overrides: &GatewayArgs) -> Result<Config> {
    let mut config = if path.exists() {
        Config::load(path)?
    } else {
        debug!("No config file at {}, using defaults", path.display());
        Config::default()
    };
    apply_overrides(&mut config, overrides);
    Ok(config)
}

/// Like [`load_config`], but fails unless the result is usable for talking
/// to the service.
pub fn load_validated(path: &Path, overrides: &GatewayArgs) -> Result<Config> {
    let config = load_config(path, overrides)?;
    config.validate().with_context(|| {
        format!(
            "Invalid configuration (edit {} or pass --url/--api-key/--device)",
            path.display()
        )
    })?;
    Ok(config)
}

/// Apply command-line overrides on top of file values.
pub fn apply_overrides(config: &mut Config, overrides: &GatewayArgs) {
    if let Some(url) = &overrides.url {
        config.gateway.base_url = url.clone();
    }
    if let Some(api_key) = &overrides.api_key {
        config.gateway.api_key = api_key.clone();
    }
    if let Some(device) = &overrides.device {
        config.gateway.device_id = device.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config(&dir.path().join("none.toml"), &GatewayArgs::default()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_overrides_win_over_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[gateway]\nbase_url = \"http://file.local\"\napi_key = \"file-key\"\ndevice_id = \"file-device\"\n",
        )
        .unwrap();

        let overrides = GatewayArgs {
            url: None,
            api_key: Some("flag-key".to_string()),
            device: Some("flag-device".to_string()),
        };
        let config = load_config(&path, &overrides).unwrap();

        assert_eq!(config.gateway.base_url, "http://file.local");
        assert_eq!(config.gateway.api_key, "flag-key");
        assert_eq!(config.gateway.device_id, "flag-device");
    }

    #[test]
    fn test_load_validated_requires_api_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        assert!(load_validated(&path, &GatewayArgs::default()).is_err());

        let overrides = GatewayArgs {
            api_key: Some("secret".to_string()),
            ..Default::default()
        };
        assert!(load_validated(&path, &overrides).is_ok());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[gateway\n").unwrap();

        assert!(load_config(&path, &GatewayArgs::default()).is_err());
    }
}

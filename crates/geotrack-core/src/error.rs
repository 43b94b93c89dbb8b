//! Error types for geotrack-core.
//!
//! # Error taxonomy
//!
//! | Error | Raised by | Controller reaction |
//! |-------|-----------|---------------------|
//! | [`GatewayError::Communication`] | any remote call | recorded as `last_error`; polling retries on the next tick |
//! | [`GatewayError::Rejected`] | start/stop commands | surfaced to the caller; no state change |
//! | [`GatewayError::InvalidUrl`] | client construction | fix configuration and restart |
//!
//! A `403` from the data endpoint is not an error at all: it is reported as
//! [`crate::gateway::DataOutcome::Forbidden`] and switches tracking off.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors returned by a [`crate::DeviceGateway`].
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum GatewayError {
    /// Transport failure, timeout, undecodable body, or an unclassified
    /// non-success status.
    #[error("Communication with {url} failed: {message}")]
    Communication {
        /// The URL that was requested.
        url: String,
        /// HTTP status, if a response was received.
        status: Option<u16>,
        /// Description of the failure.
        message: String,
    },

    /// The remote service explicitly declined a trigger command.
    #[error("Request rejected: {reason}")]
    Rejected {
        /// Reason given by the remote service.
        reason: String,
    },

    /// The configured base URL cannot be used.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl GatewayError {
    /// Build a communication error with no HTTP status.
    pub fn communication(url: impl Into<String>, message: impl Into<String>) -> Self {
        GatewayError::Communication {
            url: url.into(),
            status: None,
            message: message.into(),
        }
    }

    /// Build a rejection with the given reason.
    pub fn rejected(reason: impl Into<String>) -> Self {
        GatewayError::Rejected {
            reason: reason.into(),
        }
    }

    /// Classify this error for the session's `last_error` field.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Rejected { .. } => ErrorKind::Rejected,
            GatewayError::Communication { .. } | GatewayError::InvalidUrl(_) => {
                ErrorKind::Communication
            }
        }
    }
}

/// Coarse classification of a failure, exposed to presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The remote service could not be reached or answered unexpectedly.
    Communication,
    /// The remote service declined a command.
    Rejected,
}

/// Errors that can occur in geotrack-core.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A remote call failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Startup reconciliation was requested a second time.
    #[error("Trigger state has already been reconciled")]
    AlreadyReconciled,

    /// The controller has been shut down.
    #[error("Controller has been shut down")]
    Shutdown,
}

impl Error {
    /// The gateway error behind this error, if any.
    pub fn as_gateway(&self) -> Option<&GatewayError> {
        match self {
            Error::Gateway(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type alias using geotrack-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_classification() {
        assert_eq!(
            GatewayError::communication("http://x", "timed out").kind(),
            ErrorKind::Communication
        );
        assert_eq!(
            GatewayError::rejected("already active").kind(),
            ErrorKind::Rejected
        );
        assert_eq!(
            GatewayError::InvalidUrl("nope".into()).kind(),
            ErrorKind::Communication
        );
    }

    #[test]
    fn test_error_display() {
        let err = GatewayError::Communication {
            url: "http://localhost:8080/api/devices/device_1/data".into(),
            status: Some(502),
            message: "Bad Gateway".into(),
        };
        let display = err.to_string();
        assert!(display.contains("/api/devices/device_1/data"));
        assert!(display.contains("Bad Gateway"));

        let err = Error::from(GatewayError::rejected("already active"));
        assert_eq!(err.to_string(), "Request rejected: already active");
        assert!(err.as_gateway().is_some());
        assert!(Error::Shutdown.as_gateway().is_none());
    }
}

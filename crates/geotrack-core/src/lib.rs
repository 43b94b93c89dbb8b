//! Gateway client and trigger synchronization for remote device tracking.
//!
//! This crate keeps a local view of a tracked device in sync with a remote
//! tracking service. The remote side owns a per-device *trigger*: while it is
//! on, the device reports location fixes that can be fetched from the service.
//!
//! # Features
//!
//! - **Gateway client**: status, data, start and stop calls over HTTP with an
//!   API key header ([`HttpGateway`], behind the default `http` feature)
//! - **Startup reconciliation**: adopt the remote trigger state once at startup
//! - **Commands**: start and stop tracking with remote confirmation
//! - **Polling**: fetch samples every 5 seconds while tracking is on, with
//!   late results from a previous tracking episode discarded
//! - **Observation**: [`watch`](tokio::sync::watch) snapshots and broadcast
//!   [`TrackerEvent`]s
//! - **Configuration**: TOML file with validation ([`Config`])
//! - **Testing**: an in-memory [`MockGateway`]
//!
//! # Quick Start
//!
//! ```no_run
//! use geotrack_core::{Controller, HttpGateway};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gateway = HttpGateway::new("http://localhost:8080", "secret", "device_1")?;
//!     let controller = Controller::new(gateway);
//!
//!     // Adopt whatever the service says
//!     let state = controller.reconcile().await?;
//!     println!("Tracking is {}", state);
//!
//!     controller.start_tracking().await?;
//!     tokio::time::sleep(std::time::Duration::from_secs(6)).await;
//!
//!     let snapshot = controller.snapshot();
//!     println!("{} samples", snapshot.samples.len());
//!
//!     controller.stop_tracking().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod gateway;
#[cfg(feature = "http")]
pub mod http_gateway;
pub mod mock;
pub mod session;

// Core exports
pub use config::{Config, ConfigError, GatewayConfig, PollingConfig, ValidationError};
pub use controller::{Controller, ControllerOptions, DEFAULT_POLL_INTERVAL};
pub use error::{Error, ErrorKind, GatewayError, Result};
pub use events::{EventDispatcher, EventReceiver, EventSender, TrackerEvent, TransitionCause};
pub use gateway::{DataOutcome, DeviceGateway, GatewayResult};
#[cfg(feature = "http")]
pub use http_gateway::{API_KEY_HEADER, HttpGateway};
pub use mock::{MockGateway, MockGatewayBuilder};
pub use session::{LastError, SessionSnapshot};

// Re-export from geotrack-types
pub use geotrack_types::{LocationSample, TriggerState, map_center};

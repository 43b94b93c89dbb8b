//! Trait abstraction over the remote device gateway.
//!
//! [`DeviceGateway`] is the seam between the controller and the remote
//! service. [`crate::http_gateway::HttpGateway`] talks to the real service;
//! [`crate::mock::MockGateway`] stands in for it in tests.

use async_trait::async_trait;

use geotrack_types::{LocationSample, TriggerState};

use crate::error::GatewayError;

/// Result type for gateway operations.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Outcome of a successful data request.
#[derive(Debug, Clone, PartialEq)]
pub enum DataOutcome {
    /// The samples the remote service currently holds.
    Samples(Vec<LocationSample>),
    /// The remote service refused access to the data, meaning tracking is not
    /// active. This is a state signal, not an error.
    Forbidden,
}

/// The four remote operations the controller relies on.
///
/// Implementations attach the credential and the device identifier they
/// were constructed with to every call. They never retry and never interpret
/// the trigger state beyond passing it through.
///
/// # Example
///
/// ```ignore
/// use geotrack_core::DeviceGateway;
///
/// async fn print_status<G: DeviceGateway>(gateway: &G) {
///     match gateway.get_status().await {
///         Ok(state) => println!("{}: {}", gateway.device_id(), state),
///         Err(e) => eprintln!("status unavailable: {}", e),
///     }
/// }
/// ```
#[async_trait]
pub trait DeviceGateway: Send + Sync {
    /// The identifier of the device this gateway talks about.
    fn device_id(&self) -> &str;

    /// Read whether tracking is currently triggered.
    async fn get_status(&self) -> GatewayResult<TriggerState>;

    /// Fetch the accumulated location samples.
    async fn get_data(&self) -> GatewayResult<DataOutcome>;

    /// Ask the remote service to start tracking.
    async fn start_trigger(&self) -> GatewayResult<()>;

    /// Ask the remote service to stop tracking.
    async fn stop_trigger(&self) -> GatewayResult<()>;
}

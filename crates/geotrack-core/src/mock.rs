//! Mock gateway implementation for testing.
//!
//! [`MockGateway`] simulates the remote service in memory so the controller
//! can be exercised without a network.
//!
//! # Features
//!
//! - **Remote trigger simulation**: start/stop flip a simulated remote flag;
//!   data requests return `Forbidden` while it is off
//! - **Failure injection**: make status, start or stop fail with a chosen error
//! - **Scripted data**: queue one-off data outcomes ahead of the default
//! - **Held requests**: park status or data requests until released, to test
//!   results that arrive late
//! - **Call counting** for every operation
//!
//! Clones share state, so a test can keep one clone while the controller owns
//! another.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, watch};

use geotrack_types::{LocationSample, TriggerState};

use crate::error::GatewayError;
use crate::gateway::{DataOutcome, DeviceGateway, GatewayResult};

/// A mock remote gateway for testing.
///
/// # Example
///
/// ```
/// use geotrack_core::{DataOutcome, DeviceGateway, MockGateway};
/// use geotrack_types::TriggerState;
///
/// #[tokio::main]
/// async fn main() {
///     let gateway = MockGateway::new("device_1");
///     assert_eq!(gateway.get_status().await.unwrap(), TriggerState::Off);
///
///     gateway.start_trigger().await.unwrap();
///     assert!(matches!(gateway.get_data().await, Ok(DataOutcome::Samples(_))));
/// }
/// ```
#[derive(Clone)]
pub struct MockGateway {
    inner: Arc<MockState>,
}

struct MockState {
    device_id: String,
    remote_triggered: AtomicBool,
    samples: Mutex<Vec<LocationSample>>,
    scripted_data: Mutex<VecDeque<GatewayResult<DataOutcome>>>,
    status_failure: Mutex<Option<GatewayError>>,
    start_failure: Mutex<Option<GatewayError>>,
    stop_failure: Mutex<Option<GatewayError>>,
    /// `true` while status requests may complete.
    status_gate: watch::Sender<bool>,
    /// `true` while data requests may complete.
    data_gate: watch::Sender<bool>,
    status_calls: AtomicU32,
    data_calls: AtomicU32,
    start_calls: AtomicU32,
    stop_calls: AtomicU32,
}

impl std::fmt::Debug for MockGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockGateway")
            .field("device_id", &self.inner.device_id)
            .field("remote_triggered", &self.is_remote_triggered())
            .finish_non_exhaustive()
    }
}

impl MockGateway {
    /// Create a mock whose remote trigger is off and which holds no samples.
    pub fn new(device_id: &str) -> Self {
        Self::with_state(device_id, false, Vec::new())
    }

    fn with_state(device_id: &str, triggered: bool, samples: Vec<LocationSample>) -> Self {
        let (status_gate, _) = watch::channel(true);
        let (data_gate, _) = watch::channel(true);
        Self {
            inner: Arc::new(MockState {
                device_id: device_id.to_string(),
                remote_triggered: AtomicBool::new(triggered),
                samples: Mutex::new(samples),
                scripted_data: Mutex::new(VecDeque::new()),
                status_failure: Mutex::new(None),
                start_failure: Mutex::new(None),
                stop_failure: Mutex::new(None),
                status_gate,
                data_gate,
                status_calls: AtomicU32::new(0),
                data_calls: AtomicU32::new(0),
                start_calls: AtomicU32::new(0),
                stop_calls: AtomicU32::new(0),
            }),
        }
    }

    /// Create a builder for configuring the mock.
    pub fn builder(device_id: &str) -> MockGatewayBuilder {
        MockGatewayBuilder::new(device_id)
    }

    // --- Remote state ---

    /// Whether the simulated remote trigger is set.
    pub fn is_remote_triggered(&self) -> bool {
        self.inner.remote_triggered.load(Ordering::SeqCst)
    }

    /// Set the simulated remote trigger out-of-band.
    pub fn set_remote_triggered(&self, triggered: bool) {
        self.inner.remote_triggered.store(triggered, Ordering::SeqCst);
    }

    /// Replace the samples returned while the trigger is on.
    pub async fn set_samples(&self, samples: Vec<LocationSample>) {
        *self.inner.samples.lock().await = samples;
    }

    /// Queue a one-off data outcome, served before the default behavior.
    pub async fn push_data(&self, outcome: GatewayResult<DataOutcome>) {
        self.inner.scripted_data.lock().await.push_back(outcome);
    }

    // --- Failure injection ---

    /// Make status requests fail with `error` (or succeed again with `None`).
    pub async fn fail_status(&self, error: Option<GatewayError>) {
        *self.inner.status_failure.lock().await = error;
    }

    /// Make start requests fail with `error` (or succeed again with `None`).
    pub async fn fail_start(&self, error: Option<GatewayError>) {
        *self.inner.start_failure.lock().await = error;
    }

    /// Make stop requests fail with `error` (or succeed again with `None`).
    pub async fn fail_stop(&self, error: Option<GatewayError>) {
        *self.inner.stop_failure.lock().await = error;
    }

    // --- Held requests ---

    /// Park status requests until [`release_status`](Self::release_status)
    /// is called.
    pub fn hold_status(&self) {
        self.inner.status_gate.send_replace(false);
    }

    /// Let parked and future status requests complete.
    pub fn release_status(&self) {
        self.inner.status_gate.send_replace(true);
    }

    /// Park data requests until [`release_data`](Self::release_data) is called.
    pub fn hold_data(&self) {
        self.inner.data_gate.send_replace(false);
    }

    /// Let parked and future data requests complete.
    pub fn release_data(&self) {
        self.inner.data_gate.send_replace(true);
    }

    // --- Call counts ---

    /// Number of status requests received.
    pub fn status_calls(&self) -> u32 {
        self.inner.status_calls.load(Ordering::SeqCst)
    }

    /// Number of data requests received (including parked ones).
    pub fn data_calls(&self) -> u32 {
        self.inner.data_calls.load(Ordering::SeqCst)
    }

    /// Number of start requests received.
    pub fn start_calls(&self) -> u32 {
        self.inner.start_calls.load(Ordering::SeqCst)
    }

    /// Number of stop requests received.
    pub fn stop_calls(&self) -> u32 {
        self.inner.stop_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceGateway for MockGateway {
    fn device_id(&self) -> &str {
        &self.inner.device_id
    }

    async fn get_status(&self) -> GatewayResult<TriggerState> {
        self.inner.status_calls.fetch_add(1, Ordering::SeqCst);
        // Answer with the state at request time, as a delayed response would
        let triggered = self.is_remote_triggered();

        let mut gate = self.inner.status_gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        if let Some(error) = self.inner.status_failure.lock().await.clone() {
            return Err(error);
        }
        Ok(TriggerState::from(triggered))
    }

    async fn get_data(&self) -> GatewayResult<DataOutcome> {
        self.inner.data_calls.fetch_add(1, Ordering::SeqCst);

        let mut gate = self.inner.data_gate.subscribe();
        // The sender lives in `inner`, so the channel cannot close here.
        let _ = gate.wait_for(|open| *open).await;

        if let Some(outcome) = self.inner.scripted_data.lock().await.pop_front() {
            return outcome;
        }
        if !self.is_remote_triggered() {
            return Ok(DataOutcome::Forbidden);
        }
        Ok(DataOutcome::Samples(self.inner.samples.lock().await.clone()))
    }

    async fn start_trigger(&self) -> GatewayResult<()> {
        self.inner.start_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.inner.start_failure.lock().await.clone() {
            return Err(error);
        }
        if self.inner.remote_triggered.swap(true, Ordering::SeqCst) {
            return Err(GatewayError::rejected("already active"));
        }
        Ok(())
    }

    async fn stop_trigger(&self) -> GatewayResult<()> {
        self.inner.stop_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.inner.stop_failure.lock().await.clone() {
            return Err(error);
        }
        if !self.inner.remote_triggered.swap(false, Ordering::SeqCst) {
            return Err(GatewayError::rejected("not active"));
        }
        Ok(())
    }
}

/// Builder for creating mock gateways with custom settings.
#[derive(Debug)]
pub struct MockGatewayBuilder {
    device_id: String,
    triggered: bool,
    samples: Vec<LocationSample>,
}

impl MockGatewayBuilder {
    /// Create a new builder with defaults.
    pub fn new(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            triggered: false,
            samples: Vec::new(),
        }
    }

    /// Set the initial remote trigger state.
    #[must_use]
    pub fn triggered(mut self, triggered: bool) -> Self {
        self.triggered = triggered;
        self
    }

    /// Set the samples returned while the trigger is on.
    #[must_use]
    pub fn samples(mut self, samples: Vec<LocationSample>) -> Self {
        self.samples = samples;
        self
    }

    /// Build the mock gateway.
    pub fn build(self) -> MockGateway {
        MockGateway::with_state(&self.device_id, self.triggered, self.samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn sample(lat: f64) -> LocationSample {
        LocationSample::new("device_1", lat, 77.59, OffsetDateTime::UNIX_EPOCH)
    }

    #[tokio::test]
    async fn test_mock_trigger_lifecycle() {
        let gateway = MockGateway::new("device_1");
        assert_eq!(gateway.get_status().await.unwrap(), TriggerState::Off);
        assert_eq!(gateway.get_data().await.unwrap(), DataOutcome::Forbidden);

        gateway.start_trigger().await.unwrap();
        assert_eq!(gateway.get_status().await.unwrap(), TriggerState::On);

        let err = gateway.start_trigger().await.unwrap_err();
        assert_eq!(err, GatewayError::rejected("already active"));

        gateway.stop_trigger().await.unwrap();
        let err = gateway.stop_trigger().await.unwrap_err();
        assert_eq!(err, GatewayError::rejected("not active"));

        assert_eq!(gateway.start_calls(), 2);
        assert_eq!(gateway.stop_calls(), 2);
        assert_eq!(gateway.status_calls(), 2);
    }

    #[tokio::test]
    async fn test_builder_sets_samples_and_trigger() {
        let gateway = MockGateway::builder("device_1")
            .triggered(true)
            .samples(vec![sample(12.97)])
            .build();

        match gateway.get_data().await.unwrap() {
            DataOutcome::Samples(samples) => assert_eq!(samples, vec![sample(12.97)]),
            other => panic!("expected samples, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_scripted_data_served_first() {
        let gateway = MockGateway::builder("device_1").triggered(true).build();
        gateway
            .push_data(Err(GatewayError::communication("mock://", "boom")))
            .await;

        assert!(gateway.get_data().await.is_err());
        assert_eq!(gateway.get_data().await.unwrap(), DataOutcome::Samples(vec![]));
        assert_eq!(gateway.data_calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let gateway = MockGateway::new("device_1");
        gateway
            .fail_status(Some(GatewayError::communication("mock://", "down")))
            .await;
        assert!(gateway.get_status().await.is_err());

        gateway.fail_status(None).await;
        assert!(gateway.get_status().await.is_ok());

        gateway
            .fail_start(Some(GatewayError::rejected("not found")))
            .await;
        assert_eq!(
            gateway.start_trigger().await.unwrap_err(),
            GatewayError::rejected("not found")
        );
        assert!(!gateway.is_remote_triggered());
    }

    #[tokio::test]
    async fn test_held_data_completes_after_release() {
        let gateway = MockGateway::builder("device_1").triggered(true).build();
        gateway.hold_data();

        let pending = tokio::spawn({
            let gateway = gateway.clone();
            async move { gateway.get_data().await }
        });
        tokio::task::yield_now().await;
        assert_eq!(gateway.data_calls(), 1);
        assert!(!pending.is_finished());

        gateway.release_data();
        assert!(pending.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_held_status_answers_with_state_at_request() {
        let gateway = MockGateway::new("device_1");
        gateway.hold_status();

        let pending = tokio::spawn({
            let gateway = gateway.clone();
            async move { gateway.get_status().await }
        });
        tokio::task::yield_now().await;
        assert_eq!(gateway.status_calls(), 1);

        gateway.set_remote_triggered(true);
        gateway.release_status();
        assert_eq!(pending.await.unwrap(), Ok(TriggerState::Off));
    }
}

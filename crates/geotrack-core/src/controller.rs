//! Trigger synchronization controller.
//!
//! The [`Controller`] is the single authority over the local [`TriggerState`]
//! and the poll loop. It reconciles the local state with the remote service
//! at startup, executes start/stop commands, and while tracking is on polls
//! the data endpoint on a fixed cadence.
//!
//! ```text
//!         reconcile() = On /
//!         start_tracking() ok           [ON]  -- poll every interval
//!   [OFF] ----------------------------->       -- immediate poll on entry
//!     ^                                   |
//!     |  get_data() = Forbidden           |
//!     |  stop_tracking() ok               |
//!     |  shutdown()                       |
//!     +-----------------------------------+
//! ```
//!
//! Every trigger change goes through one transition routine, which starts the
//! poll loop on `Off -> On` and cancels it on `On -> Off` in the same critical
//! section as the state flip. Each change bumps a generation counter; poll
//! results carry the generation they were issued under and are discarded if
//! it is no longer current, so a late response can never resurrect samples
//! or flip the state back.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::{Mutex, watch};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use geotrack_types::TriggerState;

use crate::config::{ConfigError, PollingConfig, ValidationError};
use crate::error::{Error, GatewayError, Result};
use crate::events::{EventDispatcher, EventReceiver, TrackerEvent, TransitionCause};
use crate::gateway::{DataOutcome, DeviceGateway, GatewayResult};
use crate::session::{PollHandle, SessionSnapshot, SyncSession};

/// Default time between poll ticks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Consecutive poll failures logged at `warn` before going quiet.
const LOUD_FAILURES: u32 = 3;

/// Options for the controller.
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Time between poll ticks while tracking is on.
    pub poll_interval: Duration,
    /// Buffer size of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            event_capacity: 100,
        }
    }
}

impl ControllerOptions {
    /// Set the poll interval.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the event channel capacity.
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Validate the options.
    ///
    /// Checks that `poll_interval` and `event_capacity` are non-zero.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        if self.poll_interval.is_zero() {
            errors.push(ValidationError {
                field: "poll_interval".to_string(),
                message: "poll interval must be > 0".to_string(),
            });
        }
        if self.event_capacity == 0 {
            errors.push(ValidationError {
                field: "event_capacity".to_string(),
                message: "event capacity must be > 0".to_string(),
            });
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors).into())
        }
    }
}

impl From<&PollingConfig> for ControllerOptions {
    fn from(config: &PollingConfig) -> Self {
        Self::default().poll_interval(config.interval())
    }
}

/// Synchronizes local tracking state with the remote service.
///
/// Dropping the controller (or calling [`shutdown`](Self::shutdown)) stops
/// any active poll loop.
///
/// # Example
///
/// ```no_run
/// use geotrack_core::{Controller, HttpGateway};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let gateway = HttpGateway::new("http://localhost:8080", "secret", "device_1")?;
/// let controller = Controller::new(gateway);
///
/// controller.reconcile().await?;
/// if !controller.trigger_state().is_on() {
///     controller.start_tracking().await?;
/// }
///
/// let mut updates = controller.subscribe();
/// while updates.changed().await.is_ok() {
///     let snapshot = updates.borrow_and_update().clone();
///     println!("{} samples", snapshot.samples.len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct Controller<G: DeviceGateway + 'static> {
    shared: Arc<Shared<G>>,
}

struct Shared<G> {
    gateway: G,
    poll_interval: Duration,
    session: Mutex<SyncSession>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    events: EventDispatcher,
    /// Parent of every poll loop's token.
    shutdown: CancellationToken,
    reconciled: AtomicBool,
}

/// What a poll tick did to the session.
enum TickOutcome {
    Applied,
    Failed(GatewayError),
    /// The `On` episode this loop belongs to is over.
    Ended,
}

impl<G: DeviceGateway + 'static> Controller<G> {
    /// Create a controller with default options.
    pub fn new(gateway: G) -> Self {
        Self::build(gateway, ControllerOptions::default())
    }

    /// Create a controller with custom options.
    pub fn with_options(gateway: G, options: ControllerOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self::build(gateway, options))
    }

    fn build(gateway: G, options: ControllerOptions) -> Self {
        let session = SyncSession::default();
        let (snapshot_tx, _) = watch::channel(session.snapshot());
        Self {
            shared: Arc::new(Shared {
                gateway,
                poll_interval: options.poll_interval,
                session: Mutex::new(session),
                snapshot_tx,
                events: EventDispatcher::new(options.event_capacity),
                shutdown: CancellationToken::new(),
                reconciled: AtomicBool::new(false),
            }),
        }
    }

    /// The tracked device's identifier.
    pub fn device_id(&self) -> &str {
        self.shared.gateway.device_id()
    }

    /// The underlying gateway.
    pub fn gateway(&self) -> &G {
        &self.shared.gateway
    }

    /// The configured poll interval.
    pub fn poll_interval(&self) -> Duration {
        self.shared.poll_interval
    }

    /// A copy of the current presentation state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.snapshot_tx.borrow().clone()
    }

    /// The current local trigger state.
    pub fn trigger_state(&self) -> TriggerState {
        self.shared.snapshot_tx.borrow().trigger_state
    }

    /// Subscribe to snapshot updates. A new snapshot is published after every
    /// state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.snapshot_tx.subscribe()
    }

    /// Subscribe to controller events.
    pub fn events(&self) -> EventReceiver {
        self.shared.events.subscribe()
    }

    /// Adopt the remote trigger status as local truth.
    ///
    /// Runs once per controller; later calls return
    /// [`Error::AlreadyReconciled`]. On failure the state stays `Off` and the
    /// error is recorded in the session. If a start or stop command changed
    /// the state while the status request was in flight, the command wins and
    /// the remote answer is ignored.
    pub async fn reconcile(&self) -> Result<TriggerState> {
        self.ensure_running()?;
        if self.shared.reconciled.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyReconciled);
        }

        let device_id = self.device_id();
        let issued_at = self.shared.session.lock().await.generation;
        info!("Reconciling trigger state for {}", device_id);

        let result = self.shared.gateway.get_status().await;

        let mut session = self.shared.session.lock().await;
        self.ensure_running()?;

        match result {
            Ok(remote) => {
                if session.generation == issued_at {
                    self.shared
                        .transition(&mut session, remote, TransitionCause::Reconciliation);
                } else {
                    debug!(
                        "Trigger state for {} changed during reconciliation, keeping {}",
                        device_id, session.trigger_state
                    );
                }
                let state = session.trigger_state;
                self.shared.publish(&session);
                self.shared.events.send(TrackerEvent::Reconciled {
                    device_id: device_id.to_string(),
                    state,
                });
                info!("Trigger state for {} reconciled: {}", device_id, state);
                Ok(state)
            }
            Err(e) => {
                warn!("Failed to reconcile trigger state for {}: {}", device_id, e);
                if session.generation == issued_at {
                    session.record_error(&e);
                    self.shared.publish(&session);
                }
                Err(e.into())
            }
        }
    }

    /// Ask the remote service to start tracking, then switch on locally.
    ///
    /// Does nothing if tracking is already on, so a repeated start never
    /// creates a second poll loop. On failure the state is left unchanged and
    /// the error is returned.
    pub async fn start_tracking(&self) -> Result<()> {
        self.ensure_running()?;
        let device_id = self.device_id();

        if self.shared.session.lock().await.trigger_state.is_on() {
            debug!("Tracking for {} is already on, ignoring start", device_id);
            return Ok(());
        }

        if let Err(e) = self.shared.gateway.start_trigger().await {
            warn!("Start command for {} failed: {}", device_id, e);
            return Err(e.into());
        }

        let mut session = self.shared.session.lock().await;
        self.ensure_running()?;
        self.shared
            .transition(&mut session, TriggerState::On, TransitionCause::StartCommand);
        session.last_error = None;
        self.shared.publish(&session);
        info!("Started tracking {}", device_id);
        Ok(())
    }

    /// Ask the remote service to stop tracking, then switch off locally.
    ///
    /// The command is always forwarded, even when the local state is already
    /// `Off`. On failure the state, samples and poll loop are left unchanged
    /// and the error is returned.
    pub async fn stop_tracking(&self) -> Result<()> {
        self.ensure_running()?;
        let device_id = self.device_id();

        if let Err(e) = self.shared.gateway.stop_trigger().await {
            warn!("Stop command for {} failed: {}", device_id, e);
            return Err(e.into());
        }

        let mut session = self.shared.session.lock().await;
        self.ensure_running()?;
        self.shared
            .transition(&mut session, TriggerState::Off, TransitionCause::StopCommand);
        self.shared.publish(&session);
        info!("Stopped tracking {}", device_id);
        Ok(())
    }

    /// Stop the poll loop and refuse further commands.
    ///
    /// If tracking was on, the session switches to `Off` with cause
    /// [`TransitionCause::Shutdown`] so the published snapshot no longer
    /// reports an active poll loop.
    pub fn shutdown(&self) {
        if self.shared.shutdown.is_cancelled() {
            return;
        }
        debug!("Shutting down controller for {}", self.device_id());
        self.shared.shutdown.cancel();

        // If a command holds the lock, the poll loop releases the session
        // when it observes the cancellation.
        if let Ok(mut session) = self.shared.session.try_lock() {
            self.shared.release_on_shutdown(&mut session);
        }
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }

    fn ensure_running(&self) -> Result<()> {
        if self.shared.shutdown.is_cancelled() {
            Err(Error::Shutdown)
        } else {
            Ok(())
        }
    }
}

impl<G: DeviceGateway + 'static> Drop for Controller<G> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<G: DeviceGateway + 'static> Shared<G> {
    /// Apply a trigger change. The only place a poll loop is started or
    /// cancelled. Returns `false` for `On -> On` and `Off -> Off`.
    fn transition(
        self: &Arc<Self>,
        session: &mut SyncSession,
        to: TriggerState,
        cause: TransitionCause,
    ) -> bool {
        let from = session.trigger_state;
        if from == to {
            return false;
        }

        session.generation += 1;
        session.trigger_state = to;

        match to {
            TriggerState::On => {
                let generation = session.generation;
                let token = self.shutdown.child_token();
                tokio::spawn(poll_loop(Arc::clone(self), generation, token.clone()));
                session.active_poll = Some(PollHandle::new(token, generation));
            }
            TriggerState::Off => {
                if let Some(handle) = session.active_poll.take() {
                    debug!("Cancelling poll loop (generation {})", handle.generation());
                    handle.cancel();
                }
                session.samples.clear();
                session.last_successful_poll_at = None;
            }
        }

        let device_id = self.gateway.device_id();
        info!(
            "Tracking for {} switched {} -> {} ({:?})",
            device_id, from, to, cause
        );
        self.events.send(TrackerEvent::TriggerChanged {
            device_id: device_id.to_string(),
            from,
            to,
            cause,
        });
        true
    }

    fn release_on_shutdown(self: &Arc<Self>, session: &mut SyncSession) {
        if session.trigger_state.is_on() {
            self.transition(session, TriggerState::Off, TransitionCause::Shutdown);
            self.publish(session);
        }
    }

    fn publish(&self, session: &SyncSession) {
        self.snapshot_tx.send_replace(session.snapshot());
    }

    async fn apply_poll_result(
        self: &Arc<Self>,
        generation: u64,
        result: GatewayResult<DataOutcome>,
    ) -> TickOutcome {
        let device_id = self.gateway.device_id();
        let mut session = self.session.lock().await;

        if session.generation != generation {
            debug!(
                "Discarding stale poll result for {} (generation {}, current {})",
                device_id, generation, session.generation
            );
            self.events.send(TrackerEvent::StaleResultDiscarded {
                device_id: device_id.to_string(),
                generation,
            });
            return TickOutcome::Ended;
        }

        match result {
            Ok(DataOutcome::Samples(samples)) => {
                let count = samples.len();
                session.samples = samples;
                session.last_successful_poll_at = Some(OffsetDateTime::now_utc());
                session.last_error = None;
                self.publish(&session);
                debug!("Polled {} sample(s) for {}", count, device_id);
                self.events.send(TrackerEvent::SamplesUpdated {
                    device_id: device_id.to_string(),
                    count,
                });
                TickOutcome::Applied
            }
            Ok(DataOutcome::Forbidden) => {
                info!("Data for {} is forbidden, tracking was stopped remotely", device_id);
                self.transition(&mut session, TriggerState::Off, TransitionCause::Forbidden);
                self.publish(&session);
                TickOutcome::Ended
            }
            Err(e) => {
                session.record_error(&e);
                self.publish(&session);
                self.events.send(TrackerEvent::PollFailed {
                    device_id: device_id.to_string(),
                    message: e.to_string(),
                });
                TickOutcome::Failed(e)
            }
        }
    }
}

/// Poll the data endpoint until the `On` episode `generation` ends.
///
/// The first tick fires immediately. A tick is only scheduled after the
/// previous one's result has been applied.
async fn poll_loop<G: DeviceGateway + 'static>(
    shared: Arc<Shared<G>>,
    generation: u64,
    token: CancellationToken,
) {
    let device_id = shared.gateway.device_id().to_string();
    let mut ticker = interval(shared.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut consecutive_failures = 0u32;

    debug!(
        "Poll loop for {} started (generation {}, every {:?})",
        device_id, generation, shared.poll_interval
    );

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                if shared.shutdown.is_cancelled() {
                    let mut session = shared.session.lock().await;
                    if session.generation == generation {
                        shared.release_on_shutdown(&mut session);
                    }
                }
                break;
            }
            _ = ticker.tick() => {}
        }

        // In-flight calls are not cancelled; a late result is discarded by
        // the generation check instead.
        let result = shared.gateway.get_data().await;

        match shared.apply_poll_result(generation, result).await {
            TickOutcome::Applied => consecutive_failures = 0,
            TickOutcome::Failed(e) => {
                consecutive_failures += 1;
                if consecutive_failures <= LOUD_FAILURES {
                    warn!(
                        "Failed to poll {}: {} (attempt {})",
                        device_id, e, consecutive_failures
                    );
                } else if consecutive_failures == LOUD_FAILURES + 1 {
                    error!(
                        "Failed to poll {} after {} attempts, will continue trying silently",
                        device_id, consecutive_failures
                    );
                } else {
                    debug!("Failed to poll {}: {}", device_id, e);
                }
            }
            TickOutcome::Ended => break,
        }
    }

    debug!(
        "Poll loop for {} stopped (generation {})",
        device_id, generation
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGateway;

    #[test]
    fn test_options_default() {
        let options = ControllerOptions::default();
        assert_eq!(options.poll_interval, Duration::from_secs(5));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_validation() {
        let options = ControllerOptions::default()
            .poll_interval(Duration::ZERO)
            .event_capacity(0);
        match options.validate() {
            Err(Error::Config(ConfigError::Validation(errors))) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_options_from_polling_config() {
        let options = ControllerOptions::from(&PollingConfig { interval_secs: 12 });
        assert_eq!(options.poll_interval, Duration::from_secs(12));
    }

    #[tokio::test(start_paused = true)]
    async fn test_generation_bumps_on_every_transition() {
        let gateway = MockGateway::new("device_1");
        let controller = Controller::new(gateway);

        controller.start_tracking().await.unwrap();
        assert_eq!(controller.shared.session.lock().await.generation, 1);

        // On -> On is not a transition
        controller.start_tracking().await.unwrap();
        assert_eq!(controller.shared.session.lock().await.generation, 1);

        controller.stop_tracking().await.unwrap();
        let session = controller.shared.session.lock().await;
        assert_eq!(session.generation, 2);
        assert!(session.active_poll.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_handle_tracks_current_generation() {
        let controller = Controller::new(MockGateway::new("device_1"));

        controller.start_tracking().await.unwrap();
        controller.stop_tracking().await.unwrap();
        controller.start_tracking().await.unwrap();

        let session = controller.shared.session.lock().await;
        assert_eq!(session.generation, 3);
        assert_eq!(
            session.active_poll.as_ref().map(|h| h.generation()),
            Some(3)
        );
    }

    #[tokio::test]
    async fn test_drop_cancels_poll_loop() {
        let gateway = MockGateway::new("device_1");
        let controller = Controller::new(gateway.clone());
        controller.start_tracking().await.unwrap();

        let token = controller.shared.shutdown.clone();
        drop(controller);
        assert!(token.is_cancelled());
    }
}

//! Tracker event system.
//!
//! The controller publishes a [`TrackerEvent`] for every state transition,
//! poll outcome and discarded stale result. Events are broadcast; slow
//! receivers lose the oldest events rather than blocking the controller.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use geotrack_types::TriggerState;

/// What caused a trigger transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCause {
    /// Startup reconciliation adopted the remote status.
    Reconciliation,
    /// A start command succeeded.
    StartCommand,
    /// A stop command succeeded.
    StopCommand,
    /// The data endpoint reported that tracking is not active.
    Forbidden,
    /// The controller was shut down while tracking.
    Shutdown,
}

/// Events emitted by the controller.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum TrackerEvent {
    /// Startup reconciliation finished.
    Reconciled {
        device_id: String,
        state: TriggerState,
    },
    /// The trigger state changed.
    TriggerChanged {
        device_id: String,
        from: TriggerState,
        to: TriggerState,
        cause: TransitionCause,
    },
    /// A poll replaced the sample list.
    SamplesUpdated { device_id: String, count: usize },
    /// A poll failed; the next tick will try again.
    PollFailed { device_id: String, message: String },
    /// A poll result arrived after its `On` episode ended and was dropped.
    StaleResultDiscarded { device_id: String, generation: u64 },
}

/// Sender for tracker events.
pub type EventSender = broadcast::Sender<TrackerEvent>;

/// Receiver for tracker events.
pub type EventReceiver = broadcast::Receiver<TrackerEvent>;

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: TrackerEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}

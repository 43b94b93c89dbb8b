//! Working state of the synchronization controller.
//!
//! [`SyncSession`] is owned by the controller and only ever mutated while its
//! lock is held. Presentation layers never see it directly; they receive
//! [`SessionSnapshot`] copies through a watch channel.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

use geotrack_types::{LocationSample, TriggerState};

use crate::error::{ErrorKind, GatewayError};

/// The most recent failure recorded by the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastError {
    /// Classification of the failure.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// When the failure was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
}

impl LastError {
    pub(crate) fn from_gateway(error: &GatewayError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            at: OffsetDateTime::now_utc(),
        }
    }
}

/// Handle to the running poll loop of one `On` episode.
#[derive(Debug)]
pub(crate) struct PollHandle {
    token: CancellationToken,
    generation: u64,
}

impl PollHandle {
    pub(crate) fn new(token: CancellationToken, generation: u64) -> Self {
        Self { token, generation }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Stop the poll loop. Takes effect before the next tick is scheduled.
    pub(crate) fn cancel(self) {
        self.token.cancel();
    }
}

/// The controller's working state.
///
/// Invariant: `active_poll` is present if and only if `trigger_state` is
/// [`TriggerState::On`].
#[derive(Debug, Default)]
pub(crate) struct SyncSession {
    pub(crate) trigger_state: TriggerState,
    pub(crate) samples: Vec<LocationSample>,
    pub(crate) last_successful_poll_at: Option<OffsetDateTime>,
    pub(crate) last_error: Option<LastError>,
    /// Incremented on every trigger transition; in-flight results tagged with
    /// an older value are stale.
    pub(crate) generation: u64,
    pub(crate) active_poll: Option<PollHandle>,
}

impl SyncSession {
    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            trigger_state: self.trigger_state,
            samples: self.samples.clone(),
            last_successful_poll_at: self.last_successful_poll_at,
            last_error: self.last_error.clone(),
            polling: self.active_poll.is_some(),
        }
    }

    pub(crate) fn record_error(&mut self, error: &GatewayError) {
        self.last_error = Some(LastError::from_gateway(error));
    }
}

/// Read-only view of the session for presentation layers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Whether tracking is on.
    pub trigger_state: TriggerState,
    /// Samples from the latest successful poll of the current `On` episode.
    pub samples: Vec<LocationSample>,
    /// When the latest successful poll completed.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_successful_poll_at: Option<OffsetDateTime>,
    /// The most recent recorded failure.
    pub last_error: Option<LastError>,
    /// Whether a poll loop is active. Always equal to `trigger_state == On`.
    pub polling: bool,
}

impl SessionSnapshot {
    /// The newest sample by timestamp, if any.
    pub fn latest_sample(&self) -> Option<&LocationSample> {
        self.samples.iter().max_by_key(|s| s.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_off_and_empty() {
        let session = SyncSession::default();
        let snapshot = session.snapshot();

        assert_eq!(snapshot.trigger_state, TriggerState::Off);
        assert!(snapshot.samples.is_empty());
        assert!(snapshot.last_successful_poll_at.is_none());
        assert!(snapshot.last_error.is_none());
        assert!(!snapshot.polling);
    }

    #[test]
    fn test_record_error() {
        let mut session = SyncSession::default();
        session.record_error(&GatewayError::rejected("already active"));

        let error = session.last_error.as_ref().unwrap();
        assert_eq!(error.kind, ErrorKind::Rejected);
        assert!(error.message.contains("already active"));
    }

    #[test]
    fn test_latest_sample() {
        let t0 = OffsetDateTime::UNIX_EPOCH;
        let snapshot = SessionSnapshot {
            samples: vec![
                LocationSample::new("device_1", 1.0, 1.0, t0 + time::Duration::seconds(10)),
                LocationSample::new("device_1", 2.0, 2.0, t0 + time::Duration::seconds(30)),
                LocationSample::new("device_1", 3.0, 3.0, t0 + time::Duration::seconds(20)),
            ],
            ..Default::default()
        };

        assert_eq!(snapshot.latest_sample().unwrap().latitude, 2.0);
        assert!(SessionSnapshot::default().latest_sample().is_none());
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let json = serde_json::to_value(SessionSnapshot::default()).unwrap();
        assert_eq!(json["triggerState"], "off");
        assert_eq!(json["polling"], false);
        assert!(json["lastSuccessfulPollAt"].is_null());
    }
}

//! Core types for tracked device data.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A single location fix reported by the tracked device.
///
/// Samples are immutable once received. Display identity is
/// `(device_id, timestamp)`, but uniqueness is not enforced: two samples
/// with the same timestamp are both kept.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct LocationSample {
    /// Identifier of the device that produced the fix.
    pub device_id: String,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// When the fix was taken.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub timestamp: OffsetDateTime,
}

impl LocationSample {
    /// Create a new sample.
    pub fn new(
        device_id: impl Into<String>,
        latitude: f64,
        longitude: f64,
        timestamp: OffsetDateTime,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            latitude,
            longitude,
            timestamp,
        }
    }
}

/// Whether tracking is active on the remote device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TriggerState {
    /// Tracking is off; nothing is polled.
    #[default]
    Off,
    /// Tracking is on; samples are polled on a fixed cadence.
    On,
}

impl TriggerState {
    /// Returns `true` if tracking is on.
    #[must_use]
    pub fn is_on(self) -> bool {
        matches!(self, TriggerState::On)
    }
}

impl From<bool> for TriggerState {
    fn from(triggered: bool) -> Self {
        if triggered {
            TriggerState::On
        } else {
            TriggerState::Off
        }
    }
}

impl From<TriggerState> for bool {
    fn from(state: TriggerState) -> Self {
        state.is_on()
    }
}

impl fmt::Display for TriggerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerState::Off => write!(f, "off"),
            TriggerState::On => write!(f, "on"),
        }
    }
}

// ==========================================================================
// Wire types
// ==========================================================================

/// Body of a successful status request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StatusResponse {
    /// Whether the device trigger is currently set.
    pub triggered: bool,
}

/// Body of a successful data request.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DataResponse {
    /// Samples accumulated by the remote service.
    #[cfg_attr(feature = "serde", serde(default))]
    pub coordinates: Vec<LocationSample>,
}

/// Body of a trigger start/stop response.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TriggerActionResponse {
    /// Whether the remote service carried out the command.
    pub success: bool,
    /// Optional human-readable detail.
    #[cfg_attr(feature = "serde", serde(default))]
    pub message: Option<String>,
}

// ==========================================================================
// Presentation helpers
// ==========================================================================

/// Center point for a map showing `samples`.
///
/// Returns the arithmetic mean of latitude and longitude, or `(0.0, 0.0)`
/// when there are no samples.
///
/// # Examples
///
/// ```
/// use geotrack_types::{LocationSample, map_center};
/// use time::OffsetDateTime;
///
/// let now = OffsetDateTime::UNIX_EPOCH;
/// let samples = vec![
///     LocationSample::new("device_1", 10.0, 20.0, now),
///     LocationSample::new("device_1", 12.0, 22.0, now),
/// ];
/// assert_eq!(map_center(&samples), (11.0, 21.0));
/// assert_eq!(map_center(&[]), (0.0, 0.0));
/// ```
#[must_use]
pub fn map_center(samples: &[LocationSample]) -> (f64, f64) {
    if samples.is_empty() {
        return (0.0, 0.0);
    }
    let n = samples.len() as f64;
    let (lat_sum, lon_sum) = samples
        .iter()
        .fold((0.0, 0.0), |(lat, lon), s| (lat + s.latitude, lon + s.longitude));
    (lat_sum / n, lon_sum / n)
}

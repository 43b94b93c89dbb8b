//! Output formatting for snapshots and status.

use anyhow::Result;
use geotrack_core::SessionSnapshot;
use geotrack_types::{TriggerState, map_center};
use owo_colors::OwoColorize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Format a timestamp as RFC 3339.
pub fn format_time(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_| at.to_string())
}

/// Format a trigger state as a short colored label.
pub fn format_state(state: TriggerState, no_color: bool) -> String {
    let label = match state {
        TriggerState::On => "ON",
        TriggerState::Off => "OFF",
    };
    if no_color {
        label.to_string()
    } else {
        match state {
            TriggerState::On => label.green().bold().to_string(),
            TriggerState::Off => label.dimmed().to_string(),
        }
    }
}

/// One-line status output.
pub fn format_status_text(device_id: &str, state: TriggerState, no_color: bool) -> String {
    format!("{}: tracking {}\n", device_id, format_state(state, no_color))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusJson<'a> {
    device_id: &'a str,
    trigger_state: TriggerState,
    triggered: bool,
}

/// Status as a JSON line.
pub fn format_status_json(device_id: &str, state: TriggerState) -> Result<String> {
    let json = serde_json::to_string(&StatusJson {
        device_id,
        trigger_state: state,
        triggered: state.is_on(),
    })?;
    Ok(format!("{}\n", json))
}

/// Snapshot as human-readable text.
pub fn format_snapshot_text(device_id: &str, snapshot: &SessionSnapshot, no_color: bool) -> String {
    let mut out = format!(
        "{}: tracking {}, {} sample(s)",
        device_id,
        format_state(snapshot.trigger_state, no_color),
        snapshot.samples.len()
    );

    if let Some(latest) = snapshot.latest_sample() {
        let (lat, lon) = map_center(&snapshot.samples);
        out.push_str(&format!(
            "\n  latest {:.6}, {:.6} at {}\n  center {:.6}, {:.6}",
            latest.latitude,
            latest.longitude,
            format_time(latest.timestamp),
            lat,
            lon
        ));
    }
    if let Some(at) = snapshot.last_successful_poll_at {
        out.push_str(&format!("\n  last poll {}", format_time(at)));
    }
    if let Some(error) = &snapshot.last_error {
        let message = format!("error: {}", error.message);
        if no_color {
            out.push_str(&format!("\n  {}", message));
        } else {
            out.push_str(&format!("\n  {}", message.red()));
        }
    }

    out.push('\n');
    out
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotJson<'a> {
    device_id: &'a str,
    #[serde(flatten)]
    snapshot: &'a SessionSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    map_center: Option<[f64; 2]>,
}

/// Snapshot as a JSON line.
pub fn format_snapshot_json(device_id: &str, snapshot: &SessionSnapshot) -> Result<String> {
    let map_center = (!snapshot.samples.is_empty()).then(|| {
        let (lat, lon) = map_center(&snapshot.samples);
        [lat, lon]
    });
    let json = serde_json::to_string(&SnapshotJson {
        device_id,
        snapshot,
        map_center,
    })?;
    Ok(format!("{}\n", json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geotrack_types::LocationSample;
    use time::macros::datetime;

    fn tracking_snapshot() -> SessionSnapshot {
        SessionSnapshot {
            trigger_state: TriggerState::On,
            samples: vec![
                LocationSample::new("device_1", 10.0, 20.0, datetime!(2024-05-01 10:00 UTC)),
                LocationSample::new("device_1", 12.0, 22.0, datetime!(2024-05-01 10:01 UTC)),
            ],
            last_successful_poll_at: Some(datetime!(2024-05-01 10:01:05 UTC)),
            last_error: None,
            polling: true,
        }
    }

    #[test]
    fn test_status_text() {
        assert_eq!(
            format_status_text("device_1", TriggerState::On, true),
            "device_1: tracking ON\n"
        );
    }

    #[test]
    fn test_status_json() {
        let json = format_status_json("device_1", TriggerState::Off).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["deviceId"], "device_1");
        assert_eq!(value["triggerState"], "off");
        assert_eq!(value["triggered"], false);
    }

    #[test]
    fn test_snapshot_text_includes_latest_and_center() {
        let text = format_snapshot_text("device_1", &tracking_snapshot(), true);
        assert!(text.starts_with("device_1: tracking ON, 2 sample(s)"));
        assert!(text.contains("latest 12.000000, 22.000000 at 2024-05-01T10:01:00Z"));
        assert!(text.contains("center 11.000000, 21.000000"));
        assert!(text.contains("last poll 2024-05-01T10:01:05Z"));
    }

    #[test]
    fn test_snapshot_text_when_idle() {
        let text = format_snapshot_text("device_1", &SessionSnapshot::default(), true);
        assert_eq!(text, "device_1: tracking OFF, 0 sample(s)\n");
    }

    #[test]
    fn test_snapshot_json() {
        let json = format_snapshot_json("device_1", &tracking_snapshot()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["deviceId"], "device_1");
        assert_eq!(value["triggerState"], "on");
        assert_eq!(value["samples"].as_array().unwrap().len(), 2);
        assert_eq!(value["mapCenter"][0], 11.0);
        assert_eq!(value["mapCenter"][1], 21.0);
    }

    #[test]
    fn test_snapshot_json_omits_center_without_samples() {
        let json = format_snapshot_json("device_1", &SessionSnapshot::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value.get("mapCenter").is_none());
    }
}

//! Platform-agnostic types for remote device location tracking.
//!
//! This crate provides the data shared between the gateway client, the
//! synchronization controller and any presentation layer:
//!
//! - [`LocationSample`]: one location fix from the tracked device
//! - [`TriggerState`]: whether tracking is on or off
//! - Wire bodies exchanged with the remote service
//! - [`map_center`] for front ends that draw samples on a map

pub mod types;

pub use types::{
    DataResponse, LocationSample, StatusResponse, TriggerActionResponse, TriggerState, map_center,
};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use time::OffsetDateTime;
    use time::macros::datetime;

    #[test]
    fn test_sample_json_uses_camel_case() {
        let sample = LocationSample::new("device_1", 12.97, 77.59, datetime!(2024-05-01 10:00 UTC));
        let json = serde_json::to_value(&sample).unwrap();

        assert_eq!(json["deviceId"], "device_1");
        assert_eq!(json["latitude"], 12.97);
        assert_eq!(json["longitude"], 77.59);
        assert_eq!(json["timestamp"], "2024-05-01T10:00:00Z");
    }

    #[test]
    fn test_data_response_parses_coordinates() {
        let json = r#"{
            "coordinates": [
                {"deviceId": "device_1", "latitude": 12.97, "longitude": 77.59, "timestamp": "2024-05-01T10:00:00Z"},
                {"deviceId": "device_1", "latitude": 12.98, "longitude": 77.60, "timestamp": "2024-05-01T10:00:00Z"}
            ]
        }"#;
        let response: DataResponse = serde_json::from_str(json).unwrap();

        // Duplicate timestamps are kept
        assert_eq!(response.coordinates.len(), 2);
        assert_eq!(response.coordinates[0].timestamp, response.coordinates[1].timestamp);
        assert_eq!(response.coordinates[1].latitude, 12.98);
    }

    #[test]
    fn test_data_response_missing_coordinates() {
        let response: DataResponse = serde_json::from_str("{}").unwrap();
        assert!(response.coordinates.is_empty());
    }

    #[test]
    fn test_trigger_action_response_without_message() {
        let response: TriggerActionResponse =
            serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(response.success);
        assert_eq!(response.message, None);
    }

    #[test]
    fn test_trigger_state_conversions() {
        assert_eq!(TriggerState::from(true), TriggerState::On);
        assert_eq!(TriggerState::from(false), TriggerState::Off);
        assert!(bool::from(TriggerState::On));
        assert_eq!(TriggerState::default(), TriggerState::Off);
        assert_eq!(TriggerState::On.to_string(), "on");
        assert_eq!(serde_json::to_string(&TriggerState::Off).unwrap(), "\"off\"");
    }

    #[test]
    fn test_map_center_empty() {
        assert_eq!(map_center(&[]), (0.0, 0.0));
    }

    #[test]
    fn test_map_center_single_sample() {
        let sample = LocationSample::new("device_1", 12.97, 77.59, OffsetDateTime::UNIX_EPOCH);
        assert_eq!(map_center(&[sample]), (12.97, 77.59));
    }

    proptest! {
        #[test]
        fn map_center_stays_inside_bounding_box(
            points in prop::collection::vec((-90.0f64..=90.0, -180.0f64..=180.0), 1..50)
        ) {
            let samples: Vec<_> = points
                .iter()
                .map(|&(lat, lon)| LocationSample::new("d", lat, lon, OffsetDateTime::UNIX_EPOCH))
                .collect();
            let (lat, lon) = map_center(&samples);

            let min_lat = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
            let max_lat = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
            let min_lon = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
            let max_lon = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);

            prop_assert!(lat >= min_lat - 1e-9 && lat <= max_lat + 1e-9);
            prop_assert!(lon >= min_lon - 1e-9 && lon <= max_lon + 1e-9);
        }
    }
}

//! Data models for the sensor network: the three-level ownership hierarchy,
//! measurements, and the derived statistics envelopes returned by the engine.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

// ---

/// Top-level owner of gateways, identified by `code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    // ---
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A gateway, owned by exactly one network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Gateway {
    // ---
    pub mac_address: String,
    pub network_code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A sensor, owned by exactly one gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    // ---
    pub mac_address: String,
    pub gateway_mac: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Measured quantity, e.g. "temperature".
    #[serde(default)]
    pub variable: String,
    #[serde(default)]
    pub unit: String,
}

/// Create/update payload for a network.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInput {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Create/update payload for a gateway. The parent network comes from the path.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayInput {
    pub mac_address: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Create/update payload for a sensor. The parent gateway comes from the path.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorInput {
    pub mac_address: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub variable: String,
    #[serde(default)]
    pub unit: String,
}

/// One stored reading of a sensor. Identity is `(sensor mac, created_at)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    // ---
    pub created_at: DateTime<Utc>,
    pub value: f64,
    pub is_outlier: bool,
}

/// An already-validated incoming reading, before classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub created_at: DateTime<Utc>,
    pub value: f64,
}

/// Drop sub-microsecond digits. Measurement keys are stored at `TIMESTAMPTZ`
/// resolution in every backend.
pub fn storage_precision(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(6)
}

/// Optional time window; a missing bound is unbounded on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    // ---
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    /// Inclusive on both ends.
    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| *at >= s) && self.end.map_or(true, |e| *at <= e)
    }
}

/// Descriptive statistics of a measurement set. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    // ---
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    pub mean: f64,
    /// Population variance (divides by N).
    pub variance: f64,
    pub upper_threshold: f64,
    pub lower_threshold: f64,
}

/// Per-sensor result envelope: statistics plus the (possibly narrowed)
/// measurement list they were computed for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorMeasurements {
    // ---
    pub sensor_mac_address: String,
    #[serde(rename = "stats")]
    pub statistics: Statistics,
    pub measurements: Vec<Measurement>,
}

/// Statistics-only projection of [`SensorMeasurements`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorStatistics {
    pub sensor_mac_address: String,
    #[serde(rename = "stats")]
    pub statistics: Statistics,
}

impl From<SensorMeasurements> for SensorStatistics {
    fn from(envelope: SensorMeasurements) -> Self {
        SensorStatistics {
            sensor_mac_address: envelope.sensor_mac_address,
            statistics: envelope.statistics,
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 26, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_storage_precision_keeps_micros() {
        // ---
        let ts = at(10) + chrono::Duration::nanoseconds(1_234_567);
        let truncated = storage_precision(ts);
        assert_eq!(truncated, at(10) + chrono::Duration::microseconds(1_234));
        assert_eq!(storage_precision(truncated), truncated);
    }

    #[test]
    fn test_date_range_bounds_are_inclusive() {
        // ---
        let range = DateRange::new(Some(at(10)), Some(at(12)));
        assert!(range.contains(&at(10)));
        assert!(range.contains(&at(12)));
        assert!(!range.contains(&at(9)));
        assert!(!range.contains(&at(13)));
    }

    #[test]
    fn test_date_range_open_ends() {
        // ---
        assert!(DateRange::default().contains(&at(0)));
        assert!(DateRange::new(Some(at(10)), None).contains(&at(23)));
        assert!(!DateRange::new(None, Some(at(10))).contains(&at(11)));
    }

    #[test]
    fn test_statistics_serialization_omits_missing_dates() {
        // ---
        let json = serde_json::to_value(Statistics::default()).unwrap();
        assert!(json.get("startDate").is_none());
        assert!(json.get("endDate").is_none());
        assert_eq!(json["upperThreshold"], 0.0);
    }

    #[test]
    fn test_envelope_field_names() {
        // ---
        let envelope = SensorMeasurements {
            sensor_mac_address: "71:B1:CE:01:C6:A9".to_string(),
            statistics: Statistics::default(),
            measurements: vec![Measurement {
                created_at: at(10),
                value: 21.5,
                is_outlier: false,
            }],
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["sensorMacAddress"], "71:B1:CE:01:C6:A9");
        assert!(json.get("stats").is_some());
        assert_eq!(json["measurements"][0]["isOutlier"], false);

        let stats: SensorStatistics = envelope.into();
        assert_eq!(stats.sensor_mac_address, "71:B1:CE:01:C6:A9");
    }
}

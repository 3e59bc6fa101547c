//! Single-sensor queries: measurements, statistics and outliers over an
//! optional time window.

use std::sync::Arc;

use tracing::debug;

use super::hierarchy::HierarchyValidator;
use super::{outliers, statistics};
use crate::error::EngineResult;
use crate::models::{DateRange, SensorMeasurements, Statistics};
use crate::store::{HierarchyStore, MeasurementStore};

// ---

pub struct SensorQueryService<S: ?Sized> {
    store: Arc<S>,
    validator: HierarchyValidator<S>,
}

impl<S: ?Sized> Clone for SensorQueryService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            validator: self.validator.clone(),
        }
    }
}

impl<S> SensorQueryService<S>
where
    S: HierarchyStore + MeasurementStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            validator: HierarchyValidator::new(Arc::clone(&store)),
            store,
        }
    }

    /// Validate the triple, then return the sensor's measurements in `range`
    /// with statistics and outlier flags computed over exactly that set.
    pub async fn measurements(
        &self,
        network_code: &str,
        gateway_mac: &str,
        sensor_mac: &str,
        range: DateRange,
    ) -> EngineResult<SensorMeasurements> {
        // ---
        self.validator
            .validate_sensor(network_code, gateway_mac, sensor_mac)
            .await?;
        self.summarize(sensor_mac, range).await
    }

    /// The statistics part of [`Self::measurements`]. Zero measurements is
    /// not an error.
    pub async fn stats(
        &self,
        network_code: &str,
        gateway_mac: &str,
        sensor_mac: &str,
        range: DateRange,
    ) -> EngineResult<Statistics> {
        let envelope = self
            .measurements(network_code, gateway_mac, sensor_mac, range)
            .await?;
        Ok(envelope.statistics)
    }

    /// Same envelope as [`Self::measurements`], narrowed to outliers.
    pub async fn outliers(
        &self,
        network_code: &str,
        gateway_mac: &str,
        sensor_mac: &str,
        range: DateRange,
    ) -> EngineResult<SensorMeasurements> {
        let envelope = self
            .measurements(network_code, gateway_mac, sensor_mac, range)
            .await?;
        Ok(narrow_to_outliers(envelope))
    }

    /// Query an already-resolved sensor. Callers are responsible for having
    /// checked containment.
    pub(crate) async fn summarize(
        &self,
        sensor_mac: &str,
        range: DateRange,
    ) -> EngineResult<SensorMeasurements> {
        // ---
        let fetched = self.store.list_measurements(sensor_mac, range).await?;
        debug!(sensor = sensor_mac, count = fetched.len(), "fetched measurements");

        if fetched.is_empty() {
            // Echo the requested window so callers can see what was asked for
            let statistics = Statistics {
                start_date: range.start,
                end_date: range.end,
                ..Statistics::default()
            };
            return Ok(SensorMeasurements {
                sensor_mac_address: sensor_mac.to_string(),
                statistics,
                measurements: Vec::new(),
            });
        }

        let statistics = statistics::compute(&fetched);
        let measurements = outliers::classify(fetched, &statistics);
        Ok(SensorMeasurements {
            sensor_mac_address: sensor_mac.to_string(),
            statistics,
            measurements,
        })
    }
}

/// Keep the statistics, drop every measurement inside the band.
pub fn narrow_to_outliers(envelope: SensorMeasurements) -> SensorMeasurements {
    let measurements = outliers::filter_outliers(envelope.measurements, &envelope.statistics);
    SensorMeasurements {
        measurements,
        ..envelope
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::engine::testing::{fixture, seed, ts, GW_A, GW_B, NET_A, SENSOR_A1, SENSOR_A2};
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_full_history_with_flags() {
        // ---
        let store = fixture().await;
        seed(&store, SENSOR_A1, &[20.0, 21.0, 22.0, 23.0, 20.0, 21.0, 22.0, 23.0, 1000.0]).await;
        let service = SensorQueryService::new(store);

        let envelope = service
            .measurements(NET_A, GW_A, SENSOR_A1, DateRange::default())
            .await
            .unwrap();
        assert_eq!(envelope.sensor_mac_address, SENSOR_A1);
        assert_eq!(envelope.measurements.len(), 9);
        assert_eq!(envelope.statistics.start_date, Some(ts(0)));
        assert_eq!(envelope.statistics.end_date, Some(ts(8)));
        let flagged: Vec<f64> = envelope
            .measurements
            .iter()
            .filter(|m| m.is_outlier)
            .map(|m| m.value)
            .collect();
        assert_eq!(flagged, vec![1000.0]);
    }

    #[tokio::test]
    async fn test_stats_over_filtered_window_only() {
        // ---
        let store = fixture().await;
        seed(&store, SENSOR_A1, &[100.0, 20.0, 25.0, 30.0, 100.0]).await;
        let service = SensorQueryService::new(store);

        let stats = service
            .stats(NET_A, GW_A, SENSOR_A1, DateRange::new(Some(ts(1)), Some(ts(3))))
            .await
            .unwrap();
        assert_eq!(stats.mean, 25.0);
        assert_eq!(stats.start_date, Some(ts(1)));
        assert_eq!(stats.end_date, Some(ts(3)));
    }

    #[tokio::test]
    async fn test_empty_window_echoes_requested_dates() {
        // ---
        let store = fixture().await;
        seed(&store, SENSOR_A1, &[20.0, 25.0, 30.0]).await;
        let service = SensorQueryService::new(store);

        let range = DateRange::new(Some(ts(30)), Some(ts(40)));
        let envelope = service
            .measurements(NET_A, GW_A, SENSOR_A1, range)
            .await
            .unwrap();
        assert!(envelope.measurements.is_empty());
        assert_eq!(envelope.statistics.start_date, Some(ts(30)));
        assert_eq!(envelope.statistics.end_date, Some(ts(40)));
        assert_eq!(envelope.statistics.mean, 0.0);
        assert_eq!(envelope.statistics.upper_threshold, 0.0);
    }

    #[tokio::test]
    async fn test_empty_history_without_window_has_no_dates() {
        // ---
        let service = SensorQueryService::new(fixture().await);
        let stats = service
            .stats(NET_A, GW_A, SENSOR_A2, DateRange::default())
            .await
            .unwrap();
        assert_eq!(stats, Statistics::default());
    }

    #[tokio::test]
    async fn test_outliers_keep_full_set_statistics() {
        // ---
        let store = fixture().await;
        seed(&store, SENSOR_A1, &[20.0, 21.0, 22.0, 23.0, 20.0, 21.0, 22.0, 23.0, 1000.0]).await;
        let service = SensorQueryService::new(store);

        let full = service
            .measurements(NET_A, GW_A, SENSOR_A1, DateRange::default())
            .await
            .unwrap();
        let narrowed = service
            .outliers(NET_A, GW_A, SENSOR_A1, DateRange::default())
            .await
            .unwrap();
        assert_eq!(narrowed.statistics, full.statistics);
        assert_eq!(narrowed.measurements.len(), 1);
        assert!(narrowed.measurements[0].is_outlier);
    }

    #[tokio::test]
    async fn test_broken_hierarchy_propagates() {
        // ---
        let service = SensorQueryService::new(fixture().await);
        let err = service
            .measurements(NET_A, GW_B, SENSOR_A1, DateRange::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = service
            .stats(NET_A, GW_A, "AA:AA:AA:AA:AA:AA", DateRange::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}

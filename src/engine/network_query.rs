//! Network-wide queries: the single-sensor computation fanned out over every
//! sensor of a network, or over a caller-chosen subset of them.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info};

use super::sensor_query::{narrow_to_outliers, SensorQueryService};
use crate::error::{EngineResult, ErrorKind};
use crate::models::{DateRange, Sensor, SensorMeasurements, SensorStatistics};
use crate::store::{HierarchyStore, MeasurementStore};

// ---

/// Per-sensor computations run concurrently up to this many at a time.
pub const DEFAULT_FANOUT_LIMIT: usize = 8;

pub struct NetworkQueryService<S: ?Sized> {
    store: Arc<S>,
    sensors: SensorQueryService<S>,
    fanout_limit: usize,
}

impl<S: ?Sized> Clone for NetworkQueryService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            sensors: self.sensors.clone(),
            fanout_limit: self.fanout_limit,
        }
    }
}

impl<S> NetworkQueryService<S>
where
    S: HierarchyStore + MeasurementStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self::with_fanout_limit(store, DEFAULT_FANOUT_LIMIT)
    }

    pub fn with_fanout_limit(store: Arc<S>, fanout_limit: usize) -> Self {
        Self {
            sensors: SensorQueryService::new(Arc::clone(&store)),
            store,
            fanout_limit: fanout_limit.max(1),
        }
    }

    /// One envelope per sensor, in sensor-set order. Sensors named in
    /// `sensor_macs` that do not belong to the network are skipped silently.
    pub async fn measurements(
        &self,
        network_code: &str,
        sensor_macs: Option<&[String]>,
        range: DateRange,
    ) -> EngineResult<Vec<SensorMeasurements>> {
        // ---
        self.store.get_network(network_code).await?;

        let sensors = match sensor_macs {
            Some(macs) => self.select_sensors(network_code, macs).await?,
            None => self.all_sensors(network_code).await?,
        };
        info!(
            network = network_code,
            sensors = sensors.len(),
            "network query fan-out"
        );

        stream::iter(sensors)
            .map(|sensor| {
                let service = self.sensors.clone();
                async move { service.summarize(&sensor.mac_address, range).await }
            })
            .buffered(self.fanout_limit)
            .try_collect()
            .await
    }

    /// Statistics-only projection of [`Self::measurements`].
    pub async fn stats(
        &self,
        network_code: &str,
        sensor_macs: Option<&[String]>,
        range: DateRange,
    ) -> EngineResult<Vec<SensorStatistics>> {
        let envelopes = self.measurements(network_code, sensor_macs, range).await?;
        Ok(envelopes.into_iter().map(SensorStatistics::from).collect())
    }

    /// Every entry of [`Self::measurements`] narrowed to its outliers. Entries
    /// with no outliers are kept.
    pub async fn outliers(
        &self,
        network_code: &str,
        sensor_macs: Option<&[String]>,
        range: DateRange,
    ) -> EngineResult<Vec<SensorMeasurements>> {
        let envelopes = self.measurements(network_code, sensor_macs, range).await?;
        Ok(envelopes.into_iter().map(narrow_to_outliers).collect())
    }

    async fn all_sensors(&self, network_code: &str) -> EngineResult<Vec<Sensor>> {
        // ---
        let mut sensors = Vec::new();
        for gateway in self.store.list_gateways_of_network(network_code).await? {
            sensors.extend(self.store.list_sensors_of_gateway(&gateway.mac_address).await?);
        }
        Ok(sensors)
    }

    async fn select_sensors(
        &self,
        network_code: &str,
        sensor_macs: &[String],
    ) -> EngineResult<Vec<Sensor>> {
        // ---
        let mut seen = HashSet::new();
        let mut sensors = Vec::new();

        for mac in sensor_macs {
            if !seen.insert(mac.as_str()) {
                continue;
            }
            let sensor = match self.store.get_sensor(mac).await {
                Ok(sensor) => sensor,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(sensor = %mac, "requested sensor not found, skipping");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let gateway = self.store.get_gateway(&sensor.gateway_mac).await?;
            if gateway.network_code == network_code {
                sensors.push(sensor);
            } else {
                debug!(sensor = %mac, network = network_code, "sensor outside network, skipping");
            }
        }
        Ok(sensors)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::engine::testing::{
        fixture, seed, ts, NET_A, NET_B, SENSOR_A1, SENSOR_A2, SENSOR_A3, SENSOR_B1,
    };
    use crate::models::Statistics;

    fn macs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_all_sensors_of_network() {
        // ---
        let store = fixture().await;
        seed(&store, SENSOR_A1, &[20.0, 25.0, 30.0]).await;
        seed(&store, SENSOR_B1, &[1.0]).await;
        let service = NetworkQueryService::new(store);

        let result = service
            .measurements(NET_A, None, DateRange::default())
            .await
            .unwrap();
        let mut names: Vec<&str> = result.iter().map(|e| e.sensor_mac_address.as_str()).collect();
        names.sort();
        assert_eq!(names, vec![SENSOR_A1, SENSOR_A2, SENSOR_A3]);

        let a1 = result.iter().find(|e| e.sensor_mac_address == SENSOR_A1).unwrap();
        assert_eq!(a1.statistics.mean, 25.0);
        let a2 = result.iter().find(|e| e.sensor_mac_address == SENSOR_A2).unwrap();
        assert!(a2.measurements.is_empty());
        assert_eq!(a2.statistics, Statistics::default());
    }

    #[tokio::test]
    async fn test_foreign_sensor_is_silently_dropped() {
        // ---
        let service = NetworkQueryService::new(fixture().await);
        let requested = macs(&[SENSOR_A1, SENSOR_B1]);

        let result = service
            .measurements(NET_A, Some(&requested), DateRange::default())
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].sensor_mac_address, SENSOR_A1);
    }

    #[tokio::test]
    async fn test_unknown_and_duplicate_sensors_are_skipped() {
        // ---
        let service = NetworkQueryService::new(fixture().await);
        let requested = macs(&[SENSOR_A2, "FF:FF:FF:FF:FF:FF", SENSOR_A2, SENSOR_A1]);

        let result = service
            .measurements(NET_A, Some(&requested), DateRange::default())
            .await
            .unwrap();
        let names: Vec<&str> = result.iter().map(|e| e.sensor_mac_address.as_str()).collect();
        assert_eq!(names, vec![SENSOR_A2, SENSOR_A1]);
    }

    #[tokio::test]
    async fn test_missing_network_fails() {
        // ---
        let service = NetworkQueryService::new(fixture().await);
        let err = service
            .stats("NOPE", None, DateRange::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_stats_projection_and_window_echo() {
        // ---
        let store = fixture().await;
        seed(&store, SENSOR_B1, &[10.0, 20.0]).await;
        let service = NetworkQueryService::new(store);

        let range = DateRange::new(Some(ts(50)), Some(ts(59)));
        let stats = service.stats(NET_B, None, range).await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].sensor_mac_address, SENSOR_B1);
        assert_eq!(stats[0].statistics.start_date, Some(ts(50)));
        assert_eq!(stats[0].statistics.end_date, Some(ts(59)));
        assert_eq!(stats[0].statistics.mean, 0.0);
    }

    #[tokio::test]
    async fn test_outliers_keep_entries_without_outliers() {
        // ---
        let store = fixture().await;
        seed(&store, SENSOR_A1, &[20.0, 21.0, 22.0, 23.0, 20.0, 21.0, 22.0, 23.0, 1000.0]).await;
        seed(&store, SENSOR_A2, &[20.0, 25.0, 30.0]).await;
        let service = NetworkQueryService::with_fanout_limit(store, 2);

        let requested = macs(&[SENSOR_A1, SENSOR_A2]);
        let result = service
            .outliers(NET_A, Some(&requested), DateRange::default())
            .await
            .unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].measurements.len(), 1);
        assert_eq!(result[0].measurements[0].value, 1000.0);
        assert!(result[1].measurements.is_empty());
        assert_eq!(result[1].statistics.mean, 25.0);
    }
}

//! In-memory store, used by tests and for running the service without Postgres.
//!
//! All maps live behind one `RwLock` so that cascading deletes and renames are
//! applied atomically, mirroring the referential actions of the SQL schema.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{EntityAdmin, HierarchyStore, MeasurementStore};
use crate::error::{EngineError, EngineResult};
use crate::models::{
    DateRange, Gateway, GatewayInput, Measurement, Network, NetworkInput, Sensor, SensorInput,
};

// ---

#[derive(Debug, Default)]
struct Tables {
    networks: BTreeMap<String, Network>,
    gateways: BTreeMap<String, Gateway>,
    sensors: BTreeMap<String, Sensor>,
    /// sensor mac -> created_at -> (value, is_outlier)
    measurements: BTreeMap<String, BTreeMap<DateTime<Utc>, (f64, bool)>>,
}

impl Tables {
    // ---
    fn network(&self, code: &str) -> EngineResult<&Network> {
        self.networks
            .get(code)
            .ok_or_else(|| EngineError::missing(format!("Network with code '{code}' not found")))
    }

    fn gateway(&self, mac: &str) -> EngineResult<&Gateway> {
        self.gateways
            .get(mac)
            .ok_or_else(|| EngineError::missing(format!("Gateway with id '{mac}' not found")))
    }

    fn sensor(&self, mac: &str) -> EngineResult<&Sensor> {
        self.sensors
            .get(mac)
            .ok_or_else(|| EngineError::missing(format!("Sensor with id '{mac}' not found")))
    }

    fn drop_sensor(&mut self, mac: &str) {
        self.sensors.remove(mac);
        self.measurements.remove(mac);
    }

    fn drop_gateway(&mut self, mac: &str) {
        let children: Vec<String> = self
            .sensors
            .values()
            .filter(|s| s.gateway_mac == mac)
            .map(|s| s.mac_address.clone())
            .collect();
        for sensor in children {
            self.drop_sensor(&sensor);
        }
        self.gateways.remove(mac);
    }
}

/// Thread-safe in-memory implementation of every store trait.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HierarchyStore for MemoryStore {
    // ---
    async fn get_network(&self, code: &str) -> EngineResult<Network> {
        self.tables.read().await.network(code).cloned()
    }

    async fn get_gateway(&self, mac: &str) -> EngineResult<Gateway> {
        self.tables.read().await.gateway(mac).cloned()
    }

    async fn get_sensor(&self, mac: &str) -> EngineResult<Sensor> {
        self.tables.read().await.sensor(mac).cloned()
    }

    async fn list_gateways_of_network(&self, code: &str) -> EngineResult<Vec<Gateway>> {
        let tables = self.tables.read().await;
        tables.network(code)?;
        Ok(tables
            .gateways
            .values()
            .filter(|g| g.network_code == code)
            .cloned()
            .collect())
    }

    async fn list_sensors_of_gateway(&self, mac: &str) -> EngineResult<Vec<Sensor>> {
        let tables = self.tables.read().await;
        tables.gateway(mac)?;
        Ok(tables
            .sensors
            .values()
            .filter(|s| s.gateway_mac == mac)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MeasurementStore for MemoryStore {
    // ---
    async fn list_measurements(
        &self,
        sensor_mac: &str,
        range: DateRange,
    ) -> EngineResult<Vec<Measurement>> {
        let tables = self.tables.read().await;
        tables.sensor(sensor_mac)?;
        let Some(series) = tables.measurements.get(sensor_mac) else {
            return Ok(Vec::new());
        };
        Ok(series
            .iter()
            .filter(|(created_at, _)| range.contains(created_at))
            .map(|(created_at, (value, is_outlier))| Measurement {
                created_at: *created_at,
                value: *value,
                is_outlier: *is_outlier,
            })
            .collect())
    }

    async fn insert_measurement(
        &self,
        sensor_mac: &str,
        created_at: DateTime<Utc>,
        value: f64,
        is_outlier: bool,
    ) -> EngineResult<()> {
        let mut tables = self.tables.write().await;
        tables.sensor(sensor_mac)?;
        let series = tables
            .measurements
            .entry(sensor_mac.to_string())
            .or_default();
        if series.contains_key(&created_at) {
            return Err(EngineError::Conflict(format!(
                "Measurement with macAddress '{sensor_mac}' and '{}' already exists",
                created_at.to_rfc3339()
            )));
        }
        series.insert(created_at, (value, is_outlier));
        Ok(())
    }

    async fn delete_measurement(
        &self,
        sensor_mac: &str,
        created_at: DateTime<Utc>,
    ) -> EngineResult<()> {
        let mut tables = self.tables.write().await;
        tables.sensor(sensor_mac)?;
        let removed = tables
            .measurements
            .get_mut(sensor_mac)
            .and_then(|series| series.remove(&created_at));
        match removed {
            Some(_) => Ok(()),
            None => Err(EngineError::missing(format!(
                "Measurement with id '{sensor_mac}' not found"
            ))),
        }
    }
}

#[async_trait]
impl EntityAdmin for MemoryStore {
    // ---
    async fn list_networks(&self) -> EngineResult<Vec<Network>> {
        Ok(self.tables.read().await.networks.values().cloned().collect())
    }

    async fn create_network(&self, input: &NetworkInput) -> EngineResult<Network> {
        let mut tables = self.tables.write().await;
        if tables.networks.contains_key(&input.code) {
            return Err(EngineError::Conflict(format!(
                "Network with code '{}' already exists",
                input.code
            )));
        }
        let network = Network {
            code: input.code.clone(),
            name: input.name.clone(),
            description: input.description.clone(),
        };
        tables.networks.insert(network.code.clone(), network.clone());
        Ok(network)
    }

    async fn update_network(&self, code: &str, input: &NetworkInput) -> EngineResult<Network> {
        let mut tables = self.tables.write().await;
        tables.network(code)?;
        if input.code != code && tables.networks.contains_key(&input.code) {
            return Err(EngineError::Conflict(format!(
                "Network with code '{}' already exists",
                input.code
            )));
        }
        tables.networks.remove(code);
        let network = Network {
            code: input.code.clone(),
            name: input.name.clone(),
            description: input.description.clone(),
        };
        tables.networks.insert(network.code.clone(), network.clone());
        for gateway in tables.gateways.values_mut() {
            if gateway.network_code == code {
                gateway.network_code = input.code.clone();
            }
        }
        Ok(network)
    }

    async fn delete_network(&self, code: &str) -> EngineResult<()> {
        let mut tables = self.tables.write().await;
        tables.network(code)?;
        let children: Vec<String> = tables
            .gateways
            .values()
            .filter(|g| g.network_code == code)
            .map(|g| g.mac_address.clone())
            .collect();
        for gateway in children {
            tables.drop_gateway(&gateway);
        }
        tables.networks.remove(code);
        Ok(())
    }

    async fn create_gateway(
        &self,
        network_code: &str,
        input: &GatewayInput,
    ) -> EngineResult<Gateway> {
        let mut tables = self.tables.write().await;
        if tables.gateways.contains_key(&input.mac_address) {
            return Err(EngineError::Conflict(format!(
                "Gateway with macAddress '{}' already exists",
                input.mac_address
            )));
        }
        tables.network(network_code)?;
        let gateway = Gateway {
            mac_address: input.mac_address.clone(),
            network_code: network_code.to_string(),
            name: input.name.clone(),
            description: input.description.clone(),
        };
        tables
            .gateways
            .insert(gateway.mac_address.clone(), gateway.clone());
        Ok(gateway)
    }

    async fn update_gateway(&self, mac: &str, input: &GatewayInput) -> EngineResult<Gateway> {
        let mut tables = self.tables.write().await;
        let network_code = tables.gateway(mac)?.network_code.clone();
        if input.mac_address != mac && tables.gateways.contains_key(&input.mac_address) {
            return Err(EngineError::Conflict(format!(
                "Gateway with macAddress '{}' already exists",
                input.mac_address
            )));
        }
        tables.gateways.remove(mac);
        let gateway = Gateway {
            mac_address: input.mac_address.clone(),
            network_code,
            name: input.name.clone(),
            description: input.description.clone(),
        };
        tables
            .gateways
            .insert(gateway.mac_address.clone(), gateway.clone());
        for sensor in tables.sensors.values_mut() {
            if sensor.gateway_mac == mac {
                sensor.gateway_mac = input.mac_address.clone();
            }
        }
        Ok(gateway)
    }

    async fn delete_gateway(&self, mac: &str) -> EngineResult<()> {
        let mut tables = self.tables.write().await;
        tables.gateway(mac)?;
        tables.drop_gateway(mac);
        Ok(())
    }

    async fn create_sensor(&self, gateway_mac: &str, input: &SensorInput) -> EngineResult<Sensor> {
        let mut tables = self.tables.write().await;
        if tables.sensors.contains_key(&input.mac_address) {
            return Err(EngineError::Conflict(format!(
                "Sensor with macAddress '{}' already exists",
                input.mac_address
            )));
        }
        tables.gateway(gateway_mac)?;
        let sensor = Sensor {
            mac_address: input.mac_address.clone(),
            gateway_mac: gateway_mac.to_string(),
            name: input.name.clone(),
            description: input.description.clone(),
            variable: input.variable.clone(),
            unit: input.unit.clone(),
        };
        tables
            .sensors
            .insert(sensor.mac_address.clone(), sensor.clone());
        Ok(sensor)
    }

    async fn update_sensor(&self, mac: &str, input: &SensorInput) -> EngineResult<Sensor> {
        let mut tables = self.tables.write().await;
        let gateway_mac = tables.sensor(mac)?.gateway_mac.clone();
        if input.mac_address != mac && tables.sensors.contains_key(&input.mac_address) {
            return Err(EngineError::Conflict(format!(
                "Sensor with macAddress '{}' already exists",
                input.mac_address
            )));
        }
        tables.sensors.remove(mac);
        let sensor = Sensor {
            mac_address: input.mac_address.clone(),
            gateway_mac,
            name: input.name.clone(),
            description: input.description.clone(),
            variable: input.variable.clone(),
            unit: input.unit.clone(),
        };
        tables
            .sensors
            .insert(sensor.mac_address.clone(), sensor.clone());
        if let Some(series) = tables.measurements.remove(mac) {
            tables.measurements.insert(input.mac_address.clone(), series);
        }
        Ok(sensor)
    }

    async fn delete_sensor(&self, mac: &str) -> EngineResult<()> {
        let mut tables = self.tables.write().await;
        tables.sensor(mac)?;
        tables.drop_sensor(mac);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::error::ErrorKind;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 18, 17, minute, 0).unwrap()
    }

    async fn seeded() -> MemoryStore {
        // ---
        let store = MemoryStore::new();
        store
            .create_network(&NetworkInput {
                code: "NET01".into(),
                name: "Alp Monitor".into(),
                description: String::new(),
            })
            .await
            .unwrap();
        store
            .create_gateway(
                "NET01",
                &GatewayInput {
                    mac_address: "94:3F:BE:4C:4A:79".into(),
                    name: "GW01".into(),
                    description: String::new(),
                },
            )
            .await
            .unwrap();
        store
            .create_sensor(
                "94:3F:BE:4C:4A:79",
                &SensorInput {
                    mac_address: "71:B1:CE:01:C6:A9".into(),
                    name: "TH01".into(),
                    description: String::new(),
                    variable: "temperature".into(),
                    unit: "C".into(),
                },
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_duplicate_measurement_is_conflict() {
        // ---
        let store = seeded().await;
        store
            .insert_measurement("71:B1:CE:01:C6:A9", at(0), 21.0, false)
            .await
            .unwrap();
        let err = store
            .insert_measurement("71:B1:CE:01:C6:A9", at(0), 99.0, true)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        // first value untouched, no upsert
        let stored = store
            .list_measurements("71:B1:CE:01:C6:A9", DateRange::default())
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].value, 21.0);
    }

    #[tokio::test]
    async fn test_measurement_range_filter() {
        // ---
        let store = seeded().await;
        for minute in 0..5 {
            store
                .insert_measurement("71:B1:CE:01:C6:A9", at(minute), minute as f64, false)
                .await
                .unwrap();
        }
        let window = store
            .list_measurements("71:B1:CE:01:C6:A9", DateRange::new(Some(at(1)), Some(at(3))))
            .await
            .unwrap();
        let values: Vec<f64> = window.iter().map(|m| m.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn test_insert_for_unknown_sensor_is_not_found() {
        // ---
        let store = seeded().await;
        let err = store
            .insert_measurement("00:00:00:00:00:00", at(0), 1.0, false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_network_delete_cascades() {
        // ---
        let store = seeded().await;
        store
            .insert_measurement("71:B1:CE:01:C6:A9", at(0), 21.0, false)
            .await
            .unwrap();
        store.delete_network("NET01").await.unwrap();

        assert!(store.get_gateway("94:3F:BE:4C:4A:79").await.is_err());
        assert!(store.get_sensor("71:B1:CE:01:C6:A9").await.is_err());
        assert!(store.tables.read().await.measurements.is_empty());
    }

    #[tokio::test]
    async fn test_rename_follows_children_and_rejects_collisions() {
        // ---
        let store = seeded().await;
        store
            .create_network(&NetworkInput {
                code: "NET02".into(),
                name: "Other".into(),
                description: String::new(),
            })
            .await
            .unwrap();

        let err = store
            .update_network(
                "NET01",
                &NetworkInput {
                    code: "NET02".into(),
                    name: "Clash".into(),
                    description: String::new(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        store
            .update_network(
                "NET01",
                &NetworkInput {
                    code: "NET09".into(),
                    name: "Renamed".into(),
                    description: String::new(),
                },
            )
            .await
            .unwrap();
        let gateway = store.get_gateway("94:3F:BE:4C:4A:79").await.unwrap();
        assert_eq!(gateway.network_code, "NET09");
    }

    #[tokio::test]
    async fn test_delete_missing_measurement() {
        // ---
        let store = seeded().await;
        let err = store
            .delete_measurement("71:B1:CE:01:C6:A9", at(7))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}

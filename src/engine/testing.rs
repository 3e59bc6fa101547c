//! Shared fixture for engine unit tests.
//!
//! NET_A ─┬─ GW_A  ─┬─ SENSOR_A1
//!        │         └─ SENSOR_A2
//!        └─ GW_A2 ─── SENSOR_A3
//! NET_B ─── GW_B  ─── SENSOR_B1

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::models::{GatewayInput, NetworkInput, SensorInput};
use crate::store::{EntityAdmin, MeasurementStore, MemoryStore};

pub const NET_A: &str = "NET01";
pub const NET_B: &str = "NET02";
pub const GW_A: &str = "94:3F:BE:4C:4A:79";
pub const GW_A2: &str = "94:3F:BE:4C:4A:80";
pub const GW_B: &str = "A1:B2:C3:D4:E5:F6";
pub const SENSOR_A1: &str = "71:B1:CE:01:C6:A9";
pub const SENSOR_A2: &str = "71:B1:CE:01:C6:AA";
pub const SENSOR_A3: &str = "71:B1:CE:01:C6:AB";
pub const SENSOR_B1: &str = "0C:0C:0C:0C:0C:01";

pub fn ts(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 2, 18, 17, minute, 0).unwrap()
}

pub async fn fixture() -> Arc<MemoryStore> {
    // ---
    let store = MemoryStore::new();
    for code in [NET_A, NET_B] {
        store
            .create_network(&NetworkInput {
                code: code.to_string(),
                name: format!("Network {code}"),
                description: String::new(),
            })
            .await
            .unwrap();
    }
    for (network, gateway) in [(NET_A, GW_A), (NET_A, GW_A2), (NET_B, GW_B)] {
        store
            .create_gateway(
                network,
                &GatewayInput {
                    mac_address: gateway.to_string(),
                    name: format!("Gateway {gateway}"),
                    description: String::new(),
                },
            )
            .await
            .unwrap();
    }
    for (gateway, sensor) in [
        (GW_A, SENSOR_A1),
        (GW_A, SENSOR_A2),
        (GW_A2, SENSOR_A3),
        (GW_B, SENSOR_B1),
    ] {
        store
            .create_sensor(
                gateway,
                &SensorInput {
                    mac_address: sensor.to_string(),
                    name: format!("Sensor {sensor}"),
                    description: String::new(),
                    variable: "temperature".to_string(),
                    unit: "C".to_string(),
                },
            )
            .await
            .unwrap();
    }
    Arc::new(store)
}

/// Insert `values` one minute apart starting at `ts(0)`.
pub async fn seed(store: &MemoryStore, sensor: &str, values: &[f64]) {
    for (i, value) in values.iter().enumerate() {
        store
            .insert_measurement(sensor, ts(i as u32), *value, false)
            .await
            .unwrap();
    }
}

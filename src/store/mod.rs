//! Store interfaces consumed by the engine.
//!
//! The engine never talks to a database directly. It receives a store handle
//! at construction time and only uses the narrow capabilities below:
//! - [`HierarchyStore`]: entity lookup and enumeration
//! - [`MeasurementStore`]: measurement read/write
//!
//! [`EntityAdmin`] is the CRUD side used by the HTTP surface to manage the
//! hierarchy itself. Two implementations ship with the crate:
//! [`postgres::PgStore`] and [`memory::MemoryStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::EngineResult;
use crate::models::{
    DateRange, Gateway, GatewayInput, Measurement, Network, NetworkInput, Sensor, SensorInput,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

// ---

/// Entity lookup and enumeration. Lookups fail with NotFound when absent.
#[async_trait]
pub trait HierarchyStore: Send + Sync {
    // ---
    async fn get_network(&self, code: &str) -> EngineResult<Network>;

    async fn get_gateway(&self, mac: &str) -> EngineResult<Gateway>;

    async fn get_sensor(&self, mac: &str) -> EngineResult<Sensor>;

    /// Fails with NotFound if the network does not exist.
    async fn list_gateways_of_network(&self, code: &str) -> EngineResult<Vec<Gateway>>;

    /// Fails with NotFound if the gateway does not exist.
    async fn list_sensors_of_gateway(&self, mac: &str) -> EngineResult<Vec<Sensor>>;
}

/// Measurement read/write.
#[async_trait]
pub trait MeasurementStore: Send + Sync {
    // ---
    /// Measurements of one sensor, filtered to `range` (inclusive). Order is
    /// ascending by `created_at`. Fails with NotFound if the sensor is absent.
    async fn list_measurements(
        &self,
        sensor_mac: &str,
        range: DateRange,
    ) -> EngineResult<Vec<Measurement>>;

    /// Fails with Conflict if `(sensor_mac, created_at)` is taken, NotFound if
    /// the sensor is absent.
    async fn insert_measurement(
        &self,
        sensor_mac: &str,
        created_at: DateTime<Utc>,
        value: f64,
        is_outlier: bool,
    ) -> EngineResult<()>;

    async fn delete_measurement(&self, sensor_mac: &str, created_at: DateTime<Utc>)
        -> EngineResult<()>;
}

/// Hierarchy CRUD. Deletes cascade top-down; renames that collide with an
/// existing identity of the same kind fail with Conflict.
#[async_trait]
pub trait EntityAdmin: Send + Sync {
    // ---
    async fn list_networks(&self) -> EngineResult<Vec<Network>>;

    async fn create_network(&self, input: &NetworkInput) -> EngineResult<Network>;

    async fn update_network(&self, code: &str, input: &NetworkInput) -> EngineResult<Network>;

    async fn delete_network(&self, code: &str) -> EngineResult<()>;

    async fn create_gateway(&self, network_code: &str, input: &GatewayInput)
        -> EngineResult<Gateway>;

    async fn update_gateway(&self, mac: &str, input: &GatewayInput) -> EngineResult<Gateway>;

    async fn delete_gateway(&self, mac: &str) -> EngineResult<()>;

    async fn create_sensor(&self, gateway_mac: &str, input: &SensorInput) -> EngineResult<Sensor>;

    async fn update_sensor(&self, mac: &str, input: &SensorInput) -> EngineResult<Sensor>;

    async fn delete_sensor(&self, mac: &str) -> EngineResult<()>;
}

/// Everything the service needs from one backing store.
pub trait Store: HierarchyStore + MeasurementStore + EntityAdmin + 'static {}

impl<T> Store for T where T: HierarchyStore + MeasurementStore + EntityAdmin + 'static {}

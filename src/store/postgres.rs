//! PostgreSQL store backed by an `sqlx` connection pool.
//!
//! Tables are created by [`crate::schema::create_schema`]. Referential
//! integrity (cascades, composite measurement key) is enforced by the
//! database; constraint violations are mapped to Conflict / NotFound.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{EntityAdmin, HierarchyStore, MeasurementStore};
use crate::error::{EngineError, EngineResult};
use crate::models::{
    DateRange, Gateway, GatewayInput, Measurement, Network, NetworkInput, Sensor, SensorInput,
};

// ---

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Replace the database's unique-violation text with a stable message.
fn conflict_as(err: sqlx::Error, message: impl FnOnce() -> String) -> EngineError {
    match EngineError::from(err) {
        EngineError::Conflict(_) => EngineError::Conflict(message()),
        other => other,
    }
}

#[async_trait]
impl HierarchyStore for PgStore {
    // ---
    async fn get_network(&self, code: &str) -> EngineResult<Network> {
        sqlx::query_as::<_, Network>("SELECT code, name, description FROM networks WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| EngineError::missing(format!("Network with code '{code}' not found")))
    }

    async fn get_gateway(&self, mac: &str) -> EngineResult<Gateway> {
        sqlx::query_as::<_, Gateway>(
            r#"
            SELECT mac_address, network_code, name, description
            FROM gateways WHERE mac_address = $1
            "#,
        )
        .bind(mac)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| EngineError::missing(format!("Gateway with id '{mac}' not found")))
    }

    async fn get_sensor(&self, mac: &str) -> EngineResult<Sensor> {
        sqlx::query_as::<_, Sensor>(
            r#"
            SELECT mac_address, gateway_mac, name, description, variable, unit
            FROM sensors WHERE mac_address = $1
            "#,
        )
        .bind(mac)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| EngineError::missing(format!("Sensor with id '{mac}' not found")))
    }

    async fn list_gateways_of_network(&self, code: &str) -> EngineResult<Vec<Gateway>> {
        self.get_network(code).await?;
        let gateways = sqlx::query_as::<_, Gateway>(
            r#"
            SELECT mac_address, network_code, name, description
            FROM gateways WHERE network_code = $1
            ORDER BY mac_address
            "#,
        )
        .bind(code)
        .fetch_all(&self.pool)
        .await?;
        Ok(gateways)
    }

    async fn list_sensors_of_gateway(&self, mac: &str) -> EngineResult<Vec<Sensor>> {
        self.get_gateway(mac).await?;
        let sensors = sqlx::query_as::<_, Sensor>(
            r#"
            SELECT mac_address, gateway_mac, name, description, variable, unit
            FROM sensors WHERE gateway_mac = $1
            ORDER BY mac_address
            "#,
        )
        .bind(mac)
        .fetch_all(&self.pool)
        .await?;
        Ok(sensors)
    }
}

#[async_trait]
impl MeasurementStore for PgStore {
    // ---
    async fn list_measurements(
        &self,
        sensor_mac: &str,
        range: DateRange,
    ) -> EngineResult<Vec<Measurement>> {
        self.get_sensor(sensor_mac).await?;
        let measurements = sqlx::query_as::<_, Measurement>(
            r#"
            SELECT created_at, value, is_outlier
            FROM measurements
            WHERE sensor_mac = $1
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at <= $3)
            ORDER BY created_at
            "#,
        )
        .bind(sensor_mac)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;
        Ok(measurements)
    }

    async fn insert_measurement(
        &self,
        sensor_mac: &str,
        created_at: DateTime<Utc>,
        value: f64,
        is_outlier: bool,
    ) -> EngineResult<()> {
        sqlx::query(
            r#"
            INSERT INTO measurements (sensor_mac, created_at, value, is_outlier)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(sensor_mac)
        .bind(created_at)
        .bind(value)
        .bind(is_outlier)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            conflict_as(e, || {
                format!(
                    "Measurement with macAddress '{sensor_mac}' and '{}' already exists",
                    created_at.to_rfc3339()
                )
            })
        })?;
        Ok(())
    }

    async fn delete_measurement(
        &self,
        sensor_mac: &str,
        created_at: DateTime<Utc>,
    ) -> EngineResult<()> {
        self.get_sensor(sensor_mac).await?;
        let result = sqlx::query("DELETE FROM measurements WHERE sensor_mac = $1 AND created_at = $2")
            .bind(sensor_mac)
            .bind(created_at)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(EngineError::missing(format!(
                "Measurement with id '{sensor_mac}' not found"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl EntityAdmin for PgStore {
    // ---
    async fn list_networks(&self) -> EngineResult<Vec<Network>> {
        let networks =
            sqlx::query_as::<_, Network>("SELECT code, name, description FROM networks ORDER BY code")
                .fetch_all(&self.pool)
                .await?;
        Ok(networks)
    }

    async fn create_network(&self, input: &NetworkInput) -> EngineResult<Network> {
        sqlx::query_as::<_, Network>(
            r#"
            INSERT INTO networks (code, name, description)
            VALUES ($1, $2, $3)
            RETURNING code, name, description
            "#,
        )
        .bind(&input.code)
        .bind(&input.name)
        .bind(&input.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_as(e, || format!("Network with code '{}' already exists", input.code)))
    }

    async fn update_network(&self, code: &str, input: &NetworkInput) -> EngineResult<Network> {
        self.get_network(code).await?;
        sqlx::query_as::<_, Network>(
            r#"
            UPDATE networks SET code = $1, name = $2, description = $3
            WHERE code = $4
            RETURNING code, name, description
            "#,
        )
        .bind(&input.code)
        .bind(&input.name)
        .bind(&input.description)
        .bind(code)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_as(e, || format!("Network with code '{}' already exists", input.code)))
    }

    async fn delete_network(&self, code: &str) -> EngineResult<()> {
        let result = sqlx::query("DELETE FROM networks WHERE code = $1")
            .bind(code)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(EngineError::missing(format!("Network with code '{code}' not found")));
        }
        Ok(())
    }

    async fn create_gateway(
        &self,
        network_code: &str,
        input: &GatewayInput,
    ) -> EngineResult<Gateway> {
        self.get_network(network_code).await?;
        sqlx::query_as::<_, Gateway>(
            r#"
            INSERT INTO gateways (mac_address, network_code, name, description)
            VALUES ($1, $2, $3, $4)
            RETURNING mac_address, network_code, name, description
            "#,
        )
        .bind(&input.mac_address)
        .bind(network_code)
        .bind(&input.name)
        .bind(&input.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            conflict_as(e, || {
                format!("Gateway with macAddress '{}' already exists", input.mac_address)
            })
        })
    }

    async fn update_gateway(&self, mac: &str, input: &GatewayInput) -> EngineResult<Gateway> {
        self.get_gateway(mac).await?;
        sqlx::query_as::<_, Gateway>(
            r#"
            UPDATE gateways SET mac_address = $1, name = $2, description = $3
            WHERE mac_address = $4
            RETURNING mac_address, network_code, name, description
            "#,
        )
        .bind(&input.mac_address)
        .bind(&input.name)
        .bind(&input.description)
        .bind(mac)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            conflict_as(e, || {
                format!("Gateway with macAddress '{}' already exists", input.mac_address)
            })
        })
    }

    async fn delete_gateway(&self, mac: &str) -> EngineResult<()> {
        let result = sqlx::query("DELETE FROM gateways WHERE mac_address = $1")
            .bind(mac)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(EngineError::missing(format!("Gateway with id '{mac}' not found")));
        }
        Ok(())
    }

    async fn create_sensor(&self, gateway_mac: &str, input: &SensorInput) -> EngineResult<Sensor> {
        self.get_gateway(gateway_mac).await?;
        sqlx::query_as::<_, Sensor>(
            r#"
            INSERT INTO sensors (mac_address, gateway_mac, name, description, variable, unit)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING mac_address, gateway_mac, name, description, variable, unit
            "#,
        )
        .bind(&input.mac_address)
        .bind(gateway_mac)
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.variable)
        .bind(&input.unit)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            conflict_as(e, || {
                format!("Sensor with macAddress '{}' already exists", input.mac_address)
            })
        })
    }

    async fn update_sensor(&self, mac: &str, input: &SensorInput) -> EngineResult<Sensor> {
        self.get_sensor(mac).await?;
        sqlx::query_as::<_, Sensor>(
            r#"
            UPDATE sensors
            SET mac_address = $1, name = $2, description = $3, variable = $4, unit = $5
            WHERE mac_address = $6
            RETURNING mac_address, gateway_mac, name, description, variable, unit
            "#,
        )
        .bind(&input.mac_address)
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.variable)
        .bind(&input.unit)
        .bind(mac)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            conflict_as(e, || {
                format!("Sensor with macAddress '{}' already exists", input.mac_address)
            })
        })
    }

    async fn delete_sensor(&self, mac: &str) -> EngineResult<()> {
        let result = sqlx::query("DELETE FROM sensors WHERE mac_address = $1")
            .bind(mac)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(EngineError::missing(format!("Sensor with id '{mac}' not found")));
        }
        Ok(())
    }
}

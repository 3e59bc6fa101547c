//! Database schema management for `sensornet-analytics`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs`.

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create the schema if it does not exist (idempotent).
///
/// Ownership is exclusive and top-down: every child row references its parent
/// with `ON UPDATE CASCADE ON DELETE CASCADE`, so renaming or deleting a
/// network carries its gateways, sensors and measurements with it.
/// Measurements are keyed by `(sensor_mac, created_at)`.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS networks (
            code        TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT ''
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS gateways (
            mac_address  TEXT PRIMARY KEY,
            network_code TEXT NOT NULL
                REFERENCES networks (code) ON UPDATE CASCADE ON DELETE CASCADE,
            name         TEXT NOT NULL,
            description  TEXT NOT NULL DEFAULT ''
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensors (
            mac_address TEXT PRIMARY KEY,
            gateway_mac TEXT NOT NULL
                REFERENCES gateways (mac_address) ON UPDATE CASCADE ON DELETE CASCADE,
            name        TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            variable    TEXT NOT NULL DEFAULT '',
            unit        TEXT NOT NULL DEFAULT ''
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS measurements (
            sensor_mac TEXT             NOT NULL
                REFERENCES sensors (mac_address) ON UPDATE CASCADE ON DELETE CASCADE,
            created_at TIMESTAMPTZ      NOT NULL,
            value      DOUBLE PRECISION NOT NULL,
            is_outlier BOOLEAN          NOT NULL DEFAULT FALSE,
            PRIMARY KEY (sensor_mac, created_at)
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Enumeration lookups walk parent -> children
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_gateways_network_code
            ON gateways (network_code);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensors_gateway_mac
            ON sensors (gateway_mac);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

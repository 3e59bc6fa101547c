//! Per-sensor measurement endpoints:
//! - `POST .../sensors/{sensor}/measurements` ingest one or many readings
//! - `GET  .../sensors/{sensor}/measurements|stats|outliers` read paths
//! - `DELETE .../sensors/{sensor}/measurements/{createdAt}`

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;
use tracing::{debug, info};

use super::{parse_date, ApiError, AppState, RangeQuery};
use crate::error::EngineError;
use crate::models::{storage_precision, Reading, SensorMeasurements, Statistics};
use crate::store::Store;

// ---

const SENSOR_PATH: &str = "/networks/{code}/gateways/{gateway_mac}/sensors/{sensor_mac}";

pub fn router<S: Store>() -> Router<AppState<S>> {
    // ---
    Router::new()
        .route(
            &format!("{SENSOR_PATH}/measurements"),
            get(get_measurements::<S>).post(post_measurements::<S>),
        )
        .route(
            &format!("{SENSOR_PATH}/measurements/{{created_at}}"),
            delete(delete_measurement::<S>),
        )
        .route(&format!("{SENSOR_PATH}/stats"), get(get_stats::<S>))
        .route(&format!("{SENSOR_PATH}/outliers"), get(get_outliers::<S>))
}

/// Incoming reading before shape checks.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReading {
    created_at: Option<String>,
    value: Option<serde_json::Value>,
}

/// Accept a single reading object as well as an array of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReadingBatch {
    Many(Vec<RawReading>),
    One(RawReading),
}

impl RawReading {
    fn validate(self) -> Result<Reading, EngineError> {
        // ---
        let created_at = parse_date(self.created_at.as_deref())
            .ok_or_else(|| EngineError::InvalidInput("createdAt must be a valid date".into()))?;

        let value = match self.value {
            Some(serde_json::Value::Number(n)) => n.as_f64(),
            Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|v| v.is_finite())
        .ok_or_else(|| EngineError::InvalidInput("value must be a finite number".into()))?;

        Ok(Reading { created_at, value })
    }
}

type SensorPath = Path<(String, String, String)>;

async fn post_measurements<S: Store>(
    State(state): State<AppState<S>>,
    Path((code, gateway_mac, sensor_mac)): SensorPath,
    body: Result<Json<ReadingBatch>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    // ---
    let Json(batch) = body?;
    let raw = match batch {
        ReadingBatch::Many(raw) => raw,
        ReadingBatch::One(raw) => vec![raw],
    };

    // Shape-check the whole batch before anything is written
    let readings = raw
        .into_iter()
        .map(RawReading::validate)
        .collect::<Result<Vec<_>, _>>()?;

    info!("POST measurements for sensor {} ({} readings)", sensor_mac, readings.len());
    let stored = state
        .engine
        .ingestion
        .ingest_batch(&code, &gateway_mac, &sensor_mac, &readings)
        .await?;
    debug!(
        "Stored {} readings, {} flagged as outliers",
        stored.len(),
        stored.iter().filter(|m| m.is_outlier).count()
    );
    Ok(StatusCode::CREATED)
}

async fn get_measurements<S: Store>(
    State(state): State<AppState<S>>,
    Path((code, gateway_mac, sensor_mac)): SensorPath,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> Result<Json<SensorMeasurements>, ApiError> {
    // ---
    let Query(query) = query?;
    let envelope = state
        .engine
        .sensors
        .measurements(&code, &gateway_mac, &sensor_mac, query.range())
        .await?;
    Ok(Json(envelope))
}

async fn get_stats<S: Store>(
    State(state): State<AppState<S>>,
    Path((code, gateway_mac, sensor_mac)): SensorPath,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> Result<Json<Statistics>, ApiError> {
    // ---
    let Query(query) = query?;
    let stats = state
        .engine
        .sensors
        .stats(&code, &gateway_mac, &sensor_mac, query.range())
        .await?;
    Ok(Json(stats))
}

async fn get_outliers<S: Store>(
    State(state): State<AppState<S>>,
    Path((code, gateway_mac, sensor_mac)): SensorPath,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> Result<Json<SensorMeasurements>, ApiError> {
    // ---
    let Query(query) = query?;
    let envelope = state
        .engine
        .sensors
        .outliers(&code, &gateway_mac, &sensor_mac, query.range())
        .await?;
    Ok(Json(envelope))
}

async fn delete_measurement<S: Store>(
    State(state): State<AppState<S>>,
    Path((code, gateway_mac, sensor_mac, created_at)): Path<(String, String, String, String)>,
) -> Result<StatusCode, ApiError> {
    // ---
    let created_at = parse_date(Some(&created_at))
        .map(storage_precision)
        .ok_or_else(|| EngineError::InvalidInput("createdAt must be a valid date".into()))?;
    state
        .engine
        .hierarchy
        .validate_sensor(&code, &gateway_mac, &sensor_mac)
        .await?;
    state
        .store
        .delete_measurement(&sensor_mac, created_at)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

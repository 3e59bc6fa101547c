//! Network-wide read endpoints:
//! `GET /networks/{code}/measurements|stats|outliers?sensorMacs=&startDate=&endDate=`

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::get,
    Json, Router,
};
use tracing::info;

use super::{ApiError, AppState, RangeQuery};
use crate::models::{SensorMeasurements, SensorStatistics};
use crate::store::Store;

// ---

pub fn router<S: Store>() -> Router<AppState<S>> {
    // ---
    Router::new()
        .route("/networks/{code}/measurements", get(get_measurements::<S>))
        .route("/networks/{code}/stats", get(get_stats::<S>))
        .route("/networks/{code}/outliers", get(get_outliers::<S>))
}

async fn get_measurements<S: Store>(
    State(state): State<AppState<S>>,
    Path(code): Path<String>,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> Result<Json<Vec<SensorMeasurements>>, ApiError> {
    // ---
    let Query(query) = query?;
    let sensor_macs = query.sensor_macs();
    info!("GET network {} measurements, sensors={:?}", code, sensor_macs);
    let result = state
        .engine
        .networks
        .measurements(&code, sensor_macs.as_deref(), query.range())
        .await?;
    Ok(Json(result))
}

async fn get_stats<S: Store>(
    State(state): State<AppState<S>>,
    Path(code): Path<String>,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> Result<Json<Vec<SensorStatistics>>, ApiError> {
    // ---
    let Query(query) = query?;
    let sensor_macs = query.sensor_macs();
    info!("GET network {} stats, sensors={:?}", code, sensor_macs);
    let result = state
        .engine
        .networks
        .stats(&code, sensor_macs.as_deref(), query.range())
        .await?;
    Ok(Json(result))
}

async fn get_outliers<S: Store>(
    State(state): State<AppState<S>>,
    Path(code): Path<String>,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> Result<Json<Vec<SensorMeasurements>>, ApiError> {
    // ---
    let Query(query) = query?;
    let sensor_macs = query.sensor_macs();
    info!("GET network {} outliers, sensors={:?}", code, sensor_macs);
    let result = state
        .engine
        .networks
        .outliers(&code, sensor_macs.as_deref(), query.range())
        .await?;
    Ok(Json(result))
}

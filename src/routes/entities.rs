//! CRUD for networks, gateways and sensors.
//!
//! Nested routes check the path hierarchy with the engine's validator before
//! touching the store, so `/networks/A/gateways/X` answers 404 for a gateway
//! that lives in network B.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::info;

use super::{ApiError, AppState};
use crate::error::EngineError;
use crate::models::{Gateway, GatewayInput, Network, NetworkInput, Sensor, SensorInput};
use crate::store::Store;

// ---

pub fn router<S: Store>() -> Router<AppState<S>> {
    // ---
    Router::new()
        .route("/networks", get(list_networks::<S>).post(create_network::<S>))
        .route(
            "/networks/{code}",
            get(get_network::<S>)
                .patch(update_network::<S>)
                .delete(delete_network::<S>),
        )
        .route(
            "/networks/{code}/gateways",
            get(list_gateways::<S>).post(create_gateway::<S>),
        )
        .route(
            "/networks/{code}/gateways/{gateway_mac}",
            get(get_gateway::<S>)
                .patch(update_gateway::<S>)
                .delete(delete_gateway::<S>),
        )
        .route(
            "/networks/{code}/gateways/{gateway_mac}/sensors",
            get(list_sensors::<S>).post(create_sensor::<S>),
        )
        .route(
            "/networks/{code}/gateways/{gateway_mac}/sensors/{sensor_mac}",
            get(get_sensor::<S>)
                .patch(update_sensor::<S>)
                .delete(delete_sensor::<S>),
        )
}

/// Identity and name fields must be present and non-blank.
fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(EngineError::InvalidInput(format!("{field} must not be empty")).into());
    }
    Ok(())
}

// --- networks

async fn list_networks<S: Store>(
    State(state): State<AppState<S>>,
) -> Result<Json<Vec<Network>>, ApiError> {
    Ok(Json(state.store.list_networks().await?))
}

async fn get_network<S: Store>(
    State(state): State<AppState<S>>,
    Path(code): Path<String>,
) -> Result<Json<Network>, ApiError> {
    Ok(Json(state.store.get_network(&code).await?))
}

async fn create_network<S: Store>(
    State(state): State<AppState<S>>,
    body: Result<Json<NetworkInput>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    // ---
    let Json(input) = body?;
    require("code", &input.code)?;
    require("name", &input.name)?;
    let network = state.store.create_network(&input).await?;
    info!("Created network {}", network.code);
    Ok(StatusCode::CREATED)
}

async fn update_network<S: Store>(
    State(state): State<AppState<S>>,
    Path(code): Path<String>,
    body: Result<Json<NetworkInput>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    // ---
    let Json(input) = body?;
    require("code", &input.code)?;
    require("name", &input.name)?;
    state.store.update_network(&code, &input).await?;
    info!("Updated network {} -> {}", code, input.code);
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_network<S: Store>(
    State(state): State<AppState<S>>,
    Path(code): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_network(&code).await?;
    info!("Deleted network {}", code);
    Ok(StatusCode::NO_CONTENT)
}

// --- gateways

async fn list_gateways<S: Store>(
    State(state): State<AppState<S>>,
    Path(code): Path<String>,
) -> Result<Json<Vec<Gateway>>, ApiError> {
    Ok(Json(state.store.list_gateways_of_network(&code).await?))
}

async fn get_gateway<S: Store>(
    State(state): State<AppState<S>>,
    Path((code, gateway_mac)): Path<(String, String)>,
) -> Result<Json<Gateway>, ApiError> {
    // ---
    let resolved = state
        .engine
        .hierarchy
        .validate(Some(&code), Some(&gateway_mac), None)
        .await?;
    let gateway = resolved.gateway.ok_or_else(|| {
        EngineError::missing(format!("Gateway with id '{gateway_mac}' not found"))
    })?;
    Ok(Json(gateway))
}

async fn create_gateway<S: Store>(
    State(state): State<AppState<S>>,
    Path(code): Path<String>,
    body: Result<Json<GatewayInput>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    // ---
    let Json(input) = body?;
    require("macAddress", &input.mac_address)?;
    require("name", &input.name)?;
    let gateway = state.store.create_gateway(&code, &input).await?;
    info!("Created gateway {} in network {}", gateway.mac_address, code);
    Ok(StatusCode::CREATED)
}

async fn update_gateway<S: Store>(
    State(state): State<AppState<S>>,
    Path((code, gateway_mac)): Path<(String, String)>,
    body: Result<Json<GatewayInput>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    // ---
    let Json(input) = body?;
    require("macAddress", &input.mac_address)?;
    require("name", &input.name)?;
    state
        .engine
        .hierarchy
        .validate(Some(&code), Some(&gateway_mac), None)
        .await?;
    state.store.update_gateway(&gateway_mac, &input).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_gateway<S: Store>(
    State(state): State<AppState<S>>,
    Path((code, gateway_mac)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    // ---
    state
        .engine
        .hierarchy
        .validate(Some(&code), Some(&gateway_mac), None)
        .await?;
    state.store.delete_gateway(&gateway_mac).await?;
    info!("Deleted gateway {}", gateway_mac);
    Ok(StatusCode::NO_CONTENT)
}

// --- sensors

async fn list_sensors<S: Store>(
    State(state): State<AppState<S>>,
    Path((code, gateway_mac)): Path<(String, String)>,
) -> Result<Json<Vec<Sensor>>, ApiError> {
    // ---
    state
        .engine
        .hierarchy
        .validate(Some(&code), Some(&gateway_mac), None)
        .await?;
    Ok(Json(state.store.list_sensors_of_gateway(&gateway_mac).await?))
}

async fn get_sensor<S: Store>(
    State(state): State<AppState<S>>,
    Path((code, gateway_mac, sensor_mac)): Path<(String, String, String)>,
) -> Result<Json<Sensor>, ApiError> {
    let sensor = state
        .engine
        .hierarchy
        .validate_sensor(&code, &gateway_mac, &sensor_mac)
        .await?;
    Ok(Json(sensor))
}

async fn create_sensor<S: Store>(
    State(state): State<AppState<S>>,
    Path((code, gateway_mac)): Path<(String, String)>,
    body: Result<Json<SensorInput>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    // ---
    let Json(input) = body?;
    require("macAddress", &input.mac_address)?;
    require("name", &input.name)?;
    state
        .engine
        .hierarchy
        .validate(Some(&code), Some(&gateway_mac), None)
        .await?;
    let sensor = state.store.create_sensor(&gateway_mac, &input).await?;
    info!("Created sensor {} on gateway {}", sensor.mac_address, gateway_mac);
    Ok(StatusCode::CREATED)
}

async fn update_sensor<S: Store>(
    State(state): State<AppState<S>>,
    Path((code, gateway_mac, sensor_mac)): Path<(String, String, String)>,
    body: Result<Json<SensorInput>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    // ---
    let Json(input) = body?;
    require("macAddress", &input.mac_address)?;
    require("name", &input.name)?;
    state
        .engine
        .hierarchy
        .validate_sensor(&code, &gateway_mac, &sensor_mac)
        .await?;
    state.store.update_sensor(&sensor_mac, &input).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_sensor<S: Store>(
    State(state): State<AppState<S>>,
    Path((code, gateway_mac, sensor_mac)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    // ---
    state
        .engine
        .hierarchy
        .validate_sensor(&code, &gateway_mac, &sensor_mac)
        .await?;
    state.store.delete_sensor(&sensor_mac).await?;
    info!("Deleted sensor {}", sensor_mac);
    Ok(StatusCode::NO_CONTENT)
}

//! HTTP surface. Everything here is boundary work: path/query/body parsing,
//! input shape checks, and mapping engine results onto status codes. The
//! engine itself never sees HTTP types.

use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::engine::{Engine, EngineOptions};
use crate::models::DateRange;
use crate::store::Store;

mod entities;
mod error;
mod health;
mod measurements;
mod network_measurements;

pub use error::ApiError;

// ---

/// Shared handler state: the store for CRUD and the engine built over it.
pub struct AppState<S> {
    pub store: Arc<S>,
    pub engine: Engine<S>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            engine: self.engine.clone(),
        }
    }
}

pub fn router<S: Store>(store: Arc<S>, options: EngineOptions) -> Router {
    // ---
    let state = AppState {
        engine: Engine::new(Arc::clone(&store), options),
        store,
    };

    let api = Router::new()
        .merge(entities::router())
        .merge(measurements::router())
        .merge(network_measurements::router());

    Router::new()
        .nest("/api/v1", api)
        .merge(health::router())
        .with_state(state)
}

/// `?startDate=&endDate=` shared by every measurement read endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RangeQuery {
    start_date: Option<String>,
    end_date: Option<String>,
    /// Comma-separated, network endpoints only.
    sensor_macs: Option<String>,
}

impl RangeQuery {
    /// Unparseable bounds count as absent.
    pub(crate) fn range(&self) -> DateRange {
        DateRange::new(
            parse_date(self.start_date.as_deref()),
            parse_date(self.end_date.as_deref()),
        )
    }

    pub(crate) fn sensor_macs(&self) -> Option<Vec<String>> {
        let raw = self.sensor_macs.as_deref()?;
        let macs: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(String::from)
            .collect();
        if macs.is_empty() {
            None
        } else {
            Some(macs)
        }
    }
}

pub(crate) fn parse_date(raw: Option<&str>) -> Option<DateTime<Utc>> {
    // ---
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            debug!("Ignoring unparseable date '{}': {}", raw, e);
            None
        }
    }
}

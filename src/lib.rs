//! Measurement analytics and hierarchy validation for sensor networks.
//!
//! Sensors hang off gateways, gateways off networks. The [`engine`] checks
//! that containment chain before every measurement read or write, computes
//! descriptive statistics over measurement sets, and flags readings outside
//! the mean ± 2σ band. [`store`] defines what the engine needs from
//! persistence; [`routes`] exposes it over HTTP.

pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod routes;
pub mod schema;
pub mod store;

pub use config::Config;
pub use error::{EngineError, EngineResult, ErrorKind};
pub use models::{
    DateRange, Gateway, Measurement, Network, Reading, Sensor, SensorMeasurements,
    SensorStatistics, Statistics,
};

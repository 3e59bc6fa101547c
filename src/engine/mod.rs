//! Measurement analytics and hierarchy validation.
//!
//! - [`hierarchy`]: containment checks for network → gateway → sensor
//! - [`statistics`]: mean / population variance / ±2σ band over a set
//! - [`outliers`]: classification against a reference band
//! - [`sensor_query`], [`network_query`]: read paths
//! - [`ingestion`]: write path
//!
//! Every service holds an `Arc` to the store it was built with; there is no
//! process-wide state.

use std::sync::Arc;

use crate::store::{HierarchyStore, MeasurementStore};

pub mod hierarchy;
pub mod ingestion;
pub mod network_query;
pub mod outliers;
pub mod sensor_query;
pub mod statistics;

#[cfg(test)]
pub(crate) mod testing;

pub use hierarchy::{HierarchyValidator, ResolvedHierarchy};
pub use ingestion::{BatchBaseline, IngestionService};
pub use network_query::NetworkQueryService;
pub use sensor_query::SensorQueryService;

// ---

/// Tuning knobs for [`Engine::new`].
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub batch_baseline: BatchBaseline,
    pub fanout_limit: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            batch_baseline: BatchBaseline::default(),
            fanout_limit: network_query::DEFAULT_FANOUT_LIMIT,
        }
    }
}

/// All engine services wired to one store.
pub struct Engine<S: ?Sized> {
    pub hierarchy: HierarchyValidator<S>,
    pub sensors: SensorQueryService<S>,
    pub networks: NetworkQueryService<S>,
    pub ingestion: IngestionService<S>,
}

impl<S: ?Sized> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Self {
            hierarchy: self.hierarchy.clone(),
            sensors: self.sensors.clone(),
            networks: self.networks.clone(),
            ingestion: self.ingestion.clone(),
        }
    }
}

impl<S> Engine<S>
where
    S: HierarchyStore + MeasurementStore + ?Sized,
{
    pub fn new(store: Arc<S>, options: EngineOptions) -> Self {
        Self {
            hierarchy: HierarchyValidator::new(Arc::clone(&store)),
            sensors: SensorQueryService::new(Arc::clone(&store)),
            networks: NetworkQueryService::with_fanout_limit(
                Arc::clone(&store),
                options.fanout_limit,
            ),
            ingestion: IngestionService::with_batch_baseline(store, options.batch_baseline),
        }
    }
}

//! Measurement ingestion.
//!
//! An incoming reading is classified against the statistics of the sensor's
//! existing history, never against a set that includes the reading itself.
//! The read-compute-insert sequence is not isolated: two concurrent writers to
//! the same sensor may each miss the other's reading in their baseline. The
//! store's duplicate-key check is the only hard guard.

use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info};

use super::hierarchy::HierarchyValidator;
use super::{outliers, statistics};
use crate::error::{EngineError, EngineResult};
use crate::models::{storage_precision, DateRange, Measurement, Reading, Statistics};
use crate::store::{HierarchyStore, MeasurementStore};

// ---

/// How a batch of readings picks its baseline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BatchBaseline {
    /// Each reading is judged against history as persisted so far, including
    /// earlier readings of the same batch.
    #[default]
    Evolving,
    /// Every reading of the batch is judged against history as it stood when
    /// the batch started.
    Frozen,
}

impl FromStr for BatchBaseline {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "evolving" => Ok(BatchBaseline::Evolving),
            "frozen" => Ok(BatchBaseline::Frozen),
            other => Err(format!("expected 'evolving' or 'frozen', got '{other}'")),
        }
    }
}

pub struct IngestionService<S: ?Sized> {
    store: Arc<S>,
    validator: HierarchyValidator<S>,
    batch_baseline: BatchBaseline,
}

impl<S: ?Sized> Clone for IngestionService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            validator: self.validator.clone(),
            batch_baseline: self.batch_baseline,
        }
    }
}

impl<S> IngestionService<S>
where
    S: HierarchyStore + MeasurementStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self::with_batch_baseline(store, BatchBaseline::default())
    }

    pub fn with_batch_baseline(store: Arc<S>, batch_baseline: BatchBaseline) -> Self {
        Self {
            validator: HierarchyValidator::new(Arc::clone(&store)),
            store,
            batch_baseline,
        }
    }

    /// Validate, classify against prior history, persist. Returns the stored
    /// measurement. A taken `(sensor, createdAt)` slot fails with Conflict.
    pub async fn ingest(
        &self,
        network_code: &str,
        gateway_mac: &str,
        sensor_mac: &str,
        reading: Reading,
    ) -> EngineResult<Measurement> {
        // ---
        self.validator
            .validate_sensor(network_code, gateway_mac, sensor_mac)
            .await?;
        let baseline = self.baseline(sensor_mac).await?;
        self.persist(sensor_mac, reading, baseline.as_ref()).await
    }

    /// Ingest readings in the given order under the configured
    /// [`BatchBaseline`]. Stops at the first failure; readings already
    /// persisted stay persisted.
    pub async fn ingest_batch(
        &self,
        network_code: &str,
        gateway_mac: &str,
        sensor_mac: &str,
        readings: &[Reading],
    ) -> EngineResult<Vec<Measurement>> {
        // ---
        info!(
            sensor = sensor_mac,
            count = readings.len(),
            policy = ?self.batch_baseline,
            "ingesting batch"
        );
        // Checked once up front, so an empty batch still fails on a bad path
        self.validator
            .validate_sensor(network_code, gateway_mac, sensor_mac)
            .await?;

        let mut stored = Vec::with_capacity(readings.len());
        match self.batch_baseline {
            BatchBaseline::Evolving => {
                for reading in readings {
                    let baseline = self.baseline(sensor_mac).await?;
                    stored.push(self.persist(sensor_mac, *reading, baseline.as_ref()).await?);
                }
            }
            BatchBaseline::Frozen => {
                let baseline = self.baseline(sensor_mac).await?;
                for reading in readings {
                    stored.push(self.persist(sensor_mac, *reading, baseline.as_ref()).await?);
                }
            }
        }
        Ok(stored)
    }

    /// Statistics of the full existing history, or `None` when there is none.
    async fn baseline(&self, sensor_mac: &str) -> EngineResult<Option<Statistics>> {
        let history = self
            .store
            .list_measurements(sensor_mac, DateRange::default())
            .await?;
        if history.is_empty() {
            return Ok(None);
        }
        Ok(Some(statistics::compute(&history)))
    }

    async fn persist(
        &self,
        sensor_mac: &str,
        reading: Reading,
        baseline: Option<&Statistics>,
    ) -> EngineResult<Measurement> {
        // ---
        if !reading.value.is_finite() {
            return Err(EngineError::InvalidInput(format!(
                "value must be a finite number, got {}",
                reading.value
            )));
        }
        let is_outlier = baseline.map_or(false, |stats| outliers::is_outlier(reading.value, stats));
        debug!(
            sensor = sensor_mac,
            value = reading.value,
            is_outlier,
            "classified incoming reading"
        );

        let created_at = storage_precision(reading.created_at);
        self.store
            .insert_measurement(sensor_mac, created_at, reading.value, is_outlier)
            .await?;
        Ok(Measurement {
            created_at,
            value: reading.value,
            is_outlier,
        })
    }
}

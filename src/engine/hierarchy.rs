//! Containment checks for the network → gateway → sensor chain.
//!
//! A child that exists under a different parent is reported exactly like a
//! missing child, so a caller scoped to one network cannot probe for entities
//! in another. The [`NotFoundDiagnostic`](crate::error::NotFoundDiagnostic)
//! on the error still tells the two apart for logging.

use std::sync::Arc;

use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::models::{Gateway, Network, Sensor};
use crate::store::HierarchyStore;

// ---

/// Entities resolved by [`HierarchyValidator::validate`], one per supplied id.
#[derive(Debug, Clone, Default)]
pub struct ResolvedHierarchy {
    pub network: Option<Network>,
    pub gateway: Option<Gateway>,
    pub sensor: Option<Sensor>,
}

pub struct HierarchyValidator<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for HierarchyValidator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> HierarchyValidator<S>
where
    S: HierarchyStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Resolve every supplied identifier parent-first and check each link.
    /// Fails with NotFound on the first missing entity or broken link.
    pub async fn validate(
        &self,
        network_code: Option<&str>,
        gateway_mac: Option<&str>,
        sensor_mac: Option<&str>,
    ) -> EngineResult<ResolvedHierarchy> {
        // ---
        let network = match network_code {
            Some(code) => Some(self.store.get_network(code).await?),
            None => None,
        };

        let gateway = match gateway_mac {
            Some(mac) => {
                let gateway = self.store.get_gateway(mac).await?;
                if let Some(code) = network_code {
                    if gateway.network_code != code {
                        debug!(gateway = mac, network = code, "gateway outside network");
                        return Err(EngineError::mismatch(format!(
                            "Gateway {mac} does not belong to network {code}"
                        )));
                    }
                }
                Some(gateway)
            }
            None => None,
        };

        let sensor = match sensor_mac {
            Some(mac) => {
                let sensor = self.store.get_sensor(mac).await?;
                if let Some(gw) = gateway_mac {
                    if sensor.gateway_mac != gw {
                        debug!(sensor = mac, gateway = gw, "sensor outside gateway");
                        return Err(EngineError::mismatch(format!(
                            "Sensor {mac} does not belong to gateway {gw}"
                        )));
                    }
                }
                Some(sensor)
            }
            None => None,
        };

        Ok(ResolvedHierarchy {
            network,
            gateway,
            sensor,
        })
    }

    /// Shorthand for the full triple, the common case for sensor endpoints.
    pub async fn validate_sensor(
        &self,
        network_code: &str,
        gateway_mac: &str,
        sensor_mac: &str,
    ) -> EngineResult<Sensor> {
        let resolved = self
            .validate(Some(network_code), Some(gateway_mac), Some(sensor_mac))
            .await?;
        resolved
            .sensor
            .ok_or_else(|| EngineError::missing(format!("Sensor with id '{sensor_mac}' not found")))
    }
}

//! In-process store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Store, StoreError};
use crate::domain::{
    CanonicalEntity, Journey, Operator, RealtimeJourney, Service, ServiceAlert,
    ServiceProjection, Stop, StopGroup,
};

#[derive(Default)]
struct Collections {
    operators: BTreeMap<String, Operator>,
    stops: BTreeMap<String, Stop>,
    stop_groups: BTreeMap<String, StopGroup>,
    services: BTreeMap<String, Service>,
    journeys: BTreeMap<String, Journey>,
    realtime_journeys: BTreeMap<String, RealtimeJourney>,
    service_alerts: BTreeMap<String, ServiceAlert>,
}

/// Store backed by ordered maps behind a read/write lock.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored journeys.
    pub async fn journey_count(&self) -> usize {
        self.inner.read().await.journeys.len()
    }

    /// Number of stored entities of every kind.
    pub async fn len(&self) -> usize {
        let c = self.inner.read().await;
        c.operators.len()
            + c.stops.len()
            + c.stop_groups.len()
            + c.services.len()
            + c.journeys.len()
            + c.realtime_journeys.len()
            + c.service_alerts.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert(&self, entities: Vec<CanonicalEntity>) -> Result<usize, StoreError> {
        let mut c = self.inner.write().await;
        let count = entities.len();

        for entity in entities {
            match entity {
                CanonicalEntity::Operator(e) => {
                    c.operators.insert(e.primary_identifier.clone(), e);
                }
                CanonicalEntity::Stop(e) => {
                    c.stops.insert(e.primary_identifier.clone(), e);
                }
                CanonicalEntity::StopGroup(e) => {
                    c.stop_groups.insert(e.identifier.clone(), e);
                }
                CanonicalEntity::Service(e) => {
                    c.services.insert(e.primary_identifier.clone(), e);
                }
                CanonicalEntity::Journey(e) => {
                    c.journeys.insert(e.primary_identifier.clone(), e);
                }
                CanonicalEntity::RealtimeJourney(e) => {
                    c.realtime_journeys.insert(e.primary_identifier.clone(), e);
                }
                CanonicalEntity::ServiceAlert(e) => {
                    c.service_alerts.insert(e.primary_identifier.clone(), e);
                }
            }
        }

        Ok(count)
    }

    async fn find_operator(&self, reference: &str) -> Result<Option<Operator>, StoreError> {
        let c = self.inner.read().await;
        if let Some(operator) = c.operators.get(reference) {
            return Ok(Some(operator.clone()));
        }
        Ok(c
            .operators
            .values()
            .find(|o| o.is_identified_by(reference))
            .cloned())
    }

    async fn find_service(
        &self,
        identifier: &str,
        projection: ServiceProjection,
    ) -> Result<Option<Service>, StoreError> {
        let c = self.inner.read().await;
        Ok(c.services.get(identifier).cloned().map(|s| projection.apply(s)))
    }

    async fn find_stop(&self, reference: &str) -> Result<Option<Stop>, StoreError> {
        let c = self.inner.read().await;
        if let Some(stop) = c.stops.get(reference) {
            return Ok(Some(stop.clone()));
        }
        Ok(c.stops.values().find(|s| s.is_identified_by(reference)).cloned())
    }

    async fn find_stop_group(&self, identifier: &str) -> Result<Option<StopGroup>, StoreError> {
        Ok(self.inner.read().await.stop_groups.get(identifier).cloned())
    }

    async fn stops_in_group(&self, group_identifier: &str) -> Result<Vec<Stop>, StoreError> {
        let c = self.inner.read().await;
        Ok(c.stops
            .values()
            .filter(|s| s.belongs_to(group_identifier))
            .cloned()
            .collect())
    }

    async fn find_journey(&self, identifier: &str) -> Result<Option<Journey>, StoreError> {
        Ok(self.inner.read().await.journeys.get(identifier).cloned())
    }

    async fn service_refs_touching(&self, stop_ids: &[String]) -> Result<Vec<String>, StoreError> {
        let c = self.inner.read().await;
        Ok(c.journeys
            .values()
            .filter(|j| j.touches_any(stop_ids))
            .map(|j| j.service_ref.clone())
            .collect())
    }

    async fn latest_realtime_journey(
        &self,
        journey_ref: &str,
    ) -> Result<Option<RealtimeJourney>, StoreError> {
        let c = self.inner.read().await;
        Ok(c.realtime_journeys
            .values()
            .filter(|rt| rt.journey_ref == journey_ref)
            .max_by_key(|rt| rt.modification_time)
            .cloned())
    }

    async fn alerts_matching(&self, identifiers: &[String]) -> Result<Vec<ServiceAlert>, StoreError> {
        let c = self.inner.read().await;
        Ok(c.service_alerts
            .values()
            .filter(|a| a.matched_identifiers.iter().any(|id| identifiers.contains(id)))
            .cloned()
            .collect())
    }
}

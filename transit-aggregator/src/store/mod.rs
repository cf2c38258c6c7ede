//! Document store contract.
//!
//! The store owns canonical entities. Production deployments plug in a
//! document database; [`MemoryStore`] implements the same contract in
//! process for development and tests.

mod error;
mod memory;

use async_trait::async_trait;

use crate::domain::{
    CanonicalEntity, Journey, Operator, RealtimeJourney, Service, ServiceAlert,
    ServiceProjection, Stop, StopGroup,
};

pub use error::StoreError;
pub use memory::MemoryStore;

/// Keyed lookups and filtered scans over canonical entities.
///
/// No transactional guarantees are assumed across entities. A lookup that
/// matches nothing returns `Ok(None)`; `Err` means the backend failed.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert or replace entities by primary identifier. Returns the count written.
    async fn upsert(&self, entities: Vec<CanonicalEntity>) -> Result<usize, StoreError>;

    /// Operator whose primary identifier or any alternate identifier equals `reference`.
    async fn find_operator(&self, reference: &str) -> Result<Option<Operator>, StoreError>;

    /// Service by primary identifier.
    async fn find_service(
        &self,
        identifier: &str,
        projection: ServiceProjection,
    ) -> Result<Option<Service>, StoreError>;

    /// Stop whose own identifier or one of whose platform identifiers equals `reference`.
    async fn find_stop(&self, reference: &str) -> Result<Option<Stop>, StoreError>;

    async fn find_stop_group(&self, identifier: &str) -> Result<Option<StopGroup>, StoreError>;

    /// Stops associated with a stop group.
    async fn stops_in_group(&self, group_identifier: &str) -> Result<Vec<Stop>, StoreError>;

    async fn find_journey(&self, identifier: &str) -> Result<Option<Journey>, StoreError>;

    /// Service reference of every journey whose path starts or ends a hop
    /// at one of `stop_ids`. One entry per matching journey, so the same
    /// reference may repeat.
    async fn service_refs_touching(&self, stop_ids: &[String]) -> Result<Vec<String>, StoreError>;

    /// Most recently modified live record tracking `journey_ref`.
    async fn latest_realtime_journey(
        &self,
        journey_ref: &str,
    ) -> Result<Option<RealtimeJourney>, StoreError>;

    /// Alerts naming any of `identifiers`.
    async fn alerts_matching(&self, identifiers: &[String]) -> Result<Vec<ServiceAlert>, StoreError>;
}

//! Lazy reference resolution.
//!
//! Entities hold their relations as identifiers. The resolver fills in the
//! matching `Option` fields from the store on demand. Every method is
//! idempotent: an already populated field is left alone, and a reference
//! the store doesn't know leaves the field `None`.

use std::sync::Arc;

use futures::future::join_all;
use tracing::debug;

use crate::domain::{Journey, PathItem, Service, ServiceProjection, Stop};
use crate::store::{Store, StoreError};

/// Materializes relation fields from the store.
#[derive(Clone)]
pub struct Resolver {
    store: Arc<dyn Store>,
}

impl Resolver {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Fill `journey.operator` by primary or alternate identifier.
    pub async fn resolve_operator(&self, journey: &mut Journey) -> Result<(), StoreError> {
        if journey.operator.is_some() || journey.operator_ref.is_empty() {
            return Ok(());
        }
        journey.operator = self.store.find_operator(&journey.operator_ref).await?;
        Ok(())
    }

    /// Fill `journey.service`.
    pub async fn resolve_service(&self, journey: &mut Journey) -> Result<(), StoreError> {
        if journey.service.is_some() || journey.service_ref.is_empty() {
            return Ok(());
        }
        journey.service = self
            .store
            .find_service(&journey.service_ref, ServiceProjection::Full)
            .await?;
        Ok(())
    }

    /// Fill a journey's service and operator.
    pub async fn resolve_references(&self, journey: &mut Journey) -> Result<(), StoreError> {
        self.resolve_service(journey).await?;
        self.resolve_operator(journey).await
    }

    /// Fill a service's operator, one level deep.
    pub async fn resolve_service_operator(&self, service: &mut Service) -> Result<(), StoreError> {
        if service.operator.is_some() || service.operator_ref.is_empty() {
            return Ok(());
        }
        service.operator = self.store.find_operator(&service.operator_ref).await?;
        Ok(())
    }

    /// Fill the origin and destination stop of every path item.
    ///
    /// One task per path item, all started before any is awaited. Each task
    /// owns its own item, so completion order doesn't matter. Returns the
    /// first store error after every task has finished; items whose lookups
    /// succeeded keep their stops either way.
    pub async fn resolve_deep(&self, journey: &mut Journey) -> Result<(), StoreError> {
        let store = self.store.as_ref();
        let tasks = journey
            .path
            .iter_mut()
            .map(|item| resolve_path_item(store, item));

        let results = join_all(tasks).await;

        let mut first_error = None;
        for error in results.into_iter().filter_map(Result::err) {
            debug!(journey = %journey.primary_identifier, error = %error, "Stop resolution failed");
            first_error.get_or_insert(error);
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

async fn resolve_path_item(store: &dyn Store, item: &mut PathItem) -> Result<(), StoreError> {
    let (origin, destination) = futures::join!(
        lookup_stop(store, &item.origin_stop, &item.origin_stop_ref),
        lookup_stop(store, &item.destination_stop, &item.destination_stop_ref),
    );

    if let Some(stop) = origin? {
        item.origin_stop = Some(stop);
    }
    if let Some(stop) = destination? {
        item.destination_stop = Some(stop);
    }
    Ok(())
}

/// Look up `reference` unless `current` is already populated.
async fn lookup_stop(
    store: &dyn Store,
    current: &Option<Stop>,
    reference: &str,
) -> Result<Option<Stop>, StoreError> {
    if current.is_some() || reference.is_empty() {
        return Ok(None);
    }
    store.find_stop(reference).await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::DateTime;

    use super::*;
    use crate::domain::{
        CanonicalEntity, Operator, RealtimeJourney, ServiceAlert, StopGroup,
    };
    use crate::store::MemoryStore;

    /// Wraps a memory store, delaying stop lookups and tracking concurrency.
    ///
    /// Earlier stops in the alphabet sleep longer, so tasks finish in
    /// reverse order of starting.
    struct DelayedStore {
        inner: MemoryStore,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        stop_lookups: AtomicUsize,
        fail_on: Option<String>,
    }

    impl DelayedStore {
        fn new(inner: MemoryStore) -> Self {
            Self {
                inner,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                stop_lookups: AtomicUsize::new(0),
                fail_on: None,
            }
        }
    }

    #[async_trait]
    impl Store for DelayedStore {
        async fn upsert(&self, entities: Vec<CanonicalEntity>) -> Result<usize, StoreError> {
            self.inner.upsert(entities).await
        }
        async fn find_operator(&self, reference: &str) -> Result<Option<Operator>, StoreError> {
            self.inner.find_operator(reference).await
        }
        async fn find_service(
            &self,
            identifier: &str,
            projection: ServiceProjection,
        ) -> Result<Option<Service>, StoreError> {
            self.inner.find_service(identifier, projection).await
        }
        async fn find_stop(&self, reference: &str) -> Result<Option<Stop>, StoreError> {
            self.stop_lookups.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let rank = reference.bytes().last().unwrap_or(b'0');
            let delay = 30u64.saturating_sub(u64::from(rank % 10) * 3);
            tokio::time::sleep(Duration::from_millis(delay)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.fail_on.as_deref() == Some(reference) {
                return Err(StoreError::Backend {
                    message: "lookup failed".into(),
                });
            }
            self.inner.find_stop(reference).await
        }
        async fn find_stop_group(&self, identifier: &str) -> Result<Option<StopGroup>, StoreError> {
            self.inner.find_stop_group(identifier).await
        }
        async fn stops_in_group(&self, group: &str) -> Result<Vec<Stop>, StoreError> {
            self.inner.stops_in_group(group).await
        }
        async fn find_journey(&self, identifier: &str) -> Result<Option<Journey>, StoreError> {
            self.inner.find_journey(identifier).await
        }
        async fn service_refs_touching(&self, stop_ids: &[String]) -> Result<Vec<String>, StoreError> {
            self.inner.service_refs_touching(stop_ids).await
        }
        async fn latest_realtime_journey(
            &self,
            journey_ref: &str,
        ) -> Result<Option<RealtimeJourney>, StoreError> {
            self.inner.latest_realtime_journey(journey_ref).await
        }
        async fn alerts_matching(&self, identifiers: &[String]) -> Result<Vec<ServiceAlert>, StoreError> {
            self.inner.alerts_matching(identifiers).await
        }
    }

    async fn seeded(stops: &[&str]) -> MemoryStore {
        let store = MemoryStore::new();
        let mut entities: Vec<CanonicalEntity> = stops
            .iter()
            .map(|id| CanonicalEntity::Stop(Stop::new(*id, format!("Stop {id}"))))
            .collect();

        let mut operator = Operator::new("GB:NOC:ABCD", "Test Buses");
        operator.other_identifiers = vec!["GB:TOC:AB".into()];
        entities.push(CanonicalEntity::Operator(operator));
        entities.push(CanonicalEntity::Service(Service::new(
            "SVC1",
            "72",
            "GB:TOC:AB",
        )));

        store.upsert(entities).await.unwrap();
        store
    }

    fn journey(stops: &[&str]) -> Journey {
        let departure = DateTime::parse_from_rfc3339("2024-03-15T08:00:00+00:00").unwrap();
        let mut j = Journey::new("J1", "SVC1", departure);
        j.operator_ref = "GB:TOC:AB".into();
        j.path = stops
            .windows(2)
            .map(|pair| PathItem::between(pair[0], pair[1]))
            .collect();
        j
    }

    #[tokio::test]
    async fn deep_resolution_fills_every_stop_concurrently() {
        let stops = ["STOP1", "STOP2", "STOP3", "STOP4", "STOP5", "STOP6"];
        let store = Arc::new(DelayedStore::new(seeded(&stops).await));
        let resolver = Resolver::new(store.clone());

        let mut j = journey(&stops);
        resolver.resolve_deep(&mut j).await.unwrap();

        let k = j.path.len();
        assert_eq!(k, 5);
        for item in &j.path {
            assert_eq!(
                item.origin_stop.as_ref().map(|s| s.primary_identifier.as_str()),
                Some(item.origin_stop_ref.as_str())
            );
            assert_eq!(
                item.destination_stop.as_ref().map(|s| s.primary_identifier.as_str()),
                Some(item.destination_stop_ref.as_str())
            );
        }

        // Every lookup was in flight before the first one finished.
        assert_eq!(store.max_in_flight.load(Ordering::SeqCst), 2 * k);
    }

    #[tokio::test]
    async fn unknown_stop_stays_unset() {
        let store = Arc::new(seeded(&["STOP1", "STOP2"]).await);
        let resolver = Resolver::new(store);

        let mut j = journey(&["STOP1", "STOP2", "GHOST"]);
        resolver.resolve_deep(&mut j).await.unwrap();

        assert!(j.path[0].origin_stop.is_some());
        assert!(j.path[0].destination_stop.is_some());
        assert!(j.path[1].origin_stop.is_some());
        assert!(j.path[1].destination_stop.is_none());
    }

    #[tokio::test]
    async fn deep_resolution_is_idempotent() {
        let stops = ["STOP1", "STOP2", "STOP3"];
        let store = Arc::new(DelayedStore::new(seeded(&stops).await));
        let resolver = Resolver::new(store.clone());

        let mut j = journey(&stops);
        resolver.resolve_deep(&mut j).await.unwrap();
        let first = j.clone();
        let lookups = store.stop_lookups.load(Ordering::SeqCst);

        resolver.resolve_deep(&mut j).await.unwrap();
        assert_eq!(j, first);
        assert_eq!(store.stop_lookups.load(Ordering::SeqCst), lookups);
    }

    #[tokio::test]
    async fn store_error_surfaces_after_all_tasks_finish() {
        let stops = ["STOP1", "STOP2", "STOP3"];
        let mut delayed = DelayedStore::new(seeded(&stops).await);
        delayed.fail_on = Some("STOP3".into());
        let resolver = Resolver::new(Arc::new(delayed));

        let mut j = journey(&stops);
        let err = resolver.resolve_deep(&mut j).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend { .. }));

        // The unaffected hop still resolved.
        assert!(j.path[0].origin_stop.is_some());
        assert!(j.path[0].destination_stop.is_some());
    }

    #[tokio::test]
    async fn operator_resolves_by_alternate_identifier() {
        let resolver = Resolver::new(Arc::new(seeded(&[]).await));
        let mut j = journey(&[]);

        resolver.resolve_references(&mut j).await.unwrap();

        let operator = j.operator.expect("operator resolved");
        assert_eq!(operator.primary_identifier, "GB:NOC:ABCD");
        assert_eq!(j.service.map(|s| s.service_name), Some("72".to_string()));
    }

    #[tokio::test]
    async fn missing_references_are_not_errors() {
        let resolver = Resolver::new(Arc::new(MemoryStore::new()));
        let mut j = journey(&["A", "B"]);

        resolver.resolve_references(&mut j).await.unwrap();
        resolver.resolve_deep(&mut j).await.unwrap();

        assert!(j.operator.is_none());
        assert!(j.service.is_none());
        assert!(j.path[0].origin_stop.is_none());
    }

    #[tokio::test]
    async fn populated_operator_is_kept() {
        let resolver = Resolver::new(Arc::new(seeded(&[]).await));
        let mut j = journey(&[]);
        j.operator = Some(Operator::new("PRESET", "Already Here"));

        resolver.resolve_operator(&mut j).await.unwrap();
        assert_eq!(j.operator.unwrap().primary_identifier, "PRESET");
    }

    #[tokio::test]
    async fn service_operator_depth_one() {
        let resolver = Resolver::new(Arc::new(seeded(&[]).await));
        let mut service = Service::new("SVC1", "72", "GB:TOC:AB");

        resolver.resolve_service_operator(&mut service).await.unwrap();
        assert_eq!(
            service.operator.map(|o| o.name),
            Some("Test Buses".to_string())
        );
    }
}

//! Cached query service.
//!
//! Each query computes a deterministic key, tries the cache, and on a miss
//! runs the authoritative computation against the store and caches the
//! result for a fixed TTL. There is no invalidation and no coalescing of
//! concurrent misses: the last write wins and staleness is bounded by TTL.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::cache::{CacheKey, ResultCache};
use crate::domain::views::{JourneyDetailedView, ServiceSummaryView};
use crate::domain::{Journey, Service, ServiceAlert, ServiceProjection, Stop};
use crate::realtime::OverlayEngine;
use crate::resolve::Resolver;
use crate::store::{Store, StoreError};

/// Configuration for the query service.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// How long a computed result stays in the cache.
    pub cache_ttl: Duration,
}

impl QueryConfig {
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// A freshly computed query result and whether every enrichment succeeded.
struct Computed<T> {
    value: T,
    complete: bool,
}

impl<T> Computed<T> {
    fn complete(value: T) -> Self {
        Self {
            value,
            complete: true,
        }
    }
}

/// Read-side queries over the store, cached.
///
/// Store failures on the authoritative read are logged and produce an
/// empty result that is not cached; callers never see an error. Enrichment
/// (operator, service and stop resolution) is best-effort: a failed lookup
/// leaves the field unset, and the partial result is served but not cached.
pub struct QueryService {
    store: Arc<dyn Store>,
    cache: Arc<dyn ResultCache>,
    resolver: Resolver,
    overlay: OverlayEngine,
    config: QueryConfig,
}

impl QueryService {
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<dyn ResultCache>,
        overlay: OverlayEngine,
        config: QueryConfig,
    ) -> Self {
        Self {
            resolver: Resolver::new(store.clone()),
            store,
            cache,
            overlay,
            config,
        }
    }

    /// Services with a journey calling at `stop` or any of its platforms.
    ///
    /// Services come back in summary projection with their operator
    /// resolved, in order of first appearance.
    pub async fn services_by_stop(&self, stop: &Stop) -> Vec<Service> {
        let key = CacheKey::new("servicesbystop", &stop.primary_identifier);
        self.cached(key, |_| true, || self.compute_services_by_stop(stop))
            .await
    }

    /// [`services_by_stop`](Self::services_by_stop) as list-safe summaries.
    pub async fn services_by_stop_view(&self, stop: &Stop) -> Vec<ServiceSummaryView> {
        self.services_by_stop(stop)
            .await
            .iter()
            .map(ServiceSummaryView::of)
            .collect()
    }

    /// Stops associated with the stop group `group_identifier`.
    pub async fn stops_in_group(&self, group_identifier: &str) -> Vec<Stop> {
        let key = CacheKey::new("stopsingroup", group_identifier);
        self.cached(key, |_| true, || async {
            self.store
                .stops_in_group(group_identifier)
                .await
                .map(Computed::complete)
        })
        .await
    }

    /// A journey with its service, operator and path stops resolved, plus
    /// whatever live overlay applies at `now`.
    ///
    /// Only the scheduled part is cached; the overlay is looked up on every
    /// call so live state is never served stale. Unknown journeys aren't
    /// cached.
    pub async fn journey_detail(&self, identifier: &str, now: DateTime<Utc>) -> Option<Journey> {
        let key = CacheKey::new("journeydetail", identifier);
        let mut journey = self
            .cached(key, Option::is_some, || self.compute_journey_detail(identifier))
            .await?;

        if let Err(e) = self.overlay.apply(&mut journey, now).await {
            debug!(journey = %identifier, error = %e, "Overlay lookup failed, schedule only");
            journey.realtime_journey = None;
        }
        Some(journey)
    }

    /// [`journey_detail`](Self::journey_detail) in its detailed public view.
    pub async fn journey_detail_view(
        &self,
        identifier: &str,
        now: DateTime<Utc>,
    ) -> Option<JourneyDetailedView> {
        self.journey_detail(identifier, now)
            .await
            .map(|journey| JourneyDetailedView::of(&journey))
    }

    /// Alerts naming any of `identifiers` that are in force at `now`.
    ///
    /// Alerts are live data and bypass the cache.
    pub async fn active_alerts(&self, identifiers: &[String], now: DateTime<Utc>) -> Vec<ServiceAlert> {
        match self.store.alerts_matching(identifiers).await {
            Ok(alerts) => alerts.into_iter().filter(|a| a.is_valid_at(now)).collect(),
            Err(e) => {
                warn!(error = %e, "Alert lookup failed");
                Vec::new()
            }
        }
    }

    async fn compute_services_by_stop(&self, stop: &Stop) -> Result<Computed<Vec<Service>>, StoreError> {
        let stop_ids = stop.all_stop_ids();
        let refs = self.store.service_refs_touching(&stop_ids).await?;

        let mut seen = HashSet::new();
        let mut services = Vec::new();
        let mut complete = true;
        for service_ref in refs {
            if !seen.insert(service_ref.clone()) {
                continue;
            }
            let Some(mut service) = self
                .store
                .find_service(&service_ref, ServiceProjection::Summary)
                .await?
            else {
                continue;
            };
            if let Err(e) = self.resolver.resolve_service_operator(&mut service).await {
                debug!(service = %service_ref, error = %e, "Operator lookup failed, serving unresolved");
                complete = false;
            }
            services.push(service);
        }
        Ok(Computed { value: services, complete })
    }

    async fn compute_journey_detail(&self, identifier: &str) -> Result<Computed<Option<Journey>>, StoreError> {
        let Some(mut journey) = self.store.find_journey(identifier).await? else {
            return Ok(Computed::complete(None));
        };
        // Live state is attached per read, never cached.
        journey.realtime_journey = None;

        let mut complete = true;
        if let Err(e) = self.resolver.resolve_references(&mut journey).await {
            debug!(journey = %identifier, error = %e, "Reference lookup failed, serving unresolved");
            complete = false;
        }
        if let Err(e) = self.resolver.resolve_deep(&mut journey).await {
            debug!(journey = %identifier, error = %e, "Stop lookup failed, serving unresolved");
            complete = false;
        }
        Ok(Computed {
            value: Some(journey),
            complete,
        })
    }

    /// Serve `key` from the cache, or compute, cache and return it.
    ///
    /// Results failing `cacheable`, or computed only partially, are
    /// returned but not stored.
    async fn cached<T, F, Fut>(&self, key: CacheKey, cacheable: fn(&T) -> bool, compute: F) -> T
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Computed<T>, StoreError>>,
    {
        match self.cache.get(&key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => {
                    debug!(key = %key, "Cache hit");
                    return value;
                }
                Err(e) => debug!(key = %key, error = %e, "Undecodable cache entry, recomputing"),
            },
            Ok(None) => debug!(key = %key, "Cache miss"),
            Err(e) => debug!(key = %key, error = %e, "Cache read failed, recomputing"),
        }

        let Computed { value, complete } = match compute().await {
            Ok(computed) => computed,
            Err(e) => {
                warn!(key = %key, error = %e, "Query failed");
                return T::default();
            }
        };

        if !complete {
            debug!(key = %key, "Partially resolved result, not caching");
        } else if cacheable(&value) {
            match serde_json::to_vec(&value) {
                Ok(bytes) => {
                    if let Err(e) = self.cache.set(&key, bytes, self.config.cache_ttl).await {
                        debug!(key = %key, error = %e, "Cache write failed");
                    }
                }
                Err(e) => debug!(key = %key, error = %e, "Result not serializable, not caching"),
            }
        }

        value
    }
}

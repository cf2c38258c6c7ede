//! Folding the realtime queue into the store.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::domain::{CanonicalEntity, EventBody, RealtimeJourney};
use crate::events::{BatchConsumer, BatchError, EventPublisher};
use crate::store::{Store, StoreError};

/// Consumes canonical entities published by realtime datasets.
///
/// Live journeys and service alerts are upserted; other kinds are ignored.
/// A failed upsert rejects the batch so the broker redelivers it.
/// When an events publisher is attached, a new live journey announces
/// `RealtimeJourneyCreated` and a newly cancelled one
/// `RealtimeJourneyCancelled`.
pub struct RealtimeFold {
    store: Arc<dyn Store>,
    events: Option<EventPublisher>,
}

impl RealtimeFold {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventPublisher) -> Self {
        self.events = Some(events);
        self
    }

    /// Event to announce for `incoming`, given what the store held before.
    async fn transition(&self, incoming: &RealtimeJourney) -> Result<Option<EventBody>, StoreError> {
        let previous = self
            .store
            .latest_realtime_journey(&incoming.journey_ref)
            .await?;

        Ok(match previous {
            None => Some(EventBody::RealtimeJourneyCreated(incoming.clone())),
            Some(prev) if incoming.cancelled && !prev.cancelled => {
                Some(EventBody::RealtimeJourneyCancelled(incoming.clone()))
            }
            Some(_) => None,
        })
    }
}

#[async_trait]
impl BatchConsumer for RealtimeFold {
    async fn consume(&self, payloads: &[Vec<u8>]) -> Result<(), BatchError> {
        let mut upserts = Vec::with_capacity(payloads.len());
        let mut announcements = Vec::new();

        for payload in payloads {
            let entity: CanonicalEntity = match serde_json::from_slice(payload) {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "Skipping undecodable realtime payload");
                    continue;
                }
            };

            match entity {
                CanonicalEntity::RealtimeJourney(rt) => {
                    if self.events.is_some() {
                        match self.transition(&rt).await {
                            Ok(Some(body)) => announcements.push(body),
                            Ok(None) => {}
                            Err(e) => debug!(error = %e, "Couldn't compare with stored journey"),
                        }
                    }
                    upserts.push(CanonicalEntity::RealtimeJourney(rt));
                }
                alert @ CanonicalEntity::ServiceAlert(_) => upserts.push(alert),
                other => {
                    debug!(kind = %other.kind(), id = %other.primary_identifier(), "Ignoring realtime entity");
                }
            }
        }

        if upserts.is_empty() {
            return Ok(());
        }

        let written = self
            .store
            .upsert(upserts)
            .await
            .map_err(|e| BatchError::new(format!("failed to store realtime batch: {e}")))?;
        debug!(written, "Folded realtime batch");

        if let Some(events) = &self.events {
            for body in &announcements {
                if let Err(e) = events.publish(body).await {
                    warn!(error = %e, event_type = ?body.event_type(), "Failed to publish event");
                }
            }
            if !announcements.is_empty() {
                info!(count = announcements.len(), "Published realtime events");
            }
        }
        Ok(())
    }
}

//! Attaching live records to scheduled journeys.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::trace;

use crate::domain::{Journey, RealtimeJourney};
use crate::store::{Store, StoreError};

/// Default freshness cutoff for live records.
pub const DEFAULT_CUTOFF_MINUTES: i64 = 10;

/// Should `realtime` be shown on its journey at `now`?
///
/// It must be active and no older than `cutoff`.
pub fn overlay_applies(realtime: &RealtimeJourney, now: DateTime<Utc>, cutoff: Duration) -> bool {
    now - realtime.modification_time <= cutoff && realtime.is_active()
}

/// Looks up and applies the live overlay for scheduled journeys.
#[derive(Clone)]
pub struct OverlayEngine {
    store: Arc<dyn Store>,
    cutoff: Duration,
}

impl OverlayEngine {
    pub fn new(store: Arc<dyn Store>, cutoff: Duration) -> Self {
        Self { store, cutoff }
    }

    pub fn cutoff(&self) -> Duration {
        self.cutoff
    }

    /// The live record to present with `journey`, if any.
    pub async fn active_overlay(
        &self,
        journey: &Journey,
        now: DateTime<Utc>,
    ) -> Result<Option<RealtimeJourney>, StoreError> {
        let latest = self
            .store
            .latest_realtime_journey(&journey.primary_identifier)
            .await?;

        Ok(latest.filter(|rt| {
            let applies = overlay_applies(rt, now, self.cutoff);
            trace!(
                journey = %journey.primary_identifier,
                realtime = %rt.primary_identifier,
                applies,
                "Checked realtime overlay"
            );
            applies
        }))
    }

    /// Set `journey.realtime_journey` to the current overlay, clearing it if none applies.
    pub async fn apply(&self, journey: &mut Journey, now: DateTime<Utc>) -> Result<(), StoreError> {
        journey.realtime_journey = self.active_overlay(journey, now).await?;
        Ok(())
    }
}

//! Live records: tracked vehicles and service alerts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DataSource;

/// Live state of one stop on a tracked journey.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RealtimeStop {
    pub stop_ref: String,
    pub arrival_time: Option<DateTime<Utc>>,
    pub departure_time: Option<DateTime<Utc>>,
    pub platform: Option<String>,
    pub cancelled: bool,
}

/// Position report for a vehicle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VehicleLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// Live tracking record for a scheduled journey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RealtimeJourney {
    pub primary_identifier: String,
    /// Primary identifier of the scheduled journey being tracked.
    pub journey_ref: String,

    #[serde(default)]
    pub creation_time: Option<DateTime<Utc>>,
    pub modification_time: DateTime<Utc>,
    #[serde(default)]
    pub data_source: Option<DataSource>,

    #[serde(default)]
    pub actively_tracked: bool,
    #[serde(default)]
    pub cancelled: bool,

    #[serde(default)]
    pub vehicle_location: Option<VehicleLocation>,
    #[serde(default)]
    pub vehicle_ref: Option<String>,
    /// Seconds behind (positive) or ahead of schedule.
    #[serde(default)]
    pub offset_secs: i64,
    #[serde(default)]
    pub stops: Vec<RealtimeStop>,
}

impl RealtimeJourney {
    /// Creates a tracked, uncancelled record for `journey_ref`.
    pub fn new(
        primary_identifier: impl Into<String>,
        journey_ref: impl Into<String>,
        modification_time: DateTime<Utc>,
    ) -> Self {
        Self {
            primary_identifier: primary_identifier.into(),
            journey_ref: journey_ref.into(),
            creation_time: Some(modification_time),
            modification_time,
            data_source: None,
            actively_tracked: true,
            cancelled: false,
            vehicle_location: None,
            vehicle_ref: None,
            offset_secs: 0,
            stops: Vec::new(),
        }
    }

    /// Whether this record describes a journey currently being tracked.
    ///
    /// A cancelled journey is still active: the cancellation is live
    /// information the rider needs to see.
    pub fn is_active(&self) -> bool {
        self.actively_tracked || self.cancelled
    }
}

/// Kind of disruption described by an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceAlertType {
    Information,
    Warning,
    ServiceSuspended,
    ServicePartSuspended,
    SevereDelays,
    Delays,
    MinorDelays,
    StopClosed,
    JourneyDelayed,
    JourneyCancelled,
}

/// A disruption notice matched against any entity identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceAlert {
    pub primary_identifier: String,

    #[serde(default)]
    pub creation_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modification_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data_source: Option<DataSource>,

    pub alert_type: ServiceAlertType,
    pub title: String,
    pub text: String,

    #[serde(default)]
    pub matched_identifiers: Vec<String>,
    #[serde(default)]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
}

impl ServiceAlert {
    /// Is the alert in force at `now`? Open-ended bounds always match.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_from.is_none_or(|from| from <= now)
            && self.valid_until.is_none_or(|until| now <= until)
    }
}

//! Scheduled journeys and their calling patterns.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use super::{DataSource, Operator, RealtimeJourney, Service, Stop};

/// What a vehicle does at a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Activity {
    Pickup,
    Setdown,
    Pass,
}

/// A link from one path item to a related journey (split, join, next).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct JourneyAssociation {
    #[serde(rename = "Type")]
    pub kind: String,
    pub associated_journey_ref: String,
}

/// One hop of a journey, from an origin stop to the next stop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PathItem {
    pub origin_stop_ref: String,
    pub destination_stop_ref: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_stop: Option<Stop>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_stop: Option<Stop>,

    pub origin_platform: Option<String>,
    pub destination_platform: Option<String>,

    /// Metres between origin and destination.
    pub distance: u32,

    pub origin_arrival_time: Option<DateTime<FixedOffset>>,
    pub origin_departure_time: Option<DateTime<FixedOffset>>,
    pub destination_arrival_time: Option<DateTime<FixedOffset>>,

    pub destination_display: Option<String>,

    pub origin_activity: Vec<Activity>,
    pub destination_activity: Vec<Activity>,

    pub associations: Vec<JourneyAssociation>,
}

impl PathItem {
    /// Creates a hop between two stop references with no times set.
    pub fn between(origin: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            origin_stop_ref: origin.into(),
            destination_stop_ref: destination.into(),
            ..Self::default()
        }
    }
}

/// A single calendar rule deciding when a journey runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AvailabilityRule {
    #[serde(rename = "Type")]
    pub kind: String,
    pub value: String,
    pub description: String,
}

impl AvailabilityRule {
    pub fn new(
        kind: impl Into<String>,
        value: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
            description: description.into(),
        }
    }
}

/// Rule lists deciding on which days a journey operates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Availability {
    #[serde(rename = "Match")]
    pub match_rules: Vec<AvailabilityRule>,
    #[serde(rename = "MatchSecondary")]
    pub match_secondary: Vec<AvailabilityRule>,
    pub exclude: Vec<AvailabilityRule>,
    pub condition: Vec<AvailabilityRule>,
}

impl Availability {
    /// All rules in significance order: match, secondary, exclude, condition.
    pub fn rules(&self) -> impl Iterator<Item = &AvailabilityRule> {
        self.match_rules
            .iter()
            .chain(&self.match_secondary)
            .chain(&self.exclude)
            .chain(&self.condition)
    }
}

/// A scheduled trip of one vehicle along an ordered path.
///
/// Service and operator are held by reference. The `service`, `operator`
/// and `realtime_journey` fields are filled in at query time and never
/// persisted as ownership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Journey {
    pub primary_identifier: String,
    #[serde(default)]
    pub other_identifiers: Vec<String>,

    #[serde(default)]
    pub creation_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modification_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data_source: Option<DataSource>,

    pub service_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<Service>,

    #[serde(default)]
    pub operator_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<Operator>,

    #[serde(default)]
    pub direction: String,
    pub departure_time: DateTime<FixedOffset>,
    #[serde(default)]
    pub departure_timezone: String,

    #[serde(default)]
    pub destination_display: String,

    #[serde(default)]
    pub availability: Availability,

    #[serde(default)]
    pub path: Vec<PathItem>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realtime_journey: Option<RealtimeJourney>,
}

/// Ordered distinct stops of a journey with their scheduled times.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlattenedStops {
    pub stops: Vec<String>,
    pub arrival_times: HashMap<String, DateTime<FixedOffset>>,
    pub departure_times: HashMap<String, DateTime<FixedOffset>>,
}

impl Journey {
    /// Creates a journey with an empty path and no availability rules.
    pub fn new(
        primary_identifier: impl Into<String>,
        service_ref: impl Into<String>,
        departure_time: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            primary_identifier: primary_identifier.into(),
            other_identifiers: Vec::new(),
            creation_time: None,
            modification_time: None,
            data_source: None,
            service_ref: service_ref.into(),
            service: None,
            operator_ref: String::new(),
            operator: None,
            direction: String::new(),
            departure_time,
            departure_timezone: String::new(),
            destination_display: String::new(),
            availability: Availability::default(),
            path: Vec::new(),
            realtime_journey: None,
        }
    }

    /// Does any hop of this journey start or end at one of `stop_ids`?
    pub fn touches_any(&self, stop_ids: &[String]) -> bool {
        self.path.iter().any(|item| {
            stop_ids.contains(&item.origin_stop_ref) || stop_ids.contains(&item.destination_stop_ref)
        })
    }

    /// Collapse the path into the ordered list of distinct stops called at.
    ///
    /// Each hop contributes its origin; the final hop also contributes its
    /// destination. Repeat visits keep the times of the first visit.
    pub fn flatten_stops(&self) -> FlattenedStops {
        let mut flat = FlattenedStops::default();
        let mut seen = HashSet::new();

        for item in &self.path {
            if seen.insert(item.origin_stop_ref.clone()) {
                flat.stops.push(item.origin_stop_ref.clone());
                if let Some(t) = item.origin_arrival_time {
                    flat.arrival_times.insert(item.origin_stop_ref.clone(), t);
                }
                if let Some(t) = item.origin_departure_time {
                    flat.departure_times.insert(item.origin_stop_ref.clone(), t);
                }
            }
        }

        if let Some(last) = self.path.last()
            && seen.insert(last.destination_stop_ref.clone())
        {
            flat.stops.push(last.destination_stop_ref.clone());
            if let Some(t) = last.destination_arrival_time {
                flat.arrival_times.insert(last.destination_stop_ref.clone(), t);
            }
        }

        flat
    }
}

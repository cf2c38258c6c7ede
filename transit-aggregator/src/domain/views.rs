//! Audience-specific projections of canonical entities.
//!
//! Each view is a plain DTO built by an explicit function, exposing only
//! the fields its audience may see. Internal fields (raw references,
//! availability rules) never appear in any view.
//!
//! These are the crate's public read surface: the query service serves
//! services and journey detail through them, and embedders render the rest.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use super::{
    Activity, DataSource, Journey, Operator, PathItem, RealtimeJourney, RealtimeStop, Service,
    Stop, TransportType, VehicleLocation,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OperatorView {
    pub primary_identifier: String,
    pub name: String,
    pub website: Option<String>,
}

impl OperatorView {
    pub fn of(operator: &Operator) -> Self {
        Self {
            primary_identifier: operator.primary_identifier.clone(),
            name: operator.name.clone(),
            website: operator.website.clone(),
        }
    }
}

/// Service fields safe to show in lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceSummaryView {
    pub primary_identifier: String,
    pub service_name: String,
    pub transport_type: TransportType,
    pub brand_colour: Option<String>,
    pub operator: Option<OperatorView>,
}

impl ServiceSummaryView {
    pub fn of(service: &Service) -> Self {
        Self {
            primary_identifier: service.primary_identifier.clone(),
            service_name: service.service_name.clone(),
            transport_type: service.transport_type,
            brand_colour: service.brand_colour.clone(),
            operator: service.operator.as_ref().map(OperatorView::of),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StopView {
    pub primary_identifier: String,
    pub primary_name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub platforms: Vec<String>,
}

impl StopView {
    pub fn of(stop: &Stop) -> Self {
        Self {
            primary_identifier: stop.primary_identifier.clone(),
            primary_name: stop.primary_name.clone(),
            latitude: stop.latitude,
            longitude: stop.longitude,
            platforms: stop
                .platforms
                .iter()
                .map(|p| p.primary_identifier.clone())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RealtimeJourneyView {
    pub modification_time: DateTime<Utc>,
    pub cancelled: bool,
    pub offset_secs: i64,
    pub vehicle_location: Option<VehicleLocation>,
    pub stops: Vec<RealtimeStop>,
}

impl RealtimeJourneyView {
    pub fn of(realtime: &RealtimeJourney) -> Self {
        Self {
            modification_time: realtime.modification_time,
            cancelled: realtime.cancelled,
            offset_secs: realtime.offset_secs,
            vehicle_location: realtime.vehicle_location,
            stops: realtime.stops.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PathItemView {
    pub origin_stop: Option<StopView>,
    pub destination_stop: Option<StopView>,
    pub origin_stop_ref: String,
    pub destination_stop_ref: String,
    pub origin_platform: Option<String>,
    pub destination_platform: Option<String>,
    pub distance: u32,
    pub origin_arrival_time: Option<DateTime<FixedOffset>>,
    pub origin_departure_time: Option<DateTime<FixedOffset>>,
    pub destination_arrival_time: Option<DateTime<FixedOffset>>,
    pub origin_activity: Vec<Activity>,
    pub destination_activity: Vec<Activity>,
}

impl PathItemView {
    pub fn of(item: &PathItem) -> Self {
        Self {
            origin_stop: item.origin_stop.as_ref().map(StopView::of),
            destination_stop: item.destination_stop.as_ref().map(StopView::of),
            origin_stop_ref: item.origin_stop_ref.clone(),
            destination_stop_ref: item.destination_stop_ref.clone(),
            origin_platform: item.origin_platform.clone(),
            destination_platform: item.destination_platform.clone(),
            distance: item.distance,
            origin_arrival_time: item.origin_arrival_time,
            origin_departure_time: item.origin_departure_time,
            destination_arrival_time: item.destination_arrival_time,
            origin_activity: item.origin_activity.clone(),
            destination_activity: item.destination_activity.clone(),
        }
    }
}

/// Journey fields for departure boards and lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JourneyBasicView {
    pub primary_identifier: String,
    pub other_identifiers: Vec<String>,
    pub service: Option<ServiceSummaryView>,
    pub operator: Option<OperatorView>,
    pub departure_time: DateTime<FixedOffset>,
    pub departure_timezone: String,
    pub destination_display: String,
    pub realtime_journey: Option<RealtimeJourneyView>,
}

impl JourneyBasicView {
    pub fn of(journey: &Journey) -> Self {
        Self {
            primary_identifier: journey.primary_identifier.clone(),
            other_identifiers: journey.other_identifiers.clone(),
            service: journey.service.as_ref().map(ServiceSummaryView::of),
            operator: journey.operator.as_ref().map(OperatorView::of),
            departure_time: journey.departure_time,
            departure_timezone: journey.departure_timezone.clone(),
            destination_display: journey.destination_display.clone(),
            realtime_journey: journey.realtime_journey.as_ref().map(RealtimeJourneyView::of),
        }
    }
}

/// Everything in the basic view plus provenance and the full path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JourneyDetailedView {
    #[serde(flatten)]
    pub basic: JourneyBasicView,
    pub creation_time: Option<DateTime<Utc>>,
    pub modification_time: Option<DateTime<Utc>>,
    pub data_source: Option<DataSource>,
    pub direction: String,
    pub path: Vec<PathItemView>,
}

impl JourneyDetailedView {
    pub fn of(journey: &Journey) -> Self {
        Self {
            basic: JourneyBasicView::of(journey),
            creation_time: journey.creation_time,
            modification_time: journey.modification_time,
            data_source: journey.data_source.clone(),
            direction: journey.direction.clone(),
            path: journey.path.iter().map(PathItemView::of).collect(),
        }
    }
}

/// Compact departure summary for language-model prompts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeparturesLlmView {
    pub primary_identifier: String,
    pub service_name: Option<String>,
    pub operator_name: Option<String>,
    pub departure_time: DateTime<FixedOffset>,
    pub destination_display: String,
    /// Stops after the origin, in calling order.
    pub calling_at: Vec<String>,
}

impl DeparturesLlmView {
    pub fn of(journey: &Journey) -> Self {
        Self {
            primary_identifier: journey.primary_identifier.clone(),
            service_name: journey.service.as_ref().map(|s| s.service_name.clone()),
            operator_name: journey.operator.as_ref().map(|o| o.name.clone()),
            departure_time: journey.departure_time,
            destination_display: journey.destination_display.clone(),
            calling_at: journey.flatten_stops().stops.into_iter().skip(1).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AvailabilityRule;

    fn journey() -> Journey {
        let departure = DateTime::parse_from_rfc3339("2024-03-15T08:00:00+00:00").unwrap();
        let mut journey = Journey::new("J1", "SVC1", departure);
        journey.operator_ref = "GB:NOC:FBRI".into();
        journey.destination_display = "Town Centre".into();
        journey.direction = "outbound".into();
        journey.availability.match_rules = vec![AvailabilityRule::new("DayOfWeek", "Monday", "")];
        journey.operator = Some(Operator::new("GB:NOC:FBRI", "First Bristol"));
        journey.service = Some(Service::new("SVC1", "72", "GB:NOC:FBRI"));
        journey.path = vec![PathItem::between("A", "B")];
        journey
    }

    #[test]
    fn basic_view_hides_internal_fields() {
        let json = serde_json::to_value(JourneyBasicView::of(&journey())).unwrap();

        assert_eq!(json["DestinationDisplay"], "Town Centre");
        assert_eq!(json["Service"]["ServiceName"], "72");
        assert!(json.get("ServiceRef").is_none());
        assert!(json.get("OperatorRef").is_none());
        assert!(json.get("Availability").is_none());
        assert!(json.get("Path").is_none());
    }

    #[test]
    fn detailed_view_adds_path_and_direction() {
        let json = serde_json::to_value(JourneyDetailedView::of(&journey())).unwrap();

        assert_eq!(json["PrimaryIdentifier"], "J1");
        assert_eq!(json["Direction"], "outbound");
        assert_eq!(json["Path"][0]["OriginStopRef"], "A");
        assert!(json.get("Availability").is_none());
    }

    #[test]
    fn llm_view_uses_names() {
        let view = DeparturesLlmView::of(&journey());
        assert_eq!(view.service_name.as_deref(), Some("72"));
        assert_eq!(view.operator_name.as_deref(), Some("First Bristol"));
        assert_eq!(view.calling_at, vec!["B"]);
    }
}

//! Domain events carried on the events queue.
//!
//! The wire envelope is `{Type, Timestamp, Body}`. `Body` is kept as raw
//! JSON until a consumer asks for it, and is decoded by `Type`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{RealtimeJourney, ServiceAlert};

/// Discriminator for an event's body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    ServiceAlertCreated,
    RealtimeJourneyCreated,
    RealtimeJourneyCancelled,
    RealtimeJourneyPlatformSet,
}

/// Body of a platform change announcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlatformSet {
    pub journey_ref: String,
    pub stop_ref: String,
    pub platform: String,
}

/// Decoded, typed event body.
#[derive(Debug, Clone, PartialEq)]
pub enum EventBody {
    ServiceAlertCreated(ServiceAlert),
    RealtimeJourneyCreated(RealtimeJourney),
    RealtimeJourneyCancelled(RealtimeJourney),
    RealtimeJourneyPlatformSet(PlatformSet),
}

impl EventBody {
    /// The type tag this body travels under.
    pub fn event_type(&self) -> EventType {
        match self {
            EventBody::ServiceAlertCreated(_) => EventType::ServiceAlertCreated,
            EventBody::RealtimeJourneyCreated(_) => EventType::RealtimeJourneyCreated,
            EventBody::RealtimeJourneyCancelled(_) => EventType::RealtimeJourneyCancelled,
            EventBody::RealtimeJourneyPlatformSet(_) => EventType::RealtimeJourneyPlatformSet,
        }
    }

    fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            EventBody::ServiceAlertCreated(b) => serde_json::to_value(b),
            EventBody::RealtimeJourneyCreated(b) | EventBody::RealtimeJourneyCancelled(b) => {
                serde_json::to_value(b)
            }
            EventBody::RealtimeJourneyPlatformSet(b) => serde_json::to_value(b),
        }
    }
}

/// Event envelope as published to the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Event {
    #[serde(rename = "Type")]
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub body: serde_json::Value,
}

impl Event {
    /// Wrap a typed body in an envelope stamped with `timestamp`.
    pub fn new(body: &EventBody, timestamp: DateTime<Utc>) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event_type: body.event_type(),
            timestamp,
            body: body.to_value()?,
        })
    }

    /// Decode the body according to the envelope's `Type`.
    pub fn decode_body(&self) -> Result<EventBody, serde_json::Error> {
        let body = self.body.clone();
        Ok(match self.event_type {
            EventType::ServiceAlertCreated => {
                EventBody::ServiceAlertCreated(serde_json::from_value(body)?)
            }
            EventType::RealtimeJourneyCreated => {
                EventBody::RealtimeJourneyCreated(serde_json::from_value(body)?)
            }
            EventType::RealtimeJourneyCancelled => {
                EventBody::RealtimeJourneyCancelled(serde_json::from_value(body)?)
            }
            EventType::RealtimeJourneyPlatformSet => {
                EventBody::RealtimeJourneyPlatformSet(serde_json::from_value(body)?)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ServiceAlertType;

    fn alert() -> ServiceAlert {
        ServiceAlert {
            primary_identifier: "GB:SERVICEALERT:TEST".into(),
            creation_time: None,
            modification_time: None,
            data_source: None,
            alert_type: ServiceAlertType::ServiceSuspended,
            title: "Line Suspended".into(),
            text: "Northern Line has been suspended due to a fault on the line".into(),
            matched_identifiers: vec!["GB:SVC:NTN".into()],
            valid_from: None,
            valid_until: None,
        }
    }

    #[test]
    fn envelope_field_names() {
        let event = Event::new(&EventBody::ServiceAlertCreated(alert()), Utc::now()).unwrap();
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["Type"], "ServiceAlertCreated");
        assert!(json.get("Timestamp").is_some());
        assert_eq!(json["Body"]["Title"], "Line Suspended");
    }

    #[test]
    fn body_decoded_by_type() {
        let event = Event::new(&EventBody::ServiceAlertCreated(alert()), Utc::now()).unwrap();
        let bytes = serde_json::to_vec(&event).unwrap();

        let decoded: Event = serde_json::from_slice(&bytes).unwrap();
        match decoded.decode_body().unwrap() {
            EventBody::ServiceAlertCreated(a) => assert_eq!(a.title, "Line Suspended"),
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn body_mismatching_type_fails_to_decode() {
        let mut event = Event::new(&EventBody::ServiceAlertCreated(alert()), Utc::now()).unwrap();
        event.event_type = EventType::RealtimeJourneyPlatformSet;
        assert!(event.decode_body().is_err());
    }
}

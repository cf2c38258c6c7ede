//! Canonical transport domain model.
//!
//! Every feed format is normalized into these types. Records refer to one
//! another by identifier only; the resolver materializes relations at
//! query time.

mod entity;
mod event;
mod fingerprint;
mod journey;
mod operator;
mod realtime;
mod service;
mod stop;
pub mod views;

pub use entity::{CanonicalEntity, DataSource, EntityKind};
pub use event::{Event, EventBody, EventType, PlatformSet};
pub use fingerprint::{Fingerprint, deduplicate};
pub use journey::{
    Activity, Availability, AvailabilityRule, FlattenedStops, Journey, JourneyAssociation,
    PathItem,
};
pub use operator::Operator;
pub use realtime::{
    RealtimeJourney, RealtimeStop, ServiceAlert, ServiceAlertType, VehicleLocation,
};
pub use service::{Service, ServiceProjection, TransportType};
pub use stop::{Association, Platform, Stop, StopGroup};

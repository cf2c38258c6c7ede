//! The canonical entity shape shared by every record kind.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Journey, Operator, RealtimeJourney, Service, ServiceAlert, Stop, StopGroup};

/// The kinds of record a dataset can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Operator,
    OperatorGroup,
    Stop,
    StopGroup,
    Service,
    Journey,
    RealtimeJourney,
    ServiceAlert,
}

impl EntityKind {
    /// Stable lowercase name, used in logs and cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Operator => "operator",
            EntityKind::OperatorGroup => "operator-group",
            EntityKind::Stop => "stop",
            EntityKind::StopGroup => "stop-group",
            EntityKind::Service => "service",
            EntityKind::Journey => "journey",
            EntityKind::RealtimeJourney => "realtime-journey",
            EntityKind::ServiceAlert => "service-alert",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a record came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataSource {
    /// Identifier of the dataset that produced the record.
    pub dataset_id: String,
    /// Provider name, for display.
    pub provider: String,
    /// Opaque version marker of the import run.
    pub timestamp: String,
}

/// Any normalized record produced by a parser.
///
/// Variants reference each other only by identifier; relations are
/// materialized on demand by the resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Kind", content = "Entity")]
pub enum CanonicalEntity {
    Operator(Operator),
    Stop(Stop),
    StopGroup(StopGroup),
    Service(Service),
    Journey(Journey),
    RealtimeJourney(RealtimeJourney),
    ServiceAlert(ServiceAlert),
}

impl CanonicalEntity {
    /// The kind of this record.
    pub fn kind(&self) -> EntityKind {
        match self {
            CanonicalEntity::Operator(_) => EntityKind::Operator,
            CanonicalEntity::Stop(_) => EntityKind::Stop,
            CanonicalEntity::StopGroup(_) => EntityKind::StopGroup,
            CanonicalEntity::Service(_) => EntityKind::Service,
            CanonicalEntity::Journey(_) => EntityKind::Journey,
            CanonicalEntity::RealtimeJourney(_) => EntityKind::RealtimeJourney,
            CanonicalEntity::ServiceAlert(_) => EntityKind::ServiceAlert,
        }
    }

    /// Globally unique identifier within the record's kind.
    pub fn primary_identifier(&self) -> &str {
        match self {
            CanonicalEntity::Operator(e) => &e.primary_identifier,
            CanonicalEntity::Stop(e) => &e.primary_identifier,
            CanonicalEntity::StopGroup(e) => &e.identifier,
            CanonicalEntity::Service(e) => &e.primary_identifier,
            CanonicalEntity::Journey(e) => &e.primary_identifier,
            CanonicalEntity::RealtimeJourney(e) => &e.primary_identifier,
            CanonicalEntity::ServiceAlert(e) => &e.primary_identifier,
        }
    }

    /// Last modification time, if the source provided one.
    pub fn modification_time(&self) -> Option<DateTime<Utc>> {
        match self {
            CanonicalEntity::Operator(e) => e.modification_time,
            CanonicalEntity::Stop(e) => e.modification_time,
            CanonicalEntity::StopGroup(e) => e.modification_time,
            CanonicalEntity::Service(e) => e.modification_time,
            CanonicalEntity::Journey(e) => e.modification_time,
            CanonicalEntity::RealtimeJourney(e) => Some(e.modification_time),
            CanonicalEntity::ServiceAlert(e) => e.modification_time,
        }
    }

    /// Mutable access to the record's provenance.
    pub fn data_source_mut(&mut self) -> &mut Option<DataSource> {
        match self {
            CanonicalEntity::Operator(e) => &mut e.data_source,
            CanonicalEntity::Stop(e) => &mut e.data_source,
            CanonicalEntity::StopGroup(e) => &mut e.data_source,
            CanonicalEntity::Service(e) => &mut e.data_source,
            CanonicalEntity::Journey(e) => &mut e.data_source,
            CanonicalEntity::RealtimeJourney(e) => &mut e.data_source,
            CanonicalEntity::ServiceAlert(e) => &mut e.data_source,
        }
    }
}

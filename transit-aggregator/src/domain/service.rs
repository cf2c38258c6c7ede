//! Services: a named line or route run by one operator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DataSource, Operator};

/// Mode of transport for a service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportType {
    Bus,
    Coach,
    Tram,
    Metro,
    Rail,
    Ferry,
    #[default]
    Unknown,
}

/// A published line (e.g. "72", "Great Western Main Line").
///
/// The operator is held by reference; `operator` is only populated when
/// the resolver has looked it up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Service {
    pub primary_identifier: String,
    pub other_identifiers: Vec<String>,

    pub creation_time: Option<DateTime<Utc>>,
    pub modification_time: Option<DateTime<Utc>>,
    pub data_source: Option<DataSource>,

    pub service_name: String,
    pub transport_type: TransportType,
    pub brand_colour: Option<String>,

    pub operator_ref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<Operator>,

    /// Identifiers of route variants; not needed by most readers.
    pub routes: Vec<String>,
}

impl Service {
    /// Creates a service with identifier, name, and operator reference set.
    pub fn new(
        primary_identifier: impl Into<String>,
        service_name: impl Into<String>,
        operator_ref: impl Into<String>,
    ) -> Self {
        Self {
            primary_identifier: primary_identifier.into(),
            service_name: service_name.into(),
            operator_ref: operator_ref.into(),
            ..Self::default()
        }
    }
}

/// Field projection for service reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ServiceProjection {
    /// Every stored field.
    #[default]
    Full,
    /// Drops bookkeeping fields, alternate identifiers and routes.
    Summary,
}

impl ServiceProjection {
    /// Apply this projection to a service read from storage.
    pub fn apply(self, mut service: Service) -> Service {
        if self == ServiceProjection::Summary {
            service.creation_time = None;
            service.modification_time = None;
            service.other_identifiers.clear();
            service.routes.clear();
        }
        service
    }
}

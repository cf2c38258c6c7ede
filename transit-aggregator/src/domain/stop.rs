//! Stops, their platforms, and stop groups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DataSource;

/// A physical boarding point within a stop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Platform {
    pub primary_identifier: String,
    pub name: String,
}

/// A link from a stop to another record, such as the group it belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Association {
    #[serde(rename = "Type")]
    pub kind: String,
    pub associated_identifier: String,
}

/// A named place where journeys call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Stop {
    pub primary_identifier: String,
    pub other_identifiers: Vec<String>,

    pub creation_time: Option<DateTime<Utc>>,
    pub modification_time: Option<DateTime<Utc>>,
    pub data_source: Option<DataSource>,

    pub primary_name: String,
    pub timezone: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    pub platforms: Vec<Platform>,
    pub associations: Vec<Association>,
    pub active: bool,
}

impl Stop {
    /// Creates an active stop with only identifier and name set.
    pub fn new(primary_identifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            primary_identifier: primary_identifier.into(),
            primary_name: name.into(),
            active: true,
            ..Self::default()
        }
    }

    /// The stop's own identifier followed by every platform identifier.
    pub fn all_stop_ids(&self) -> Vec<String> {
        std::iter::once(self.primary_identifier.clone())
            .chain(self.platforms.iter().map(|p| p.primary_identifier.clone()))
            .collect()
    }

    /// Does `reference` name this stop or one of its platforms?
    pub fn is_identified_by(&self, reference: &str) -> bool {
        self.primary_identifier == reference
            || self.platforms.iter().any(|p| p.primary_identifier == reference)
    }

    /// Is this stop associated with the given group?
    pub fn belongs_to(&self, group_identifier: &str) -> bool {
        self.associations
            .iter()
            .any(|a| a.associated_identifier == group_identifier)
    }
}

/// A named collection of stops (an interchange, a station complex).
///
/// Membership is recorded on the stops, not here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct StopGroup {
    pub identifier: String,

    pub creation_time: Option<DateTime<Utc>>,
    pub modification_time: Option<DateTime<Utc>>,
    pub data_source: Option<DataSource>,

    pub name: String,
    #[serde(rename = "Type")]
    pub kind: String,
    pub status: String,
}

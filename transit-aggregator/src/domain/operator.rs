//! Transport operators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DataSource;

/// A company or agency running services.
///
/// Feeds reference operators by many identifier schemes (NOC, ATOC,
/// GTFS agency ids), so alternates are kept in `other_identifiers`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Operator {
    pub primary_identifier: String,
    pub other_identifiers: Vec<String>,

    pub creation_time: Option<DateTime<Utc>>,
    pub modification_time: Option<DateTime<Utc>>,
    pub data_source: Option<DataSource>,

    pub name: String,
    pub short_name: Option<String>,
    pub website: Option<String>,
}

impl Operator {
    /// Creates an operator with only identifier and name set.
    pub fn new(primary_identifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            primary_identifier: primary_identifier.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Does `reference` name this operator, by primary or alternate identifier?
    pub fn is_identified_by(&self, reference: &str) -> bool {
        self.primary_identifier == reference || self.other_identifiers.iter().any(|id| id == reference)
    }
}

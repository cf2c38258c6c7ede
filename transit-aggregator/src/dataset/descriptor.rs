//! Static description of a source feed.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::hooks::HookSpec;
use crate::domain::EntityKind;

/// Feed formats the system knows how to route to a parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataSetFormat {
    TravelineNoc,
    Naptan,
    NationalRailToc,
    NetworkRailCorpus,
    SiriVm,
    GtfsSchedule,
    GtfsRealtime,
    Cif,
    /// Canonical entities encoded as JSON, one per line.
    CtdfJson,
}

/// Container wrapping the payload(s) of a download.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BundleFormat {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "gz")]
    Gzip,
    #[serde(rename = "zip")]
    Zip,
}

/// Where parsed entities of a dataset go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportDestination {
    #[default]
    Store,
    RealtimeQueue,
}

/// Organisation publishing a feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub name: String,
    pub website: String,
}

/// One registered source feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    pub identifier: String,
    pub format: DataSetFormat,
    #[serde(default)]
    pub provider: Provider,
    /// `http(s)://` URL or a local file path.
    pub source: String,
    #[serde(default)]
    pub unpack_bundle: BundleFormat,
    #[serde(default)]
    pub supported_objects: BTreeSet<EntityKind>,
    #[serde(default)]
    pub import_destination: ImportDestination,
    /// Dataset that must import successfully before this one starts.
    #[serde(default)]
    pub linked_dataset: Option<String>,
    #[serde(default)]
    pub download_hook: Option<HookSpec>,
}

impl DatasetDescriptor {
    /// Creates a store-bound, unbundled descriptor with no hook.
    pub fn new(
        identifier: impl Into<String>,
        format: DataSetFormat,
        source: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            format,
            provider: Provider::default(),
            source: source.into(),
            unpack_bundle: BundleFormat::None,
            supported_objects: BTreeSet::new(),
            import_destination: ImportDestination::Store,
            linked_dataset: None,
            download_hook: None,
        }
    }

    /// Set the prerequisite dataset.
    pub fn linked_to(mut self, identifier: impl Into<String>) -> Self {
        self.linked_dataset = Some(identifier.into());
        self
    }

    /// Declare the entity kinds this dataset may produce.
    pub fn supporting(mut self, kinds: impl IntoIterator<Item = EntityKind>) -> Self {
        self.supported_objects.extend(kinds);
        self
    }

    pub fn with_bundle(mut self, bundle: BundleFormat) -> Self {
        self.unpack_bundle = bundle;
        self
    }

    pub fn with_destination(mut self, destination: ImportDestination) -> Self {
        self.import_destination = destination;
        self
    }

    pub fn with_hook(mut self, hook: HookSpec) -> Self {
        self.download_hook = Some(hook);
        self
    }

    /// Is the source a remote URL (as opposed to a local path)?
    pub fn is_remote(&self) -> bool {
        self.source.starts_with("http://") || self.source.starts_with("https://")
    }

    pub fn supports(&self, kind: EntityKind) -> bool {
        self.supported_objects.contains(&kind)
    }
}

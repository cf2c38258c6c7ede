//! Import orchestration.
//!
//! Datasets run one at a time in dependency order. Each goes through
//! fetch, unpack, parse and route; a failure stops that dataset only,
//! plus anything linked to it.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tracing::{debug, info, warn};

use super::bundle::unpack;
use super::error::ImportError;
use super::fetch::Fetcher;
use super::parser::ParserRegistry;
use crate::dataset::{DatasetDescriptor, DatasetRegistry, ImportDestination};
use crate::domain::{CanonicalEntity, DataSource, EntityKind, Journey, deduplicate};
use crate::events::EventPublisher;
use crate::store::Store;

/// Import behaviour knobs.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Fold availability rules into journey fingerprints when deduplicating.
    ///
    /// With this off, journeys with the same calling pattern but running on
    /// different days collapse into one.
    pub include_availability_condition: bool,
}

impl ImportConfig {
    pub fn with_availability_condition(mut self, include: bool) -> Self {
        self.include_availability_condition = include;
        self
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            include_availability_condition: true,
        }
    }
}

/// What happened to one dataset during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetOutcome {
    Imported {
        /// Entities written to the store
        stored: usize,
        /// Entities published to the realtime queue
        published: usize,
        /// Payloads the parser rejected
        skipped_payloads: usize,
    },
    Failed {
        error: String,
    },
    /// Not attempted because its prerequisite didn't import
    Skipped {
        reason: String,
    },
}

/// Outcome of a single dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetReport {
    pub dataset: String,
    pub outcome: DatasetOutcome,
}

/// Per-dataset outcomes of one import run, in the order they ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub datasets: Vec<DatasetReport>,
}

impl ImportReport {
    pub fn outcome(&self, dataset: &str) -> Option<&DatasetOutcome> {
        self.datasets
            .iter()
            .find(|r| r.dataset == dataset)
            .map(|r| &r.outcome)
    }

    pub fn imported_count(&self) -> usize {
        self.count(|o| matches!(o, DatasetOutcome::Imported { .. }))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|o| matches!(o, DatasetOutcome::Failed { .. }))
    }

    pub fn skipped_count(&self) -> usize {
        self.count(|o| matches!(o, DatasetOutcome::Skipped { .. }))
    }

    fn count(&self, pred: impl Fn(&DatasetOutcome) -> bool) -> usize {
        self.datasets.iter().filter(|r| pred(&r.outcome)).count()
    }
}

#[derive(Debug, Default)]
struct Routed {
    stored: usize,
    published: usize,
    skipped_payloads: usize,
}

/// Runs every registered dataset through fetch, unpack, parse and route.
pub struct ImportManager {
    fetcher: Arc<dyn Fetcher>,
    parsers: ParserRegistry,
    store: Arc<dyn Store>,
    realtime: EventPublisher,
    config: ImportConfig,
}

impl ImportManager {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        parsers: ParserRegistry,
        store: Arc<dyn Store>,
        realtime: EventPublisher,
        config: ImportConfig,
    ) -> Self {
        Self {
            fetcher,
            parsers,
            store,
            realtime,
            config,
        }
    }

    /// Import every dataset once, prerequisites first.
    ///
    /// A dataset whose linked dataset failed or was skipped is skipped too.
    pub async fn run(&self, registry: &DatasetRegistry) -> ImportReport {
        let run_stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut succeeded: HashSet<&str> = HashSet::new();
        let mut report = ImportReport::default();

        for dataset in registry.import_order() {
            let outcome = match dataset.linked_dataset.as_deref() {
                Some(linked) if !succeeded.contains(linked) => {
                    warn!(
                        dataset = %dataset.identifier,
                        linked = %linked,
                        "Skipping dataset: linked dataset did not import"
                    );
                    DatasetOutcome::Skipped {
                        reason: format!("linked dataset {linked} did not import"),
                    }
                }
                _ => match self.import_dataset(dataset, &run_stamp).await {
                    Ok(routed) => {
                        info!(
                            dataset = %dataset.identifier,
                            stored = routed.stored,
                            published = routed.published,
                            skipped_payloads = routed.skipped_payloads,
                            "Imported dataset"
                        );
                        succeeded.insert(dataset.identifier.as_str());
                        DatasetOutcome::Imported {
                            stored: routed.stored,
                            published: routed.published,
                            skipped_payloads: routed.skipped_payloads,
                        }
                    }
                    Err(e) => {
                        warn!(dataset = %dataset.identifier, error = %e, "Dataset import failed");
                        DatasetOutcome::Failed {
                            error: e.to_string(),
                        }
                    }
                },
            };

            report.datasets.push(DatasetReport {
                dataset: dataset.identifier.clone(),
                outcome,
            });
        }

        report
    }

    async fn import_dataset(
        &self,
        dataset: &DatasetDescriptor,
        run_stamp: &str,
    ) -> Result<Routed, ImportError> {
        let parser = self
            .parsers
            .get(dataset.format)
            .ok_or(ImportError::NoParser(dataset.format))?;

        info!(dataset = %dataset.identifier, source = %dataset.source, "Importing dataset");

        let bytes = self.fetcher.fetch(dataset).await?;
        let payloads = unpack(dataset.unpack_bundle, &dataset.source, bytes)?;

        let mut routed = Routed::default();
        let mut entities = Vec::new();
        for payload in &payloads {
            match parser.parse(payload, dataset) {
                Ok(parsed) => entities.extend(parsed),
                Err(e) => {
                    warn!(
                        dataset = %dataset.identifier,
                        payload = %payload.name,
                        error = %e,
                        "Skipping payload"
                    );
                    routed.skipped_payloads += 1;
                }
            }
        }

        let entities = self.admit(dataset, entities, run_stamp);

        match dataset.import_destination {
            ImportDestination::Store => {
                routed.stored = self.store_entities(entities).await?;
            }
            ImportDestination::RealtimeQueue => {
                for entity in &entities {
                    self.realtime.publish_json(entity).await?;
                }
                routed.published = entities.len();
            }
        }

        Ok(routed)
    }

    /// Drop kinds the dataset doesn't declare and stamp provenance.
    ///
    /// A dataset declaring no kinds accepts every kind.
    fn admit(
        &self,
        dataset: &DatasetDescriptor,
        entities: Vec<CanonicalEntity>,
        run_stamp: &str,
    ) -> Vec<CanonicalEntity> {
        let total = entities.len();
        let mut admitted: Vec<CanonicalEntity> = entities
            .into_iter()
            .filter(|e| dataset.supported_objects.is_empty() || dataset.supports(e.kind()))
            .collect();

        if admitted.len() < total {
            debug!(
                dataset = %dataset.identifier,
                dropped = total - admitted.len(),
                "Dropped entities of undeclared kinds"
            );
        }

        for entity in &mut admitted {
            entity.data_source_mut().get_or_insert_with(|| DataSource {
                dataset_id: dataset.identifier.clone(),
                provider: dataset.provider.name.clone(),
                timestamp: run_stamp.to_string(),
            });
        }

        admitted
    }

    /// Deduplicate journeys, then upsert one batch per kind.
    async fn store_entities(&self, entities: Vec<CanonicalEntity>) -> Result<usize, ImportError> {
        let mut journeys: Vec<Journey> = Vec::new();
        let mut by_kind: BTreeMap<EntityKind, Vec<CanonicalEntity>> = BTreeMap::new();

        for entity in entities {
            match entity {
                CanonicalEntity::Journey(j) => journeys.push(j),
                other => by_kind.entry(other.kind()).or_default().push(other),
            }
        }

        if !journeys.is_empty() {
            let before = journeys.len();
            let unique = deduplicate(journeys, self.config.include_availability_condition);
            debug!(
                before,
                after = unique.len(),
                "Deduplicated journeys"
            );
            by_kind.insert(
                EntityKind::Journey,
                unique.into_iter().map(CanonicalEntity::Journey).collect(),
            );
        }

        let mut stored = 0;
        for (kind, batch) in by_kind {
            let written = self.store.upsert(batch).await?;
            debug!(kind = %kind, written, "Stored entities");
            stored += written;
        }
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::{Cursor, Write};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::DateTime;
    use zip::write::SimpleFileOptions;

    use super::*;
    use crate::dataset::{BundleFormat, DataSetFormat, RegistryError};
    use crate::domain::{AvailabilityRule, Operator, PathItem, Stop};
    use crate::events::{MemoryQueue, Queue};
    use crate::import::FetchError;
    use crate::store::MemoryStore;

    /// Serves canned bytes per source and records every fetch.
    #[derive(Default)]
    struct RecordingFetcher {
        sources: HashMap<String, Vec<u8>>,
        calls: Mutex<Vec<String>>,
    }

    impl RecordingFetcher {
        fn serving(mut self, source: &str, bytes: Vec<u8>) -> Self {
            self.sources.insert(source.to_string(), bytes);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetcher for RecordingFetcher {
        async fn fetch(&self, dataset: &DatasetDescriptor) -> Result<Vec<u8>, FetchError> {
            self.calls.lock().unwrap().push(dataset.identifier.clone());
            self.sources
                .get(&dataset.source)
                .cloned()
                .ok_or(FetchError::Status { status: 404 })
        }
    }

    struct Harness {
        fetcher: Arc<RecordingFetcher>,
        store: Arc<MemoryStore>,
        queue: Arc<MemoryQueue>,
        manager: ImportManager,
    }

    fn harness(fetcher: RecordingFetcher, config: ImportConfig) -> Harness {
        let fetcher = Arc::new(fetcher);
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueue::new("realtime-queue"));
        let manager = ImportManager::new(
            fetcher.clone(),
            ParserRegistry::new(),
            store.clone(),
            EventPublisher::new(queue.clone()),
            config,
        );
        Harness {
            fetcher,
            store,
            queue,
            manager,
        }
    }

    fn lines(entities: &[CanonicalEntity]) -> Vec<u8> {
        entities
            .iter()
            .map(|e| serde_json::to_string(e).unwrap())
            .collect::<Vec<_>>()
            .join("\n")
            .into_bytes()
    }

    fn ctdf(id: &str) -> DatasetDescriptor {
        DatasetDescriptor::new(id, DataSetFormat::CtdfJson, format!("mem://{id}"))
    }

    fn journey(id: &str) -> Journey {
        let departure = DateTime::parse_from_rfc3339("2024-03-15T08:00:00+00:00").unwrap();
        let mut j = Journey::new(id, "SVC1", departure);
        j.destination_display = "Town Centre".into();
        j.direction = "outbound".into();
        j.path = vec![PathItem::between("A", "B"), PathItem::between("B", "C")];
        j
    }

    fn operator_feed() -> Vec<u8> {
        lines(&[CanonicalEntity::Operator(Operator::new("OP1", "Buses"))])
    }

    #[tokio::test]
    async fn prerequisites_import_first() {
        let fetcher = RecordingFetcher::default()
            .serving("mem://schedule", operator_feed())
            .serving("mem://realtime", operator_feed());
        let h = harness(fetcher, ImportConfig::default());

        // Dependent declared before its prerequisite.
        let registry = DatasetRegistry::new(vec![
            ctdf("realtime").linked_to("schedule"),
            ctdf("schedule"),
        ])
        .unwrap();

        let report = h.manager.run(&registry).await;
        assert_eq!(h.fetcher.calls(), vec!["schedule", "realtime"]);
        assert_eq!(report.imported_count(), 2);
    }

    #[tokio::test]
    async fn cycle_is_rejected_before_any_fetch() {
        let h = harness(RecordingFetcher::default(), ImportConfig::default());

        let err = DatasetRegistry::new(vec![ctdf("a").linked_to("b"), ctdf("b").linked_to("a")])
            .unwrap_err();
        assert!(matches!(err, RegistryError::DependencyCycle { .. }));
        assert!(h.fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn failure_is_isolated_and_dependents_skipped() {
        let fetcher = RecordingFetcher::default().serving("mem://independent", operator_feed());
        let h = harness(fetcher, ImportConfig::default());

        let registry = DatasetRegistry::new(vec![
            ctdf("broken"),
            ctdf("dependent").linked_to("broken"),
            ctdf("independent"),
        ])
        .unwrap();

        let report = h.manager.run(&registry).await;

        assert!(matches!(
            report.outcome("broken"),
            Some(DatasetOutcome::Failed { .. })
        ));
        assert!(matches!(
            report.outcome("dependent"),
            Some(DatasetOutcome::Skipped { .. })
        ));
        assert!(matches!(
            report.outcome("independent"),
            Some(DatasetOutcome::Imported { stored: 1, .. })
        ));
        assert_eq!(h.fetcher.calls(), vec!["broken", "independent"]);
        assert!(h.store.find_operator("OP1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unknown_format_fails_without_fetching() {
        let h = harness(RecordingFetcher::default(), ImportConfig::default());
        let registry = DatasetRegistry::new(vec![DatasetDescriptor::new(
            "naptan",
            DataSetFormat::Naptan,
            "https://naptan.example/stops.xml",
        )])
        .unwrap();

        let report = h.manager.run(&registry).await;
        assert_eq!(report.failed_count(), 1);
        assert!(h.fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn journeys_are_deduplicated_on_import() {
        let j1 = journey("J1");
        let mut j2 = journey("J2");
        j2.other_identifiers = vec!["ALT".into()];

        let mut j3 = journey("J3");
        j3.availability
            .condition
            .push(AvailabilityRule::new("DayOfWeek", "Saturday", ""));

        let feed = lines(&[
            CanonicalEntity::Journey(j1),
            CanonicalEntity::Journey(j2),
            CanonicalEntity::Journey(j3),
        ]);

        let h = harness(
            RecordingFetcher::default().serving("mem://journeys", feed),
            ImportConfig::default(),
        );
        let registry = DatasetRegistry::new(vec![ctdf("journeys")]).unwrap();
        h.manager.run(&registry).await;

        // J2 collapses into J1; J3 runs on different days so it stays.
        assert_eq!(h.store.journey_count().await, 2);
        assert!(h.store.find_journey("J1").await.unwrap().is_some());
        assert!(h.store.find_journey("J2").await.unwrap().is_none());
        assert!(h.store.find_journey("J3").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn availability_ignored_when_configured() {
        let mut j3 = journey("J3");
        j3.availability
            .condition
            .push(AvailabilityRule::new("DayOfWeek", "Saturday", ""));
        let feed = lines(&[
            CanonicalEntity::Journey(journey("J1")),
            CanonicalEntity::Journey(j3),
        ]);

        let h = harness(
            RecordingFetcher::default().serving("mem://journeys", feed),
            ImportConfig::default().with_availability_condition(false),
        );
        let registry = DatasetRegistry::new(vec![ctdf("journeys")]).unwrap();
        h.manager.run(&registry).await;

        assert_eq!(h.store.journey_count().await, 1);
    }

    #[tokio::test]
    async fn undeclared_kinds_are_dropped_and_provenance_stamped() {
        let feed = lines(&[
            CanonicalEntity::Operator(Operator::new("OP1", "Buses")),
            CanonicalEntity::Stop(Stop::new("STOP1", "High Street")),
        ]);
        let h = harness(
            RecordingFetcher::default().serving("mem://stops", feed),
            ImportConfig::default(),
        );
        let registry =
            DatasetRegistry::new(vec![ctdf("stops").supporting([EntityKind::Stop])]).unwrap();

        let report = h.manager.run(&registry).await;
        assert!(matches!(
            report.outcome("stops"),
            Some(DatasetOutcome::Imported { stored: 1, .. })
        ));
        assert!(h.store.find_operator("OP1").await.unwrap().is_none());

        let stop = h.store.find_stop("STOP1").await.unwrap().unwrap();
        let source = stop.data_source.unwrap();
        assert_eq!(source.dataset_id, "stops");
    }

    #[tokio::test]
    async fn realtime_destination_publishes_each_entity() {
        let feed = lines(&[
            CanonicalEntity::Operator(Operator::new("OP1", "Buses")),
            CanonicalEntity::Operator(Operator::new("OP2", "Trams")),
        ]);
        let h = harness(
            RecordingFetcher::default().serving("mem://live", feed),
            ImportConfig::default(),
        );
        let registry = DatasetRegistry::new(vec![
            ctdf("live").with_destination(ImportDestination::RealtimeQueue),
        ])
        .unwrap();

        let report = h.manager.run(&registry).await;
        assert!(matches!(
            report.outcome("live"),
            Some(DatasetOutcome::Imported {
                stored: 0,
                published: 2,
                ..
            })
        ));
        assert!(h.store.is_empty().await);

        let batch = h.queue.pull(10, Duration::from_millis(10)).await.unwrap();
        assert_eq!(batch.len(), 2);
        let first: CanonicalEntity = serde_json::from_slice(&batch[0].payload).unwrap();
        assert_eq!(first.primary_identifier(), "OP1");
    }

    #[tokio::test]
    async fn bad_payload_in_bundle_is_skipped() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        writer.start_file("good.jsonl", options).unwrap();
        writer.write_all(&operator_feed()).unwrap();
        writer.start_file("bad.jsonl", options).unwrap();
        writer.write_all(b"<xml>not ours</xml>").unwrap();
        let archive = writer.finish().unwrap().into_inner();

        let h = harness(
            RecordingFetcher::default().serving("mem://bundle", archive),
            ImportConfig::default(),
        );
        let registry =
            DatasetRegistry::new(vec![ctdf("bundle").with_bundle(BundleFormat::Zip)]).unwrap();

        let report = h.manager.run(&registry).await;
        assert_eq!(
            report.outcome("bundle"),
            Some(&DatasetOutcome::Imported {
                stored: 1,
                published: 0,
                skipped_payloads: 1
            })
        );
    }
}

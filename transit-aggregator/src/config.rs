//! Process-wide configuration.
//!
//! Built once at startup and handed to each component's constructor.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::events::ConsumerConfig;
use crate::import::{FetchConfig, ImportConfig};
use crate::query::{CacheConfig, QueryConfig};
use crate::realtime::DEFAULT_CUTOFF_MINUTES;

/// Queue carrying domain events.
pub const EVENTS_QUEUE: &str = "events-queue";

/// Queue carrying canonical entities from realtime datasets.
pub const REALTIME_QUEUE: &str = "realtime-queue";

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: String, value: String },
}

/// All configuration for the binary.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path of the dataset registry JSON file.
    pub registry_path: PathBuf,
    /// Maximum age of a live record still shown on its journey (minutes).
    pub realtime_cutoff_mins: i64,
    pub import: ImportConfig,
    pub fetch: FetchConfig,
    pub cache: CacheConfig,
    pub query: QueryConfig,
    pub events_consumer: ConsumerConfig,
    pub realtime_consumer: ConsumerConfig,
}

impl AppConfig {
    /// Read overrides from `TRANSIT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup; unset variables keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = lookup("TRANSIT_REGISTRY_PATH") {
            config.registry_path = PathBuf::from(path);
        }
        if let Some(mins) = parse(&lookup, "TRANSIT_REALTIME_CUTOFF_MINS")? {
            config.realtime_cutoff_mins = mins;
        }
        if let Some(include) = parse(&lookup, "TRANSIT_IMPORT_INCLUDE_AVAILABILITY")? {
            config.import.include_availability_condition = include;
        }
        if let Some(secs) = parse(&lookup, "TRANSIT_FETCH_TIMEOUT_SECS")? {
            config.fetch.timeout_secs = secs;
        }
        if let Some(hours) = parse::<u64>(&lookup, "TRANSIT_CACHE_TTL_HOURS")? {
            config.query.cache_ttl = Duration::from_secs(hours * 60 * 60);
        }
        if let Some(capacity) = parse(&lookup, "TRANSIT_CACHE_CAPACITY")? {
            config.cache.max_capacity = capacity;
        }

        for consumer in [&mut config.events_consumer, &mut config.realtime_consumer] {
            if let Some(workers) = parse(&lookup, "TRANSIT_CONSUMER_WORKERS")? {
                consumer.workers = workers;
            }
            if let Some(size) = parse(&lookup, "TRANSIT_CONSUMER_BATCH_SIZE")? {
                consumer.batch_size = size;
            }
            if let Some(ms) = parse(&lookup, "TRANSIT_CONSUMER_POLL_MS")? {
                consumer.poll_timeout = Duration::from_millis(ms);
            }
        }

        Ok(config)
    }

    /// The realtime freshness cutoff.
    pub fn realtime_cutoff(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.realtime_cutoff_mins)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            registry_path: PathBuf::from("datasets.json"),
            realtime_cutoff_mins: DEFAULT_CUTOFF_MINUTES,
            import: ImportConfig::default(),
            fetch: FetchConfig::default(),
            cache: CacheConfig::default(),
            query: QueryConfig::default(),
            events_consumer: ConsumerConfig::new(EVENTS_QUEUE),
            realtime_consumer: ConsumerConfig::new(REALTIME_QUEUE),
        }
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    let Some(value) = lookup(key) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value,
        })
}

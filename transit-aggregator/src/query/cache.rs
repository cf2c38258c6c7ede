//! Result cache contract and its moka-backed implementation.
//!
//! Cached values are opaque serialized blobs with a per-entry TTL. The
//! cache is never authoritative: a miss, an expired entry or an
//! undecodable value only costs a recompute.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache as MokaCache;

/// Namespace prefix shared by every cached query result.
const NAMESPACE: &str = "cachedresults";

/// Deterministic key: `cachedresults/<query kind>/<argument>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(query_kind: &str, argument: &str) -> Self {
        Self(format!("{NAMESPACE}/{query_kind}/{argument}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors from a cache backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    #[error("cache backend error: {message}")]
    Backend { message: String },
}

/// Key/value store for serialized query results.
#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set(&self, key: &CacheKey, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;
}

/// Configuration for the in-process cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached entries.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
        }
    }
}

#[derive(Debug)]
struct Blob {
    bytes: Vec<u8>,
    ttl: Duration,
}

/// Expires each entry after the TTL it was stored with.
struct PerEntryTtl;

impl Expiry<String, Arc<Blob>> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Arc<Blob>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Arc<Blob>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process result cache backed by moka.
pub struct MokaResultCache {
    entries: MokaCache<String, Arc<Blob>>,
}

impl MokaResultCache {
    pub fn new(config: &CacheConfig) -> Self {
        let entries = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(PerEntryTtl)
            .build();
        Self { entries }
    }

    /// Approximate number of live entries.
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }
}

#[async_trait]
impl ResultCache for MokaResultCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.entries.get(key.as_str()).await.map(|b| b.bytes.clone()))
    }

    async fn set(&self, key: &CacheKey, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.entries
            .insert(key.as_str().to_string(), Arc::new(Blob { bytes: value, ttl }))
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_format() {
        let key = CacheKey::new("servicesbystop", "GB:ATCO:0100BRP90312");
        assert_eq!(key.as_str(), "cachedresults/servicesbystop/GB:ATCO:0100BRP90312");
        assert_eq!(key.to_string(), key.as_str());
    }

    #[tokio::test]
    async fn stores_and_returns_values() {
        let cache = MokaResultCache::new(&CacheConfig::default());
        let key = CacheKey::new("kind", "arg");

        assert!(cache.get(&key).await.unwrap().is_none());
        cache
            .set(&key, b"value".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), Some(b"value".to_vec()));
    }

    #[tokio::test]
    async fn entries_expire_after_their_own_ttl() {
        let cache = MokaResultCache::new(&CacheConfig::default());
        let short = CacheKey::new("kind", "short");
        let long = CacheKey::new("kind", "long");

        cache
            .set(&short, b"s".to_vec(), Duration::from_millis(20))
            .await
            .unwrap();
        cache
            .set(&long, b"l".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(cache.get(&short).await.unwrap().is_none());
        assert_eq!(cache.get(&long).await.unwrap(), Some(b"l".to_vec()));
    }
}

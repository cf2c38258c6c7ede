//! Cached read-side queries.

mod cache;
mod service;

pub use cache::{CacheConfig, CacheError, CacheKey, MokaResultCache, ResultCache};
pub use service::{QueryConfig, QueryService};

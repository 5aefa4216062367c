//! # Tiered Search-Result Cache
//!
//! Three cache tiers behind one coordinator, used to avoid repeating expensive
//! catalog searches.
//!
//! ## Features
//!
//! - **Memory tier**: bounded in-process map, plus recent searches and suggestions
//! - **Disk tier**: one JSON file per entry, named by the SHA-256 of its key
//! - **Durable tier**: sled database, also holding the frequent-query counters
//! - **Promotion**: a hit in a slower tier is copied into every faster tier
//! - **TTL expiry**: expired entries read as misses and are removed lazily or by sweep
//! - **Namespaces**: `search:`, `suggest:` and `recent:` keys never collide
//!
//! Storage failures never surface from `lookup` or `store`; a broken tier
//! behaves like an empty one.
//!
//! ## Example
//!
//! ```rust,no_run
//! use catalog_search_cache::cache::{SearchResultCache, TieredCacheConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let cache = SearchResultCache::with_system_clock(TieredCacheConfig::from_env()?).await?;
//!
//! if let Some(cached) = cache.lookup("Organic  Milk").await {
//!     println!("{} cached results", cached.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod disk;
pub mod durable;
pub mod entry;
pub mod key;
pub mod level;
pub mod memory;
pub mod tiered;
pub mod types;

pub use config::{ExpiryStamping, LevelConfig, TieredCacheConfig, TieredCacheConfigBuilder};
pub use disk::DiskLevel;
pub use durable::{DurableLevel, FrequentQueryLimits};
pub use entry::CacheEntry;
pub use key::{normalize_query, CacheKey, CacheNamespace};
pub use level::CacheLevel;
pub use memory::MemoryLevel;
pub use tiered::{SearchResultCache, TieredCache};
pub use types::{
    CacheStats, CachedSearchResult, LevelKind, LevelStats, MatchType, ResultItem,
    SearchQualityMetrics,
};

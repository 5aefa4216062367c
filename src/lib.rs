//! # Catalog Search Cache (catalog-search-cache)
//!
//! Multi-level caching for catalog search results, with a companion
//! performance monitor for the searches around it.
//!
//! ## Features
//!
//! - Memory, disk and durable (sled) tiers with promotion on hit
//! - Per-tier TTL expiry and oldest-first capacity eviction
//! - Hit/miss statistics per tier
//! - Recent searches, cached suggestions and frequent-query tracking
//! - Search session monitoring with latency percentiles and slow-search reports
//! - Optional background maintenance tasks
//!
//! The cache and the monitor do not know about each other. The search code
//! wraps its engine calls with both:
//!
//! ```no_run
//! use catalog_search_cache::{
//!     CachedSearchResult, MonitorConfig, PerformanceMonitor, SearchQualityMetrics,
//!     SearchResultCache, TieredCacheConfig,
//! };
//! use std::time::Instant;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = SearchResultCache::with_system_clock(TieredCacheConfig::default()).await?;
//!     let monitor = PerformanceMonitor::with_system_clock(MonitorConfig::default());
//!
//!     let query = "tomato sauce";
//!     let id = monitor.begin_search(query).await;
//!     let started = Instant::now();
//!
//!     let result = match cache.lookup(query).await {
//!         Some(hit) => {
//!             monitor.record_cache_hit(&id).await;
//!             hit
//!         }
//!         None => {
//!             // Run the real search engine here
//!             let fresh = CachedSearchResult::new(Vec::new(), SearchQualityMetrics::default());
//!             cache.store(query, fresh.clone()).await;
//!             fresh
//!         }
//!     };
//!
//!     monitor
//!         .record_search_complete(&id, result.len(), started.elapsed())
//!         .await;
//!     println!("{}", cache.statistics().await);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod clock;
pub mod error;
pub mod maintenance;
pub mod monitor;

// Re-export main types for convenience
pub use cache::{
    normalize_query, CacheEntry, CacheLevel, CacheNamespace, CacheStats, CachedSearchResult,
    DiskLevel, DurableLevel, ExpiryStamping, LevelConfig, LevelKind, LevelStats, MatchType,
    MemoryLevel, ResultItem, SearchQualityMetrics, SearchResultCache, TieredCache,
    TieredCacheConfig,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CacheError, Result};
pub use maintenance::{spawn_cache_maintenance, spawn_trend_logging};
pub use monitor::{
    MonitorConfig, PerformanceMetrics, PerformanceMonitor, PerformanceReport, QueryComplexity,
    SearchSession, TrendSnapshot,
};

//! Tiered cache coordinator: memory -> disk -> durable
//!
//! Lookups walk the tiers fastest first and stop at the first hit, copying the
//! hit into every faster tier already checked. Stores write through to all
//! tiers. Every public operation runs while holding one lock, so a lookup and
//! the promotion it triggers are never interleaved with another lookup or
//! store.

use crate::cache::{
    config::{ExpiryStamping, TieredCacheConfig},
    disk::DiskLevel,
    durable::{DurableLevel, FrequentQueryLimits},
    entry::CacheEntry,
    key::{normalize_query, CacheNamespace},
    level::CacheLevel,
    memory::MemoryLevel,
    types::{CacheStats, CachedSearchResult, LevelKind, LevelStats},
};
use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Tiered cache for catalog search results
pub type SearchResultCache = TieredCache<CachedSearchResult>;

/// Coordinator over the three cache tiers
pub struct TieredCache<T> {
    memory: Arc<MemoryLevel<T>>,
    disk: Arc<DiskLevel<T>>,
    durable: Arc<DurableLevel<T>>,
    config: TieredCacheConfig,
    clock: Arc<dyn Clock>,
    /// Lifetime counters; the lock around them serializes all operations
    stats: Mutex<CacheStats>,
}

impl<T> TieredCache<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Open all three tiers from `config`
    pub async fn open(config: TieredCacheConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        info!("Initializing tiered cache with config: {:?}", config);

        let memory = MemoryLevel::new(config.memory, config.recent_capacity, clock.clone());
        let disk = DiskLevel::open(&config.cache_dir, config.disk, clock.clone()).await?;
        let durable = DurableLevel::open(
            &config.durable_path,
            config.durable,
            FrequentQueryLimits {
                limit: config.frequent_query_limit,
                retain: config.frequent_query_retain,
            },
            clock.clone(),
        )?;

        Ok(Self::from_levels(
            Arc::new(memory),
            Arc::new(disk),
            Arc::new(durable),
            config,
            clock,
        ))
    }

    /// Open all three tiers using the system clock
    pub async fn with_system_clock(config: TieredCacheConfig) -> Result<Self> {
        Self::open(config, Arc::new(SystemClock)).await
    }

    /// Assemble a coordinator from already opened tiers
    pub fn from_levels(
        memory: Arc<MemoryLevel<T>>,
        disk: Arc<DiskLevel<T>>,
        durable: Arc<DurableLevel<T>>,
        config: TieredCacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            memory,
            disk,
            durable,
            config,
            clock,
            stats: Mutex::new(CacheStats::default()),
        }
    }

    pub fn memory(&self) -> &Arc<MemoryLevel<T>> {
        &self.memory
    }

    pub fn disk(&self) -> &Arc<DiskLevel<T>> {
        &self.disk
    }

    pub fn durable(&self) -> &Arc<DurableLevel<T>> {
        &self.durable
    }

    pub fn config(&self) -> &TieredCacheConfig {
        &self.config
    }

    /// Tiers in lookup order, fastest first
    fn levels(&self) -> [&dyn CacheLevel<T>; 3] {
        [&*self.memory, &*self.disk, &*self.durable]
    }

    /// Look up cached results for a query
    ///
    /// The query is normalized before use, so callers may pass either raw or
    /// already normalized text.
    pub async fn lookup(&self, query: &str) -> Option<T> {
        let key = CacheNamespace::Search.key(query);
        let mut stats = self.stats.lock().await;
        let levels = self.levels();

        for (depth, level) in levels.iter().enumerate() {
            let Some(entry) = level.get(&key).await else {
                continue;
            };

            stats.record_hit(level.kind());
            debug!("Cache hit in {} level: {}", level.kind(), key);

            for faster in &levels[..depth] {
                faster.set(&key, self.promoted(&entry, *faster)).await;
                debug!("Promoted {} into {} level", key, faster.kind());
            }

            return Some(entry.value);
        }

        stats.record_miss();
        debug!("Cache miss: {}", key);
        None
    }

    /// Write a computed result to every tier and count the query
    pub async fn store(&self, query: &str, value: T) {
        let normalized = normalize_query(query);
        let key = CacheNamespace::Search.key(&normalized);
        let mut stats = self.stats.lock().await;
        let now = self.clock.now();

        match self.config.expiry_stamping {
            ExpiryStamping::SharedMemoryTtl => {
                let ttl = self.config.ttl_with_jitter(self.memory.ttl());
                let entry = CacheEntry::new(value, now, ttl);
                for level in self.levels() {
                    level.set(&key, entry.clone()).await;
                }
            }
            ExpiryStamping::PerLevel => {
                for level in self.levels() {
                    let ttl = self.config.ttl_with_jitter(level.ttl());
                    level.set(&key, CacheEntry::new(value.clone(), now, ttl)).await;
                }
            }
        }

        stats.record_store();
        self.durable.record_query(&normalized).await;
        debug!("Stored {} in all levels", key);
    }

    /// Copy of a hit as written into a faster tier
    fn promoted(&self, entry: &CacheEntry<T>, into: &dyn CacheLevel<T>) -> CacheEntry<T> {
        match self.config.expiry_stamping {
            ExpiryStamping::SharedMemoryTtl => entry.clone(),
            ExpiryStamping::PerLevel => entry.capped(self.clock.now(), into.ttl()),
        }
    }

    /// Recently searched queries, most recent first
    pub async fn recent_searches(&self) -> Vec<String> {
        let _guard = self.stats.lock().await;
        self.memory.recent().await
    }

    pub async fn add_recent_search(&self, raw_query: &str) {
        let _guard = self.stats.lock().await;
        self.memory.add_recent(raw_query).await;
    }

    /// Most frequently stored queries, most frequent first
    pub async fn frequent_queries(&self) -> Vec<String> {
        let _guard = self.stats.lock().await;
        self.durable
            .frequent_queries(self.config.frequent_query_top)
            .await
    }

    pub async fn cached_suggestions(&self, query: &str) -> Option<Vec<String>> {
        let _guard = self.stats.lock().await;
        self.memory.suggestions(query).await
    }

    pub async fn store_suggestions(&self, query: &str, suggestions: Vec<String>) {
        let _guard = self.stats.lock().await;
        self.memory.set_suggestions(query, suggestions).await;
    }

    /// Snapshot of the lifetime counters
    pub async fn statistics(&self) -> CacheStats {
        self.stats.lock().await.clone()
    }

    /// Activity counters of each tier, fastest first
    pub async fn level_stats(&self) -> Vec<(LevelKind, LevelStats)> {
        let _guard = self.stats.lock().await;
        let mut out = Vec::with_capacity(3);
        for level in self.levels() {
            out.push((level.kind(), level.stats().await));
        }
        out
    }

    /// Wipe every tier and reset statistics
    ///
    /// Frequent-query counters have their own lifecycle and are kept.
    pub async fn clear_all(&self) {
        let mut stats = self.stats.lock().await;
        for level in self.levels() {
            level.clear().await;
        }
        stats.reset();
        info!("Cleared all cache levels");
    }

    /// Remove one namespace from every tier
    pub async fn clear_namespace(&self, namespace: CacheNamespace) {
        let _guard = self.stats.lock().await;
        for level in self.levels() {
            level.clear_namespace(namespace).await;
        }
    }

    /// Sweep expired entries from every tier; statistics are untouched
    pub async fn clear_expired(&self) {
        let _guard = self.stats.lock().await;
        self.sweep_expired().await;
    }

    /// Sweep expired entries, then bring every tier within capacity
    pub async fn optimize_all(&self) {
        let _guard = self.stats.lock().await;
        self.sweep_expired().await;
        for level in self.levels() {
            level.optimize().await;
        }
        debug!("Optimized all cache levels");
    }

    async fn sweep_expired(&self) {
        for level in self.levels() {
            level.evict_expired().await;
        }
    }
}

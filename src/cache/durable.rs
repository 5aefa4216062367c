//! Durable tier backed by an embedded sled database
//!
//! Two trees live in the database:
//! - `entries`: key -> JSON-encoded [`CacheEntry`], same contract as the
//!   other tiers
//! - `frequent_queries`: normalized query -> big-endian `u64` search count.
//!   The counters never expire and survive `clear`; once the map grows past
//!   its limit only the most frequent queries are kept.
//!
//! Entry timestamps are indexed in memory when the database is opened, so
//! expiry sweeps and capacity eviction never decode stored values and the
//! entry count never requires a tree scan.

use crate::cache::{
    config::LevelConfig,
    entry::CacheEntry,
    key::{normalize_query, CacheNamespace},
    level::{excess_oldest, CacheLevel, LevelCounters},
    types::{LevelKind, LevelStats},
};
use crate::clock::Clock;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const ENTRIES_TREE: &str = "entries";
const FREQUENT_TREE: &str = "frequent_queries";

/// Timestamps decoded from a stored entry without keeping its value
#[derive(Debug, Clone, Copy, Deserialize)]
struct EntryStamps {
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl<T> From<&CacheEntry<T>> for EntryStamps {
    fn from(entry: &CacheEntry<T>) -> Self {
        Self {
            created_at: entry.created_at,
            expires_at: entry.expires_at,
        }
    }
}

/// Pruning policy for the frequent-query map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequentQueryLimits {
    /// Map size that triggers pruning
    pub limit: usize,
    /// Number of top queries kept after pruning
    pub retain: usize,
}

impl Default for FrequentQueryLimits {
    fn default() -> Self {
        Self {
            limit: 1_000,
            retain: 500,
        }
    }
}

/// Database-backed cache tier
pub struct DurableLevel<T> {
    db: sled::Db,
    entries: sled::Tree,
    frequent: sled::Tree,
    config: LevelConfig,
    limits: FrequentQueryLimits,
    clock: Arc<dyn Clock>,
    /// key -> timestamps of every stored entry; the lock also serializes
    /// writes to both trees
    index: Mutex<HashMap<String, EntryStamps>>,
    /// Number of keys in the frequent-query tree
    frequent_len: AtomicUsize,
    counters: LevelCounters,
    _value: PhantomData<fn() -> T>,
}

impl<T> DurableLevel<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Open (creating if needed) the database at `path` and index its entries
    pub fn open(
        path: impl AsRef<Path>,
        config: LevelConfig,
        limits: FrequentQueryLimits,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let db = sled::open(path.as_ref())?;
        let entries = db.open_tree(ENTRIES_TREE)?;
        let frequent = db.open_tree(FREQUENT_TREE)?;

        let index = Self::scan(&entries)?;
        let frequent_len = frequent.len();

        info!(
            "Opened durable cache level at {:?} ({} entries, {} tracked queries)",
            path.as_ref(),
            index.len(),
            frequent_len
        );

        Ok(Self {
            db,
            entries,
            frequent,
            config,
            limits,
            clock,
            index: Mutex::new(index),
            frequent_len: AtomicUsize::new(frequent_len),
            counters: LevelCounters::default(),
            _value: PhantomData,
        })
    }

    /// Build the timestamp index, dropping entries that cannot be decoded
    fn scan(entries: &sled::Tree) -> Result<HashMap<String, EntryStamps>> {
        let mut index = HashMap::new();
        for item in entries.iter() {
            let (key, value) = item?;
            let decoded = std::str::from_utf8(&key)
                .ok()
                .zip(serde_json::from_slice::<EntryStamps>(&value).ok());

            match decoded {
                Some((name, stamps)) => {
                    index.insert(name.to_string(), stamps);
                }
                None => {
                    warn!(
                        "Removing undecodable durable entry: {}",
                        String::from_utf8_lossy(&key)
                    );
                    entries.remove(&key)?;
                }
            }
        }
        Ok(index)
    }

    /// Count one more search for `query`
    pub async fn record_query(&self, query: &str) {
        let query = normalize_query(query);
        if query.is_empty() {
            return;
        }

        let _guard = self.index.lock().await;
        let previous = self.frequent.fetch_and_update(query.as_bytes(), |old| {
            let count = old.map(decode_count).unwrap_or(0).saturating_add(1);
            Some(count.to_be_bytes().to_vec())
        });

        match previous {
            Ok(None) => {
                self.frequent_len.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Some(_)) => {}
            Err(e) => {
                warn!("Dropping frequent-query update for {}: {}", query, e);
                return;
            }
        }

        if self.frequent_query_count() > self.limits.limit {
            if let Err(e) = self.prune_frequent() {
                warn!("Failed to prune frequent queries: {}", e);
            }
        }
    }

    /// Up to `limit` queries, most frequent first (ties broken alphabetically)
    pub async fn frequent_queries(&self, limit: usize) -> Vec<String> {
        match self.ranked_queries() {
            Ok(ranked) => ranked.into_iter().take(limit).map(|(q, _)| q).collect(),
            Err(e) => {
                warn!("Failed to read frequent queries: {}", e);
                Vec::new()
            }
        }
    }

    /// Search count recorded for a query
    pub async fn query_count(&self, query: &str) -> u64 {
        let query = normalize_query(query);
        match self.frequent.get(query.as_bytes()) {
            Ok(Some(bytes)) => decode_count(&bytes),
            Ok(None) => 0,
            Err(e) => {
                warn!("Failed to read query count for {}: {}", query, e);
                0
            }
        }
    }

    /// Number of distinct queries being counted
    pub fn frequent_query_count(&self) -> usize {
        self.frequent_len.load(Ordering::Relaxed)
    }

    /// Drop every frequent-query counter
    pub async fn clear_frequent_queries(&self) {
        let _guard = self.index.lock().await;
        match self.frequent.clear() {
            Ok(()) => self.frequent_len.store(0, Ordering::Relaxed),
            Err(e) => warn!("Failed to clear frequent queries: {}", e),
        }
    }

    fn ranked_queries(&self) -> Result<Vec<(String, u64)>> {
        let mut ranked = Vec::with_capacity(self.frequent_query_count());
        for item in self.frequent.iter() {
            let (key, value) = item?;
            let query = String::from_utf8_lossy(&key).into_owned();
            ranked.push((query, decode_count(&value)));
        }
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(ranked)
    }

    fn prune_frequent(&self) -> Result<()> {
        let ranked = self.ranked_queries()?;
        let kept = ranked.len().min(self.limits.retain);
        for (query, _) in ranked.iter().skip(self.limits.retain) {
            self.frequent.remove(query.as_bytes())?;
        }
        self.frequent_len.store(kept, Ordering::Relaxed);
        debug!("Pruned {} infrequent queries", ranked.len() - kept);
        Ok(())
    }

    /// Delete keys from the tree and the index, returning how many went
    fn remove_keys(&self, index: &mut HashMap<String, EntryStamps>, keys: &[String]) -> usize {
        let mut removed = 0;
        for key in keys {
            match self.entries.remove(key.as_bytes()) {
                Ok(_) => {
                    index.remove(key);
                    removed += 1;
                }
                Err(e) => warn!("Failed to remove durable entry {}: {}", key, e),
            }
        }
        removed
    }

    fn remove_expired(&self, index: &mut HashMap<String, EntryStamps>) -> usize {
        let now = self.clock.now();
        let expired: Vec<String> = index
            .iter()
            .filter(|(_, stamps)| now >= stamps.expires_at)
            .map(|(key, _)| key.clone())
            .collect();

        let removed = self.remove_keys(index, &expired);
        self.counters.expired(removed);
        removed
    }

    fn read_entry(&self, key: &str) -> Result<Option<CacheEntry<T>>> {
        match self.entries.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

fn decode_count(bytes: &[u8]) -> u64 {
    <[u8; 8]>::try_from(bytes)
        .map(u64::from_be_bytes)
        .unwrap_or(0)
}

#[async_trait]
impl<T> CacheLevel<T> for DurableLevel<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn kind(&self) -> LevelKind {
        LevelKind::Durable
    }

    fn ttl(&self) -> Duration {
        self.config.ttl
    }

    fn max_entries(&self) -> usize {
        self.config.max_entries
    }

    async fn get(&self, key: &str) -> Option<CacheEntry<T>> {
        let mut index = self.index.lock().await;

        let entry = match self.read_entry(key) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                index.remove(key);
                self.counters.read(false);
                return None;
            }
            Err(e) => {
                warn!("Treating durable entry for {} as a miss: {}", key, e);
                self.remove_keys(&mut index, &[key.to_string()]);
                self.counters.read(false);
                return None;
            }
        };

        if entry.is_expired_at(self.clock.now()) {
            debug!("Durable entry expired: {}", key);
            let removed = self.remove_keys(&mut index, &[key.to_string()]);
            self.counters.expired(removed);
            self.counters.read(false);
            return None;
        }

        debug!("Durable hit: {}", key);
        self.counters.read(true);
        Some(entry)
    }

    async fn set(&self, key: &str, entry: CacheEntry<T>) {
        let bytes = match serde_json::to_vec(&entry) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Dropping durable cache write for {}: {}", key, e);
                return;
            }
        };

        let mut index = self.index.lock().await;

        if !index.contains_key(key) && index.len() >= self.config.max_entries {
            let oldest = index
                .iter()
                .min_by_key(|(_, stamps)| stamps.created_at)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                debug!("Evicting durable entry due to max_entries limit: {}", oldest);
                let removed = self.remove_keys(&mut index, &[oldest]);
                self.counters.evicted(removed);
            }
        }

        match self.entries.insert(key.as_bytes(), bytes) {
            Ok(_) => {
                index.insert(key.to_string(), EntryStamps::from(&entry));
                self.counters.write();
            }
            Err(e) => warn!("Dropping durable cache write for {}: {}", key, e),
        }
    }

    async fn clear(&self) {
        let mut index = self.index.lock().await;
        let count = index.len();
        match self.entries.clear() {
            Ok(()) => {
                index.clear();
                info!("Cleared {} entries from durable level", count);
            }
            Err(e) => warn!("Failed to clear durable level: {}", e),
        }
    }

    async fn clear_namespace(&self, namespace: CacheNamespace) {
        let mut index = self.index.lock().await;
        let keys: Vec<String> = index
            .keys()
            .filter(|key| namespace.contains(key))
            .cloned()
            .collect();
        let removed = self.remove_keys(&mut index, &keys);
        debug!("Cleared {} {} entries from durable level", removed, namespace);
    }

    async fn evict_expired(&self) {
        let mut index = self.index.lock().await;
        let removed = self.remove_expired(&mut index);
        if removed > 0 {
            debug!("Durable level: removed {} expired entries", removed);
        }
    }

    async fn optimize(&self) {
        let mut index = self.index.lock().await;
        self.remove_expired(&mut index);

        let ages = index
            .iter()
            .map(|(key, stamps)| (key.clone(), stamps.created_at))
            .collect();
        let excess = excess_oldest(ages, self.config.max_entries);
        let removed = self.remove_keys(&mut index, &excess);
        self.counters.evicted(removed);

        if let Err(e) = self.db.flush() {
            warn!("Durable flush failed: {}", e);
        }
    }

    async fn len(&self) -> usize {
        self.index.lock().await.len()
    }

    async fn stats(&self) -> LevelStats {
        let entries = self.index.lock().await.len();
        self.counters.snapshot(entries)
    }
}

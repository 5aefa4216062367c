//! The storage-tier contract shared by memory, disk and durable levels

use crate::cache::entry::CacheEntry;
use crate::cache::key::CacheNamespace;
use crate::cache::types::{LevelKind, LevelStats};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// A single storage tier
///
/// All implementations honour the same contract and differ only in medium
/// and capacity:
/// - `get` returns `None` for unknown or expired keys, and physically removes
///   an expired entry it runs into.
/// - `set` is an unconditional upsert. A new key arriving at capacity evicts
///   the entry with the oldest `created_at` first; writes are never rejected.
/// - Storage failures are logged and degrade to a miss or a dropped write.
///
/// Eviction orders by creation time, not last access: `get` never refreshes an
/// entry, so an old entry that is read often can go before a newer one that is
/// never read. This is expected behaviour.
#[async_trait]
pub trait CacheLevel<T>: Send + Sync
where
    T: Clone + Send + Sync + 'static,
{
    /// Which tier this is
    fn kind(&self) -> LevelKind;

    /// Lifetime the tier stamps on its own entries
    fn ttl(&self) -> Duration;

    /// Capacity of the tier
    fn max_entries(&self) -> usize;

    async fn get(&self, key: &str) -> Option<CacheEntry<T>>;

    async fn set(&self, key: &str, entry: CacheEntry<T>);

    /// Wipe this tier only
    async fn clear(&self);

    /// Remove every key belonging to `namespace`
    async fn clear_namespace(&self, namespace: CacheNamespace);

    /// Sweep out all expired entries
    async fn evict_expired(&self);

    /// `evict_expired`, then drop oldest-created entries until within capacity
    async fn optimize(&self);

    /// Number of entries currently stored
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of the tier's activity counters
    async fn stats(&self) -> LevelStats;
}

/// Lock-free activity counters embedded in each level
#[derive(Debug, Default)]
pub(crate) struct LevelCounters {
    reads: AtomicU64,
    hits: AtomicU64,
    writes: AtomicU64,
    evictions_ttl: AtomicU64,
    evictions_capacity: AtomicU64,
}

impl LevelCounters {
    pub(crate) fn read(&self, hit: bool) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn expired(&self, count: usize) {
        self.evictions_ttl.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn evicted(&self, count: usize) {
        self.evictions_capacity
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, entries: usize) -> LevelStats {
        LevelStats {
            reads: self.reads.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            evictions_ttl: self.evictions_ttl.load(Ordering::Relaxed),
            evictions_capacity: self.evictions_capacity.load(Ordering::Relaxed),
            entries,
        }
    }
}

/// Keys to drop so that `entries` fits in `max_entries`, oldest `created_at` first
pub(crate) fn excess_oldest<K: Clone>(
    mut entries: Vec<(K, chrono::DateTime<chrono::Utc>)>,
    max_entries: usize,
) -> Vec<K> {
    if entries.len() <= max_entries {
        return Vec::new();
    }
    let excess = entries.len() - max_entries;
    entries.sort_by(|a, b| a.1.cmp(&b.1));
    entries.into_iter().take(excess).map(|(k, _)| k).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_excess_oldest() {
        let now = Utc::now();
        let entries = vec![
            ("b", now + chrono::Duration::seconds(2)),
            ("a", now),
            ("c", now + chrono::Duration::seconds(5)),
            ("d", now + chrono::Duration::seconds(1)),
        ];

        assert_eq!(excess_oldest(entries.clone(), 2), vec!["a", "d"]);
        assert!(excess_oldest(entries, 4).is_empty());
    }

    #[test]
    fn test_level_counters() {
        let counters = LevelCounters::default();
        counters.read(true);
        counters.read(false);
        counters.write();
        counters.expired(3);
        counters.evicted(1);

        let stats = counters.snapshot(7);
        assert_eq!(stats.reads, 2);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.evictions_ttl, 3);
        assert_eq!(stats.evictions_capacity, 1);
        assert_eq!(stats.entries, 7);
    }
}

//! In-process memory tier
//!
//! Besides the entry map, the memory tier owns two small side maps with the
//! same lifecycle: cached suggestion lists and the recent-searches list.

use crate::cache::{
    config::LevelConfig,
    entry::CacheEntry,
    key::{normalize_query, CacheKey, CacheNamespace},
    level::{CacheLevel, LevelCounters},
    types::{LevelKind, LevelStats},
};
use crate::clock::Clock;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Memory tier with TTL support and oldest-first eviction
pub struct MemoryLevel<T> {
    config: LevelConfig,
    recent_capacity: usize,
    clock: Arc<dyn Clock>,
    state: RwLock<MemoryState<T>>,
    counters: LevelCounters,
}

struct MemoryState<T> {
    /// Main storage: key -> entry
    entries: HashMap<CacheKey, CacheEntry<T>>,

    /// Suggestion lists keyed by namespaced query, no TTL and no capacity
    suggestions: HashMap<CacheKey, Vec<String>>,

    /// Recently searched raw queries, most recent first
    recent: VecDeque<String>,
}

impl<T> MemoryLevel<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(config: LevelConfig, recent_capacity: usize, clock: Arc<dyn Clock>) -> Self {
        debug!("Initializing memory level with config: {:?}", config);

        Self {
            config,
            recent_capacity,
            clock,
            state: RwLock::new(MemoryState {
                entries: HashMap::new(),
                suggestions: HashMap::new(),
                recent: VecDeque::new(),
            }),
            counters: LevelCounters::default(),
        }
    }

    /// Record a raw query at the front of the recent list
    ///
    /// A query equal to an existing one after normalization moves to the
    /// front instead of appearing twice. Blank queries are ignored.
    pub async fn add_recent(&self, raw_query: &str) {
        let query = raw_query.trim();
        if query.is_empty() {
            return;
        }

        let normalized = normalize_query(query);
        let mut state = self.state.write().await;
        state.recent.retain(|q| normalize_query(q) != normalized);
        state.recent.push_front(query.to_string());
        state.recent.truncate(self.recent_capacity);
    }

    /// Recent queries, most recent first
    pub async fn recent(&self) -> Vec<String> {
        let state = self.state.read().await;
        state.recent.iter().cloned().collect()
    }

    /// Replace the cached suggestion list for a query
    pub async fn set_suggestions(&self, query: &str, suggestions: Vec<String>) {
        let key = CacheNamespace::Suggestions.key(query);
        let mut state = self.state.write().await;
        state.suggestions.insert(key, suggestions);
    }

    /// Cached suggestion list for a query
    pub async fn suggestions(&self, query: &str) -> Option<Vec<String>> {
        let key = CacheNamespace::Suggestions.key(query);
        let state = self.state.read().await;
        state.suggestions.get(&key).cloned()
    }

    /// Remove the entry with the oldest creation time
    fn evict_oldest(&self, state: &mut MemoryState<T>) {
        let oldest = state
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.created_at)
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest {
            debug!("Evicting memory entry due to max_entries limit: {}", key);
            state.entries.remove(&key);
            self.counters.evicted(1);
        }
    }

    fn remove_expired(&self, state: &mut MemoryState<T>) -> usize {
        let now = self.clock.now();
        let before = state.entries.len();
        state.entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - state.entries.len();
        self.counters.expired(removed);
        removed
    }
}

#[async_trait]
impl<T> CacheLevel<T> for MemoryLevel<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn kind(&self) -> LevelKind {
        LevelKind::Memory
    }

    fn ttl(&self) -> Duration {
        self.config.ttl
    }

    fn max_entries(&self) -> usize {
        self.config.max_entries
    }

    async fn get(&self, key: &str) -> Option<CacheEntry<T>> {
        let now = self.clock.now();
        let mut state = self.state.write().await;

        let expired = match state.entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                self.counters.read(true);
                debug!("Memory hit: {}", key);
                return Some(entry.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            debug!("Memory entry expired: {}", key);
            state.entries.remove(key);
            self.counters.expired(1);
        }
        self.counters.read(false);
        None
    }

    async fn set(&self, key: &str, entry: CacheEntry<T>) {
        let mut state = self.state.write().await;

        if !state.entries.contains_key(key) && state.entries.len() >= self.config.max_entries {
            self.evict_oldest(&mut state);
        }

        state.entries.insert(key.to_string(), entry);
        self.counters.write();
    }

    async fn clear(&self) {
        let mut state = self.state.write().await;
        let count = state.entries.len();
        state.entries.clear();
        state.suggestions.clear();
        state.recent.clear();
        info!("Cleared {} entries from memory level", count);
    }

    async fn clear_namespace(&self, namespace: CacheNamespace) {
        let mut state = self.state.write().await;
        match namespace {
            CacheNamespace::Suggestions => state.suggestions.clear(),
            CacheNamespace::Recent => state.recent.clear(),
            CacheNamespace::Search => {}
        }
        state.entries.retain(|key, _| !namespace.contains(key));
        debug!("Cleared {} namespace from memory level", namespace);
    }

    async fn evict_expired(&self) {
        let mut state = self.state.write().await;
        let removed = self.remove_expired(&mut state);
        if removed > 0 {
            debug!("Memory level: removed {} expired entries", removed);
        }
    }

    async fn optimize(&self) {
        let mut state = self.state.write().await;
        self.remove_expired(&mut state);

        let ages = state
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.created_at))
            .collect();
        let excess = super::level::excess_oldest(ages, self.config.max_entries);
        for key in &excess {
            state.entries.remove(key);
        }
        self.counters.evicted(excess.len());
    }

    async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    async fn stats(&self) -> LevelStats {
        let entries = self.state.read().await.entries.len();
        self.counters.snapshot(entries)
    }
}

//! Core type definitions for the cache system

use serde::{Deserialize, Serialize};
use std::fmt;

/// One storage tier of the cache hierarchy, fastest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelKind {
    /// In-process map
    Memory,

    /// One file per key under a cache directory
    Disk,

    /// Embedded database
    Durable,
}

impl fmt::Display for LevelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelKind::Memory => write!(f, "memory"),
            LevelKind::Disk => write!(f, "disk"),
            LevelKind::Durable => write!(f, "durable"),
        }
    }
}

/// How a catalog item matched the query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Prefix,
    Fuzzy,
    Barcode,
    Sku,
}

/// A single catalog search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    /// Catalog object id
    pub id: String,
    /// Display name
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Price in the smallest currency unit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_cents: Option<i64>,
    /// Relevance score assigned by the search engine
    pub score: f64,
    pub match_type: MatchType,
}

/// Search-quality metadata produced alongside a result list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchQualityMetrics {
    /// Candidates considered before ranking
    pub total_candidates: usize,
    /// Results that came from fuzzy matching
    pub fuzzy_matches: usize,
    /// Best relevance score in the list
    pub top_score: f64,
    /// Time the engine spent computing the list
    pub search_time_ms: u64,
}

/// Cached value for the search namespace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachedSearchResult {
    /// Ranked results, best first
    pub results: Vec<ResultItem>,
    pub metrics: SearchQualityMetrics,
}

impl CachedSearchResult {
    pub fn new(results: Vec<ResultItem>, metrics: SearchQualityMetrics) -> Self {
        Self { results, metrics }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Lifetime counters for one tiered cache instance
///
/// Counters only grow; they return to zero through [`CacheStats::reset`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Hits served by the memory tier
    pub memory_hits: u64,

    /// Hits served by the disk tier
    pub disk_hits: u64,

    /// Hits served by the durable tier
    pub durable_hits: u64,

    /// Lookups no tier could answer
    pub misses: u64,

    /// Values written through `store`
    pub stores: u64,
}

impl CacheStats {
    pub fn record_hit(&mut self, level: LevelKind) {
        match level {
            LevelKind::Memory => self.memory_hits += 1,
            LevelKind::Disk => self.disk_hits += 1,
            LevelKind::Durable => self.durable_hits += 1,
        }
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_store(&mut self) {
        self.stores += 1;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Hits recorded for one tier
    pub fn hits(&self, level: LevelKind) -> u64 {
        match level {
            LevelKind::Memory => self.memory_hits,
            LevelKind::Disk => self.disk_hits,
            LevelKind::Durable => self.durable_hits,
        }
    }

    pub fn total_hits(&self) -> u64 {
        self.memory_hits + self.disk_hits + self.durable_hits
    }

    pub fn total_requests(&self) -> u64 {
        self.total_hits() + self.misses
    }

    /// Fraction of lookups answered by any tier, 0.0 with no traffic
    pub fn hit_rate(&self) -> f64 {
        ratio(self.total_hits(), self.total_requests())
    }

    /// Fraction of lookups answered by the memory tier, 0.0 with no traffic
    pub fn memory_hit_rate(&self) -> f64 {
        ratio(self.memory_hits, self.total_requests())
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ hits: {} (memory: {}, disk: {}, durable: {}), misses: {}, hit_rate: {:.2}%, stores: {} }}",
            self.total_hits(),
            self.memory_hits,
            self.disk_hits,
            self.durable_hits,
            self.misses,
            self.hit_rate() * 100.0,
            self.stores
        )
    }
}

/// Per-tier activity counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelStats {
    /// `get` calls
    pub reads: u64,
    /// `get` calls that returned an entry
    pub hits: u64,
    /// `set` calls that reached storage
    pub writes: u64,
    /// Entries dropped because they expired
    pub evictions_ttl: u64,
    /// Entries dropped to stay within `max_entries`
    pub evictions_capacity: u64,
    /// Entries currently stored
    pub entries: usize,
}

pub(crate) fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

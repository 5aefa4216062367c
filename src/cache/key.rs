//! Cache key normalization and namespacing

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cache key type - a namespaced, normalized query string
pub type CacheKey = String;

/// Canonicalize a raw query: lowercase, trimmed, internal whitespace
/// collapsed to single spaces.
///
/// `normalize_query(normalize_query(q)) == normalize_query(q)` for every `q`.
pub fn normalize_query(raw: &str) -> String {
    raw.split_whitespace()
        .map(|token| token.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Logical key spaces sharing the same storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheNamespace {
    /// Full search result lists
    Search,

    /// Autocomplete suggestion lists
    Suggestions,

    /// Recently searched queries
    Recent,
}

impl CacheNamespace {
    pub const ALL: [CacheNamespace; 3] = [
        CacheNamespace::Search,
        CacheNamespace::Suggestions,
        CacheNamespace::Recent,
    ];

    /// Key prefix; prefixes are disjoint so namespaces never collide
    pub fn prefix(&self) -> &'static str {
        match self {
            CacheNamespace::Search => "search:",
            CacheNamespace::Suggestions => "suggest:",
            CacheNamespace::Recent => "recent:",
        }
    }

    /// Build the storage key for a query in this namespace
    pub fn key(&self, query: &str) -> CacheKey {
        format!("{}{}", self.prefix(), normalize_query(query))
    }

    /// Namespace a storage key belongs to, if any
    pub fn of(key: &str) -> Option<CacheNamespace> {
        Self::ALL.into_iter().find(|ns| key.starts_with(ns.prefix()))
    }

    /// Whether `key` lives in this namespace
    pub fn contains(&self, key: &str) -> bool {
        key.starts_with(self.prefix())
    }

    /// Strip this namespace's prefix, returning the normalized query
    pub fn strip<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.prefix())
    }
}

impl fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheNamespace::Search => write!(f, "search"),
            CacheNamespace::Suggestions => write!(f, "suggestions"),
            CacheNamespace::Recent => write!(f, "recent"),
        }
    }
}

//! Shared helpers for integration tests

#![allow(dead_code)]

use catalog_search_cache::{
    CachedSearchResult, ManualClock, MatchType, ResultItem, SearchQualityMetrics,
    SearchResultCache, TieredCacheConfig,
};
use std::sync::Arc;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Route library logs to the test output; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Default tier settings with storage inside `tmp`
pub fn config_in(tmp: &TempDir) -> TieredCacheConfig {
    TieredCacheConfig::rooted_at(tmp.path())
}

pub async fn open_cache(config: TieredCacheConfig, clock: Arc<ManualClock>) -> SearchResultCache {
    init_tracing();
    SearchResultCache::open(config, clock)
        .await
        .expect("open tiered cache")
}

/// A one-item result list named after `name`
pub fn sample_result(name: &str) -> CachedSearchResult {
    CachedSearchResult::new(
        vec![ResultItem {
            id: format!("item-{}", name.replace(' ', "-")),
            name: name.to_string(),
            sku: Some(format!("SKU-{}", name.len())),
            barcode: None,
            category: Some("grocery".to_string()),
            price_cents: Some(499),
            score: 0.92,
            match_type: MatchType::Exact,
        }],
        SearchQualityMetrics {
            total_candidates: 40,
            fuzzy_matches: 0,
            top_score: 0.92,
            search_time_ms: 35,
        },
    )
}

//! Configuration loading tests

use catalog_search_cache::{CacheError, ExpiryStamping, TieredCacheConfig};
use std::time::Duration;

const VARS: [&str; 5] = [
    "SEARCH_CACHE_DIR",
    "SEARCH_CACHE_MEMORY_MAX_ENTRIES",
    "SEARCH_CACHE_DISK_TTL_SECS",
    "SEARCH_CACHE_TTL_JITTER",
    "SEARCH_CACHE_EXPIRY_STAMPING",
];

// Environment variables are process-wide, so every case runs in one test.
#[test]
fn test_config_from_env() {
    std::env::set_var("SEARCH_CACHE_DIR", "/tmp/search-cache-test/entries");
    std::env::set_var("SEARCH_CACHE_MEMORY_MAX_ENTRIES", "250");
    std::env::set_var("SEARCH_CACHE_DISK_TTL_SECS", "7200");
    std::env::set_var("SEARCH_CACHE_TTL_JITTER", "0.1");
    std::env::set_var("SEARCH_CACHE_EXPIRY_STAMPING", "shared");

    let config = TieredCacheConfig::from_env().unwrap();
    assert_eq!(
        config.cache_dir.to_string_lossy(),
        "/tmp/search-cache-test/entries"
    );
    assert_eq!(config.memory.max_entries, 250);
    assert_eq!(config.memory.ttl, Duration::from_secs(300));
    assert_eq!(config.disk.ttl, Duration::from_secs(7200));
    assert_eq!(config.ttl_jitter, 0.1);
    assert_eq!(config.expiry_stamping, ExpiryStamping::SharedMemoryTtl);

    std::env::set_var("SEARCH_CACHE_MEMORY_MAX_ENTRIES", "lots");
    let err = TieredCacheConfig::from_env().unwrap_err();
    assert!(matches!(err, CacheError::ConfigError(_)));

    std::env::set_var("SEARCH_CACHE_MEMORY_MAX_ENTRIES", "0");
    assert!(TieredCacheConfig::from_env().is_err());

    for var in VARS {
        std::env::remove_var(var);
    }
    let config = TieredCacheConfig::from_env().unwrap();
    assert_eq!(config.memory.max_entries, 100);
    assert_eq!(config.expiry_stamping, ExpiryStamping::PerLevel);
}

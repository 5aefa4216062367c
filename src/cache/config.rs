//! Configuration for the tiered cache

use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Lower bound of a jittered TTL as a fraction of its base
const MIN_JITTERED_FRACTION: f64 = 0.1;

/// Capacity and lifetime of a single tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelConfig {
    /// Maximum number of entries held by the tier
    pub max_entries: usize,

    /// Lifetime stamped on entries written to the tier
    pub ttl: Duration,
}

impl LevelConfig {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self { max_entries, ttl }
    }

    /// Small and short-lived: 100 entries, 5 minutes
    pub fn memory() -> Self {
        Self::new(100, Duration::from_secs(300))
    }

    /// 1000 entries, 1 hour
    pub fn disk() -> Self {
        Self::new(1_000, Duration::from_secs(3600))
    }

    /// 10 000 entries, 24 hours
    pub fn durable() -> Self {
        Self::new(10_000, Duration::from_secs(24 * 3600))
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.max_entries == 0 {
            return Err(CacheError::ConfigError(format!(
                "{} max_entries must be greater than 0",
                name
            )));
        }
        if self.ttl.is_zero() {
            return Err(CacheError::ConfigError(format!(
                "{} ttl must be greater than 0",
                name
            )));
        }
        Ok(())
    }
}

/// How `store` stamps expiry on the copies it writes to each tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryStamping {
    /// One entry stamped with the memory tier's TTL is written unchanged to
    /// every tier. The slower tiers' longer TTLs never apply to these entries.
    SharedMemoryTtl,

    /// Every tier stamps its own TTL. Promoted copies are capped at the
    /// receiving tier's TTL.
    #[default]
    PerLevel,
}

impl FromStr for ExpiryStamping {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "shared" | "shared_memory_ttl" => Ok(ExpiryStamping::SharedMemoryTtl),
            "per_level" | "per-level" => Ok(ExpiryStamping::PerLevel),
            other => Err(CacheError::ConfigError(format!(
                "unknown expiry stamping mode: {}",
                other
            ))),
        }
    }
}

/// Configuration for the tiered search cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TieredCacheConfig {
    pub memory: LevelConfig,
    pub disk: LevelConfig,
    pub durable: LevelConfig,

    /// Directory holding one file per disk-tier entry
    pub cache_dir: PathBuf,

    /// Path of the durable tier's database
    pub durable_path: PathBuf,

    /// TTL jitter factor (0.0 - 1.0), 0.0 gives exact expiry
    pub ttl_jitter: f64,

    pub expiry_stamping: ExpiryStamping,

    /// Length of the recent-searches list
    pub recent_capacity: usize,

    /// Frequent-query map size that triggers pruning
    pub frequent_query_limit: usize,

    /// Number of most frequent queries kept after pruning
    pub frequent_query_retain: usize,

    /// Number of queries returned by `frequent_queries`
    pub frequent_query_top: usize,
}

impl Default for TieredCacheConfig {
    fn default() -> Self {
        let base = std::env::temp_dir().join("catalog-search-cache");
        Self {
            memory: LevelConfig::memory(),
            disk: LevelConfig::disk(),
            durable: LevelConfig::durable(),
            cache_dir: base.join("entries"),
            durable_path: base.join("durable.db"),
            ttl_jitter: 0.0,
            expiry_stamping: ExpiryStamping::default(),
            recent_capacity: 20,
            frequent_query_limit: 1_000,
            frequent_query_retain: 500,
            frequent_query_top: 10,
        }
    }
}

impl TieredCacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> TieredCacheConfigBuilder {
        TieredCacheConfigBuilder::default()
    }

    /// Place both on-disk tiers under one base directory
    pub fn rooted_at(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self {
            cache_dir: base.join("entries"),
            durable_path: base.join("durable.db"),
            ..Default::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.memory.validate("memory")?;
        self.disk.validate("disk")?;
        self.durable.validate("durable")?;

        if !(0.0..=1.0).contains(&self.ttl_jitter) {
            return Err(CacheError::ConfigError(
                "ttl_jitter must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.recent_capacity == 0 {
            return Err(CacheError::ConfigError(
                "recent_capacity must be greater than 0".to_string(),
            ));
        }

        if self.frequent_query_retain > self.frequent_query_limit {
            return Err(CacheError::ConfigError(
                "frequent_query_retain must not exceed frequent_query_limit".to_string(),
            ));
        }

        Ok(())
    }

    /// Calculate actual TTL with jitter applied
    ///
    /// The result never drops below a tenth of `base`.
    pub fn ttl_with_jitter(&self, base: Duration) -> Duration {
        if self.ttl_jitter == 0.0 {
            return base;
        }

        let base_secs = base.as_secs_f64();
        let jitter_range = base_secs * self.ttl_jitter;
        let jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter_range;
        let final_secs = (base_secs + jitter).max(base_secs * MIN_JITTERED_FRACTION);

        Duration::try_from_secs_f64(final_secs).unwrap_or(base)
    }

    /// Load configuration from the environment (and a `.env` file if present)
    ///
    /// Unset variables keep their defaults; malformed ones are an error.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = Self::default();

        if let Some(dir) = env_var("SEARCH_CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Some(path) = env_var("SEARCH_CACHE_DB_PATH") {
            config.durable_path = PathBuf::from(path);
        }

        apply_level_env(&mut config.memory, "MEMORY")?;
        apply_level_env(&mut config.disk, "DISK")?;
        apply_level_env(&mut config.durable, "DURABLE")?;

        if let Some(jitter) = env_parse::<f64>("SEARCH_CACHE_TTL_JITTER")? {
            config.ttl_jitter = jitter;
        }
        if let Some(mode) = env_var("SEARCH_CACHE_EXPIRY_STAMPING") {
            config.expiry_stamping = mode.parse()?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env_var(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| CacheError::ConfigError(format!("invalid value for {}: {}", name, raw))),
        None => Ok(None),
    }
}

fn apply_level_env(level: &mut LevelConfig, tier: &str) -> Result<()> {
    if let Some(max) = env_parse::<usize>(&format!("SEARCH_CACHE_{}_MAX_ENTRIES", tier))? {
        level.max_entries = max;
    }
    if let Some(secs) = env_parse::<u64>(&format!("SEARCH_CACHE_{}_TTL_SECS", tier))? {
        level.ttl = Duration::from_secs(secs);
    }
    Ok(())
}

/// Builder for cache configuration with validation
#[derive(Debug, Default)]
pub struct TieredCacheConfigBuilder {
    memory: Option<LevelConfig>,
    disk: Option<LevelConfig>,
    durable: Option<LevelConfig>,
    cache_dir: Option<PathBuf>,
    durable_path: Option<PathBuf>,
    ttl_jitter: Option<f64>,
    expiry_stamping: Option<ExpiryStamping>,
    recent_capacity: Option<usize>,
    frequent_query_limit: Option<usize>,
    frequent_query_retain: Option<usize>,
    frequent_query_top: Option<usize>,
}

impl TieredCacheConfigBuilder {
    pub fn memory(mut self, level: LevelConfig) -> Self {
        self.memory = Some(level);
        self
    }

    pub fn disk(mut self, level: LevelConfig) -> Self {
        self.disk = Some(level);
        self
    }

    pub fn durable(mut self, level: LevelConfig) -> Self {
        self.durable = Some(level);
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn durable_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.durable_path = Some(path.into());
        self
    }

    /// Set TTL jitter factor (0.0 - 1.0)
    pub fn ttl_jitter(mut self, jitter: f64) -> Self {
        self.ttl_jitter = Some(jitter);
        self
    }

    pub fn expiry_stamping(mut self, mode: ExpiryStamping) -> Self {
        self.expiry_stamping = Some(mode);
        self
    }

    pub fn recent_capacity(mut self, capacity: usize) -> Self {
        self.recent_capacity = Some(capacity);
        self
    }

    /// Prune the frequent-query map to `retain` once it grows past `limit`
    pub fn frequent_query_pruning(mut self, limit: usize, retain: usize) -> Self {
        self.frequent_query_limit = Some(limit);
        self.frequent_query_retain = Some(retain);
        self
    }

    pub fn frequent_query_top(mut self, top: usize) -> Self {
        self.frequent_query_top = Some(top);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> TieredCacheConfig {
        let defaults = TieredCacheConfig::default();

        TieredCacheConfig {
            memory: self.memory.unwrap_or(defaults.memory),
            disk: self.disk.unwrap_or(defaults.disk),
            durable: self.durable.unwrap_or(defaults.durable),
            cache_dir: self.cache_dir.unwrap_or(defaults.cache_dir),
            durable_path: self.durable_path.unwrap_or(defaults.durable_path),
            ttl_jitter: self.ttl_jitter.unwrap_or(defaults.ttl_jitter),
            expiry_stamping: self.expiry_stamping.unwrap_or(defaults.expiry_stamping),
            recent_capacity: self.recent_capacity.unwrap_or(defaults.recent_capacity),
            frequent_query_limit: self
                .frequent_query_limit
                .unwrap_or(defaults.frequent_query_limit),
            frequent_query_retain: self
                .frequent_query_retain
                .unwrap_or(defaults.frequent_query_retain),
            frequent_query_top: self.frequent_query_top.unwrap_or(defaults.frequent_query_top),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TieredCacheConfig::default();
        assert_eq!(config.memory, LevelConfig::new(100, Duration::from_secs(300)));
        assert_eq!(config.disk.max_entries, 1_000);
        assert_eq!(config.durable.ttl, Duration::from_secs(86_400));
        assert_eq!(config.recent_capacity, 20);
        assert_eq!(config.expiry_stamping, ExpiryStamping::PerLevel);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = TieredCacheConfig::default();
        config.disk.max_entries = 0;
        assert!(config.validate().is_err());

        let mut config = TieredCacheConfig::default();
        config.memory.ttl = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = TieredCacheConfig::default();
        config.ttl_jitter = 1.5;
        assert!(config.validate().is_err());

        let config = TieredCacheConfig::builder()
            .frequent_query_pruning(100, 200)
            .build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = TieredCacheConfig::builder()
            .memory(LevelConfig::new(10, Duration::from_secs(30)))
            .cache_dir("/tmp/entries")
            .expiry_stamping(ExpiryStamping::SharedMemoryTtl)
            .recent_capacity(5)
            .build();

        assert_eq!(config.memory.max_entries, 10);
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/entries"));
        assert_eq!(config.expiry_stamping, ExpiryStamping::SharedMemoryTtl);
        assert_eq!(config.recent_capacity, 5);
        assert_eq!(config.disk, LevelConfig::disk());
    }

    #[test]
    fn test_rooted_at() {
        let config = TieredCacheConfig::rooted_at("/var/cache/search");
        assert_eq!(config.cache_dir, PathBuf::from("/var/cache/search/entries"));
        assert_eq!(config.durable_path, PathBuf::from("/var/cache/search/durable.db"));
    }

    #[test]
    fn test_ttl_with_jitter() {
        let config = TieredCacheConfig {
            ttl_jitter: 0.1,
            ..Default::default()
        };

        let ttl = config.ttl_with_jitter(Duration::from_secs(3600));
        assert!(ttl.as_secs_f64() >= 3600.0 - 360.0);
        assert!(ttl.as_secs_f64() <= 3600.0 + 360.0);

        let exact = TieredCacheConfig::default();
        assert_eq!(exact.ttl_with_jitter(Duration::from_secs(42)), Duration::from_secs(42));
    }

    #[test]
    fn test_jitter_keeps_sub_second_scale() {
        let config = TieredCacheConfig {
            ttl_jitter: 0.5,
            ..Default::default()
        };
        for _ in 0..100 {
            let ttl = config.ttl_with_jitter(Duration::from_millis(200));
            assert!(ttl >= Duration::from_millis(100), "{:?}", ttl);
            assert!(ttl <= Duration::from_millis(300), "{:?}", ttl);
        }

        let full = TieredCacheConfig {
            ttl_jitter: 1.0,
            ..Default::default()
        };
        for _ in 0..100 {
            let ttl = full.ttl_with_jitter(Duration::from_secs(10));
            assert!(ttl >= Duration::from_secs(1), "{:?}", ttl);
            assert!(ttl <= Duration::from_secs(20), "{:?}", ttl);
        }
        assert!(full.ttl_with_jitter(Duration::MAX) >= Duration::MAX / 20);
    }

    #[test]
    fn test_expiry_stamping_parse() {
        assert_eq!(
            "shared".parse::<ExpiryStamping>().unwrap(),
            ExpiryStamping::SharedMemoryTtl
        );
        assert_eq!(
            "PER_LEVEL".parse::<ExpiryStamping>().unwrap(),
            ExpiryStamping::PerLevel
        );
        assert!("sometimes".parse::<ExpiryStamping>().is_err());
    }
}

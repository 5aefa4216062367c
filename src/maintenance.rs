//! Background maintenance tasks
//!
//! Neither the cache nor the monitor schedules work on its own. Callers that
//! want periodic housekeeping spawn these tasks and abort the returned handle
//! on shutdown.

use crate::cache::TieredCache;
use crate::monitor::PerformanceMonitor;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Run `optimize_all` on the cache every `interval`
pub fn spawn_cache_maintenance<T>(cache: Arc<TieredCache<T>>, interval: Duration) -> JoinHandle<()>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    info!("Starting cache maintenance task (interval: {:?})", interval);

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            cache.optimize_all().await;
            debug!("Cache maintenance pass finished");
        }
    })
}

/// Log the monitor's trend snapshot every `interval`
pub fn spawn_trend_logging(monitor: Arc<PerformanceMonitor>, interval: Duration) -> JoinHandle<()> {
    info!("Starting search trend logging (interval: {:?})", interval);

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            monitor.analyze_trends().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::config::{LevelConfig, TieredCacheConfig};
    use crate::cache::level::CacheLevel;
    use crate::clock::ManualClock;
    use crate::monitor::MonitorConfig;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_cache_maintenance_sweeps_expired_entries() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::starting_now());
        let config = TieredCacheConfig::builder()
            .memory(LevelConfig::new(10, Duration::from_secs(1)))
            .disk(LevelConfig::new(10, Duration::from_secs(1)))
            .durable(LevelConfig::new(10, Duration::from_secs(1)))
            .cache_dir(dir.path().join("disk"))
            .durable_path(dir.path().join("durable"))
            .build();
        let cache = Arc::new(
            TieredCache::<String>::open(config, clock.clone())
                .await
                .unwrap(),
        );

        cache.store("milk", "whole milk".to_string()).await;
        clock.advance(Duration::from_secs(5));

        let handle = spawn_cache_maintenance(cache.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        assert_eq!(cache.memory().len().await, 0);
        assert_eq!(cache.disk().len().await, 0);
        assert_eq!(cache.durable().len().await, 0);
    }

    #[tokio::test]
    async fn test_trend_logging_can_be_aborted() {
        let monitor = Arc::new(PerformanceMonitor::with_system_clock(MonitorConfig::default()));
        let handle = spawn_trend_logging(monitor, Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.abort();

        let result = handle.await;
        assert!(result.unwrap_err().is_cancelled());
    }
}

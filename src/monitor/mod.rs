//! Search performance monitoring
//!
//! Records one [`SearchSession`] per search, keyed by a caller-chosen id,
//! and derives aggregate metrics and reports from them on demand.
//!
//! # Features
//!
//! - **Sessions**: active map plus a bounded FIFO of completed sessions
//! - **Metrics**: running latency average, latency histogram, cache-hit and error tallies
//! - **Alerts**: slow searches and empty result sets are counted and logged
//! - **Reports**: windowed summary with percentiles, top queries and slowest searches
//! - **Trends**: short-window snapshot meant to be logged periodically
//!
//! The monitor never fails: unknown ids are ignored.
//!
//! # Example
//!
//! ```rust,no_run
//! use catalog_search_cache::monitor::PerformanceMonitor;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let monitor = PerformanceMonitor::with_system_clock(Default::default());
//!
//! let id = monitor.begin_search("organic milk").await;
//! monitor.record_cache_hit(&id).await;
//! monitor.record_search_complete(&id, 12, Duration::from_millis(8)).await;
//!
//! let report = monitor.generate_report().await;
//! println!("hit rate: {:.0}%", report.cache_hit_rate * 100.0);
//! # }
//! ```

pub mod metrics;
pub mod report;
pub mod session;

pub use metrics::{LatencyBuckets, PerformanceMetrics};
pub use report::{percentile, LatencyDistribution, PerformanceReport, QueryStats, SlowSearch};
pub use session::{QueryComplexity, SearchSession};

use crate::cache::types::ratio;
use crate::clock::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use report::{build_report, window_start, ReportLimits};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Monitor tuning
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Completed sessions kept for reports (oldest dropped first)
    pub completed_capacity: usize,
    /// Searches strictly slower than this are reported as slow
    pub slow_search_threshold: Duration,
    /// How far back `generate_report` looks
    pub report_window: Duration,
    pub top_queries: usize,
    pub slowest_searches: usize,
    /// Window of `analyze_trends` and suggested logging period
    pub trend_interval: Duration,
    /// Active sessions older than this are dropped as abandoned
    pub stale_session_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            completed_capacity: 1000,
            slow_search_threshold: Duration::from_secs(2),
            report_window: Duration::from_secs(24 * 60 * 60),
            top_queries: 10,
            slowest_searches: 10,
            trend_interval: Duration::from_secs(5 * 60),
            stale_session_timeout: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Search activity over the last trend interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSnapshot {
    pub interval: Duration,
    pub searches: usize,
    pub errors: usize,
    pub average_latency: Duration,
    pub cache_hit_rate: f64,
    pub slow_searches: usize,
    pub active_searches: usize,
}

#[derive(Debug, Default)]
struct MonitorState {
    active: HashMap<String, SearchSession>,
    completed: VecDeque<SearchSession>,
    metrics: PerformanceMetrics,
}

/// Per-search latency and outcome tracker
///
/// All operations serialise on one lock. The monitor has no knowledge of
/// the cache; callers report hits and latencies around their own lookups.
#[derive(Debug)]
pub struct PerformanceMonitor {
    config: MonitorConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<MonitorState>,
}

impl PerformanceMonitor {
    pub fn new(config: MonitorConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            state: Mutex::new(MonitorState::default()),
        }
    }

    pub fn with_system_clock(config: MonitorConfig) -> Self {
        Self::new(config, Arc::new(SystemClock))
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Open a session under `id`
    ///
    /// An active session with the same id is replaced and counted as
    /// abandoned, as are active sessions older than `stale_session_timeout`.
    pub async fn start_search(&self, id: &str, query: &str) {
        let now = self.clock.now();
        let session = SearchSession::new(id, query, now);
        debug!(
            "Search started: {} ({} query, {} chars)",
            id, session.query_complexity, session.query_length
        );

        let mut state = self.state.lock().await;
        self.drop_stale(&mut state, now);
        state.metrics.total_searches += 1;
        if state.active.insert(id.to_string(), session).is_some() {
            debug!("Search {} restarted before finishing", id);
            state.metrics.abandoned_searches += 1;
        }
    }

    /// Open a session under a fresh id and return it
    pub async fn begin_search(&self, query: &str) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.start_search(&id, query).await;
        id
    }

    pub async fn record_cache_hit(&self, id: &str) {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        match state.active.get_mut(id) {
            Some(session) => session.mark_cache_hit(now),
            None => debug!("Cache hit for unknown search {}", id),
        }
    }

    pub async fn record_search_complete(&self, id: &str, result_count: usize, duration: Duration) {
        let now = self.clock.now();
        let mut state = self.state.lock().await;

        let Some(mut session) = state.active.remove(id) else {
            debug!("Completion for unknown search {}", id);
            return;
        };
        session.complete(result_count, duration, now);

        let metrics = &mut state.metrics;
        metrics.completed_searches += 1;
        metrics.total_latency = metrics.total_latency.saturating_add(duration);
        metrics.latency_buckets.record(duration);
        if session.cache_hit {
            metrics.cache_hits += 1;
        } else {
            metrics.cache_misses += 1;
        }

        if duration > self.config.slow_search_threshold {
            metrics.slow_searches += 1;
            warn!(
                "Slow search {}: '{}' took {:?} ({} results)",
                id, session.query, duration, result_count
            );
        }
        if result_count == 0 {
            metrics.no_results += 1;
            info!("Search {} returned no results for '{}'", id, session.query);
        }

        self.push_completed(&mut state, session);
    }

    pub async fn record_search_error(&self, id: &str, error: &str) {
        let now = self.clock.now();
        let mut state = self.state.lock().await;

        let Some(mut session) = state.active.remove(id) else {
            debug!("Error for unknown search {}", id);
            return;
        };
        warn!("Search {} failed for '{}': {}", id, session.query, error);
        session.fail(error, now);

        state.metrics.errors += 1;
        self.push_completed(&mut state, session);
    }

    fn drop_stale(&self, state: &mut MonitorState, now: DateTime<Utc>) {
        let cutoff = window_start(now, self.config.stale_session_timeout);
        let before = state.active.len();
        state.active.retain(|_, session| session.start_time >= cutoff);

        let dropped = before - state.active.len();
        if dropped > 0 {
            state.metrics.abandoned_searches += dropped as u64;
            debug!("Dropped {} abandoned searches", dropped);
        }
    }

    fn push_completed(&self, state: &mut MonitorState, session: SearchSession) {
        state.completed.push_back(session);
        while state.completed.len() > self.config.completed_capacity {
            state.completed.pop_front();
        }
    }

    /// Summarise completed searches inside the report window
    pub async fn generate_report(&self) -> PerformanceReport {
        let now = self.clock.now();
        let limits = ReportLimits {
            window: self.config.report_window,
            slow_threshold: self.config.slow_search_threshold,
            top_queries: self.config.top_queries,
            slowest_searches: self.config.slowest_searches,
        };

        let state = self.state.lock().await;
        build_report(state.completed.iter(), now, limits)
    }

    /// Snapshot of the lifetime counters
    pub async fn metrics(&self) -> PerformanceMetrics {
        self.state.lock().await.metrics.clone()
    }

    /// Completed sessions, oldest first
    pub async fn completed_searches(&self) -> Vec<SearchSession> {
        self.state.lock().await.completed.iter().cloned().collect()
    }

    pub async fn active_count(&self) -> usize {
        self.state.lock().await.active.len()
    }

    /// Summarise the last trend interval and log it
    pub async fn analyze_trends(&self) -> TrendSnapshot {
        let now = self.clock.now();
        let cutoff = window_start(now, self.config.trend_interval);

        let mut state = self.state.lock().await;
        self.drop_stale(&mut state, now);
        let recent: Vec<&SearchSession> = state
            .completed
            .iter()
            .filter(|s| s.end_time.map_or(false, |end| end >= cutoff))
            .collect();

        let successful: Vec<&SearchSession> =
            recent.iter().copied().filter(|s| s.succeeded()).collect();
        let total_latency = successful
            .iter()
            .fold(Duration::ZERO, |acc, s| acc.saturating_add(s.total_duration));
        let hits = successful.iter().filter(|s| s.cache_hit).count();

        let snapshot = TrendSnapshot {
            interval: self.config.trend_interval,
            searches: recent.len(),
            errors: recent.len() - successful.len(),
            average_latency: if successful.is_empty() {
                Duration::ZERO
            } else {
                total_latency / u32::try_from(successful.len()).unwrap_or(u32::MAX)
            },
            cache_hit_rate: ratio(hits as u64, successful.len() as u64),
            slow_searches: successful
                .iter()
                .filter(|s| s.total_duration > self.config.slow_search_threshold)
                .count(),
            active_searches: state.active.len(),
        };

        info!(
            "Search trends (last {:?}): {} searches, {} errors, avg {:?}, cache hit rate {:.1}%, {} slow, {} active",
            snapshot.interval,
            snapshot.searches,
            snapshot.errors,
            snapshot.average_latency,
            snapshot.cache_hit_rate * 100.0,
            snapshot.slow_searches,
            snapshot.active_searches
        );

        snapshot
    }

    /// Drop all sessions and zero the counters
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        *state = MonitorState::default();
        info!("Performance monitor reset");
    }
}

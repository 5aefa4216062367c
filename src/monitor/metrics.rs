//! Aggregate search metrics

use crate::cache::types::ratio;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Histogram of successful search latencies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyBuckets {
    /// < 100ms
    pub under_100ms: u64,
    /// < 500ms
    pub under_500ms: u64,
    /// < 1s
    pub under_1s: u64,
    /// < 5s
    pub under_5s: u64,
    /// >= 5s
    pub over_5s: u64,
}

impl LatencyBuckets {
    pub fn record(&mut self, latency: Duration) {
        let ms = latency.as_millis();
        match ms {
            0..=99 => self.under_100ms += 1,
            100..=499 => self.under_500ms += 1,
            500..=999 => self.under_1s += 1,
            1000..=4999 => self.under_5s += 1,
            _ => self.over_5s += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.under_100ms + self.under_500ms + self.under_1s + self.under_5s + self.over_5s
    }
}

/// Lifetime search counters, reset only through the monitor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Searches started
    pub total_searches: u64,
    /// Searches that completed without error
    pub completed_searches: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub errors: u64,
    /// Started searches that were restarted or never finished
    pub abandoned_searches: u64,
    /// Completed searches slower than the slow-search threshold
    pub slow_searches: u64,
    /// Completed searches that returned nothing
    pub no_results: u64,
    /// Sum of completed-search latencies
    pub total_latency: Duration,
    pub latency_buckets: LatencyBuckets,
}

impl PerformanceMetrics {
    /// Searches that finished either way
    pub fn finished_searches(&self) -> u64 {
        self.completed_searches + self.errors
    }

    /// Mean latency of completed searches
    pub fn average_latency(&self) -> Duration {
        if self.completed_searches == 0 {
            Duration::ZERO
        } else {
            self.total_latency / u32::try_from(self.completed_searches).unwrap_or(u32::MAX)
        }
    }

    pub fn cache_hit_rate(&self) -> f64 {
        ratio(self.cache_hits, self.cache_hits + self.cache_misses)
    }

    pub fn error_rate(&self) -> f64 {
        ratio(self.errors, self.finished_searches())
    }

    pub fn no_results_rate(&self) -> f64 {
        ratio(self.no_results, self.completed_searches)
    }
}

impl fmt::Display for PerformanceMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PerformanceMetrics {{ searches: {}, completed: {}, errors: {}, avg_latency: {:?}, cache_hit_rate: {:.2}%, slow: {}, no_results: {} }}",
            self.total_searches,
            self.completed_searches,
            self.errors,
            self.average_latency(),
            self.cache_hit_rate() * 100.0,
            self.slow_searches,
            self.no_results
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets() {
        let mut buckets = LatencyBuckets::default();
        for ms in [5, 99, 100, 499, 500, 999, 1000, 4999, 5000, 60_000] {
            buckets.record(Duration::from_millis(ms));
        }

        assert_eq!(buckets.under_100ms, 2);
        assert_eq!(buckets.under_500ms, 2);
        assert_eq!(buckets.under_1s, 2);
        assert_eq!(buckets.under_5s, 2);
        assert_eq!(buckets.over_5s, 2);
        assert_eq!(buckets.total(), 10);
    }

    #[test]
    fn test_rates_with_no_traffic() {
        let metrics = PerformanceMetrics::default();
        assert_eq!(metrics.average_latency(), Duration::ZERO);
        assert_eq!(metrics.cache_hit_rate(), 0.0);
        assert_eq!(metrics.error_rate(), 0.0);
        assert_eq!(metrics.no_results_rate(), 0.0);
    }

    #[test]
    fn test_rates() {
        let metrics = PerformanceMetrics {
            total_searches: 5,
            completed_searches: 4,
            cache_hits: 1,
            cache_misses: 3,
            errors: 1,
            no_results: 2,
            total_latency: Duration::from_millis(400),
            ..Default::default()
        };

        assert_eq!(metrics.average_latency(), Duration::from_millis(100));
        assert_eq!(metrics.cache_hit_rate(), 0.25);
        assert_eq!(metrics.error_rate(), 0.2);
        assert_eq!(metrics.no_results_rate(), 0.5);
    }
}

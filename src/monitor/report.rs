//! Performance report generation over a window of completed searches

use crate::cache::key::normalize_query;
use crate::cache::types::ratio;
use crate::monitor::session::SearchSession;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Usage of one query (grouped case-insensitively) within the report window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryStats {
    pub query: String,
    pub count: usize,
    pub average_latency: Duration,
    pub average_result_count: f64,
}

/// Nearest-rank latency percentiles of completed searches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyDistribution {
    pub p50: Duration,
    pub p90: Duration,
    pub p95: Duration,
    pub p99: Duration,
}

impl LatencyDistribution {
    pub fn from_latencies(mut latencies: Vec<Duration>) -> Self {
        latencies.sort();
        Self {
            p50: percentile(&latencies, 50),
            p90: percentile(&latencies, 90),
            p95: percentile(&latencies, 95),
            p99: percentile(&latencies, 99),
        }
    }
}

/// A completed search slower than the slow-search threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlowSearch {
    pub id: String,
    pub query: String,
    pub duration: Duration,
    pub result_count: usize,
    pub cache_hit: bool,
}

/// Summary of search behaviour over the report window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub generated_at: DateTime<Utc>,
    pub window: Duration,
    /// Sessions finished inside the window, successful or not
    pub total_searches: usize,
    pub successful_searches: usize,
    pub average_latency: Duration,
    pub cache_hit_rate: f64,
    pub error_rate: f64,
    pub no_results_count: usize,
    pub slow_search_count: usize,
    pub top_queries: Vec<QueryStats>,
    pub latency_distribution: LatencyDistribution,
    /// Slowest searches over the threshold, slowest first
    pub slowest_searches: Vec<SlowSearch>,
    pub recommendations: Vec<String>,
}

/// Limits applied while building a report
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReportLimits {
    pub window: Duration,
    pub slow_threshold: Duration,
    pub top_queries: usize,
    pub slowest_searches: usize,
}

/// Value at index `floor((n - 1) * pct / 100)` of an ascending list
///
/// Nearest-rank, no interpolation. Zero for an empty list.
pub fn percentile(sorted: &[Duration], pct: usize) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let index = (sorted.len() - 1) * pct.min(100) / 100;
    sorted[index]
}

/// Start of a window of length `window` ending at `now`, clamped to the
/// earliest representable time
pub(crate) fn window_start(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn mean(durations: &[Duration]) -> Duration {
    if durations.is_empty() {
        return Duration::ZERO;
    }
    let total = durations
        .iter()
        .fold(Duration::ZERO, |acc, d| acc.saturating_add(*d));
    total / u32::try_from(durations.len()).unwrap_or(u32::MAX)
}

pub(crate) fn build_report<'a>(
    sessions: impl Iterator<Item = &'a SearchSession>,
    now: DateTime<Utc>,
    limits: ReportLimits,
) -> PerformanceReport {
    let cutoff = window_start(now, limits.window);
    let recent: Vec<&SearchSession> = sessions.filter(|s| s.start_time >= cutoff).collect();
    let successful: Vec<&SearchSession> = recent.iter().copied().filter(|s| s.succeeded()).collect();

    let latencies: Vec<Duration> = successful.iter().map(|s| s.total_duration).collect();
    let cache_hits = successful.iter().filter(|s| s.cache_hit).count();
    let errors = recent.len() - successful.len();
    let no_results_count = successful.iter().filter(|s| s.result_count == 0).count();

    let mut slow: Vec<&SearchSession> = successful
        .iter()
        .copied()
        .filter(|s| s.total_duration > limits.slow_threshold)
        .collect();
    slow.sort_by(|a, b| b.total_duration.cmp(&a.total_duration));
    let slow_search_count = slow.len();

    let slowest_searches = slow
        .into_iter()
        .take(limits.slowest_searches)
        .map(|s| SlowSearch {
            id: s.id.clone(),
            query: s.query.clone(),
            duration: s.total_duration,
            result_count: s.result_count,
            cache_hit: s.cache_hit,
        })
        .collect();

    let mut report = PerformanceReport {
        generated_at: now,
        window: limits.window,
        total_searches: recent.len(),
        successful_searches: successful.len(),
        average_latency: mean(&latencies),
        cache_hit_rate: ratio(cache_hits as u64, successful.len() as u64),
        error_rate: ratio(errors as u64, recent.len() as u64),
        no_results_count,
        slow_search_count,
        top_queries: top_queries(&recent, limits.top_queries),
        latency_distribution: LatencyDistribution::from_latencies(latencies),
        slowest_searches,
        recommendations: Vec::new(),
    };
    report.recommendations = recommendations(&report, limits.slow_threshold);
    report
}

fn top_queries(sessions: &[&SearchSession], limit: usize) -> Vec<QueryStats> {
    let mut groups: HashMap<String, Vec<&SearchSession>> = HashMap::new();
    for &session in sessions {
        groups
            .entry(normalize_query(&session.query))
            .or_default()
            .push(session);
    }

    let mut stats: Vec<QueryStats> = groups
        .into_iter()
        .map(|(query, group)| {
            let succeeded: Vec<&SearchSession> =
                group.iter().copied().filter(|s| s.succeeded()).collect();
            let latencies: Vec<Duration> = succeeded.iter().map(|s| s.total_duration).collect();
            let results: usize = succeeded.iter().map(|s| s.result_count).sum();

            QueryStats {
                query,
                count: group.len(),
                average_latency: mean(&latencies),
                average_result_count: if succeeded.is_empty() {
                    0.0
                } else {
                    results as f64 / succeeded.len() as f64
                },
            }
        })
        .collect();

    stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.query.cmp(&b.query)));
    stats.truncate(limit);
    stats
}

fn recommendations(report: &PerformanceReport, slow_threshold: Duration) -> Vec<String> {
    let mut out = Vec::new();

    if report.successful_searches >= 10 && report.cache_hit_rate < 0.3 {
        out.push(format!(
            "Cache hit rate is {:.0}%; consider longer TTLs or pre-warming frequent queries",
            report.cache_hit_rate * 100.0
        ));
    }

    if report.error_rate > 0.05 {
        out.push(format!(
            "{:.1}% of searches failed; check the search engine logs",
            report.error_rate * 100.0
        ));
    }

    if report.slow_search_count > 0 {
        out.push(format!(
            "{} searches took longer than {:.1}s; review the slowest queries",
            report.slow_search_count,
            slow_threshold.as_secs_f64()
        ));
    }

    if report.successful_searches > 0
        && ratio(report.no_results_count as u64, report.successful_searches as u64) > 0.2
    {
        out.push(format!(
            "{} searches returned no results; consider broader fuzzy matching",
            report.no_results_count
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|v| Duration::from_millis(*v)).collect()
    }

    fn limits() -> ReportLimits {
        ReportLimits {
            window: Duration::from_secs(24 * 3600),
            slow_threshold: Duration::from_secs(2),
            top_queries: 10,
            slowest_searches: 10,
        }
    }

    fn finished(id: &str, query: &str, start: DateTime<Utc>, millis: u64, results: usize) -> SearchSession {
        let mut session = SearchSession::new(id, query, start);
        session.complete(
            results,
            Duration::from_millis(millis),
            start + chrono::Duration::milliseconds(millis as i64),
        );
        session
    }

    #[test]
    fn test_percentile_nearest_rank() {
        let sorted = ms(&[10, 20, 30, 40, 50]);
        assert_eq!(percentile(&sorted, 50), Duration::from_millis(30));
        assert_eq!(percentile(&sorted, 90), Duration::from_millis(40));
        assert_eq!(percentile(&sorted, 99), Duration::from_millis(40));
        assert_eq!(percentile(&sorted, 100), Duration::from_millis(50));
        assert_eq!(percentile(&[], 50), Duration::ZERO);
    }

    #[test]
    fn test_distribution_sorts_input() {
        let dist = LatencyDistribution::from_latencies(ms(&[50, 10, 40, 30, 20]));
        assert_eq!(dist.p50, Duration::from_millis(30));
        assert_eq!(dist.p90, Duration::from_millis(40));
    }

    #[test]
    fn test_report_window_and_grouping() {
        let now = Utc::now();
        let sessions = vec![
            finished("1", "Milk", now - chrono::Duration::hours(1), 100, 4),
            finished("2", "milk ", now - chrono::Duration::hours(2), 300, 2),
            finished("3", "eggs", now - chrono::Duration::hours(3), 3_000, 0),
            finished("old", "bread", now - chrono::Duration::hours(30), 50, 1),
        ];

        let report = build_report(sessions.iter(), now, limits());

        assert_eq!(report.total_searches, 3);
        assert_eq!(report.no_results_count, 1);
        assert_eq!(report.slow_search_count, 1);
        assert_eq!(report.slowest_searches[0].id, "3");

        assert_eq!(report.top_queries[0].query, "milk");
        assert_eq!(report.top_queries[0].count, 2);
        assert_eq!(report.top_queries[0].average_latency, Duration::from_millis(200));
        assert_eq!(report.top_queries[0].average_result_count, 3.0);
        assert!(report.top_queries.iter().all(|q| q.query != "bread"));
    }

    #[test]
    fn test_errors_excluded_from_latency() {
        let now = Utc::now();
        let ok = finished("1", "milk", now, 100, 1);
        let mut failed = SearchSession::new("2", "milk", now);
        failed.fail("boom", now + chrono::Duration::seconds(9));

        let report = build_report([ok, failed].iter(), now, limits());
        assert_eq!(report.total_searches, 2);
        assert_eq!(report.successful_searches, 1);
        assert_eq!(report.error_rate, 0.5);
        assert_eq!(report.average_latency, Duration::from_millis(100));
        assert_eq!(report.slow_search_count, 0);
        assert!(!report.recommendations.is_empty());
    }

    #[test]
    fn test_empty_report() {
        let report = build_report(std::iter::empty(), Utc::now(), limits());
        assert_eq!(report.total_searches, 0);
        assert_eq!(report.cache_hit_rate, 0.0);
        assert_eq!(report.error_rate, 0.0);
        assert_eq!(report.latency_distribution, LatencyDistribution::default());
        assert!(report.recommendations.is_empty());
    }
}

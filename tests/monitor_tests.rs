//! Integration tests for the search performance monitor
//!
//! These tests drive the monitor the way the search code does:
//! - Session lifecycle and no-result alerts
//! - Report windows, percentiles and slow-search ranking
//! - Monitoring searches served through the tiered cache

mod common;

use catalog_search_cache::monitor::percentile;
use catalog_search_cache::{ManualClock, MonitorConfig, PerformanceMonitor};
use common::{config_in, init_tracing, open_cache, sample_result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn monitor_with_clock() -> (PerformanceMonitor, Arc<ManualClock>) {
    init_tracing();
    let clock = Arc::new(ManualClock::starting_now());
    let monitor = PerformanceMonitor::new(MonitorConfig::default(), clock.clone());
    (monitor, clock)
}

#[tokio::test]
async fn test_no_result_search_is_reported() {
    let (monitor, _) = monitor_with_clock();

    monitor.start_search("s1", "tomato sauce").await;
    monitor
        .record_search_complete("s1", 0, Duration::from_millis(50))
        .await;

    let report = monitor.generate_report().await;
    assert_eq!(report.total_searches, 1);
    assert_eq!(report.no_results_count, 1);

    let completed = monitor.completed_searches().await;
    let session = completed.iter().find(|s| s.id == "s1").unwrap();
    assert!(session.is_complete);
    assert_eq!(session.result_count, 0);
    assert_eq!(monitor.metrics().await.no_results, 1);
}

#[test]
fn test_percentile_of_five_latencies() {
    let sorted: Vec<Duration> = [10, 20, 30, 40, 50]
        .iter()
        .map(|ms| Duration::from_millis(*ms))
        .collect();
    assert_eq!(percentile(&sorted, 50), Duration::from_millis(30));
}

#[tokio::test]
async fn test_report_distribution_and_slowest() {
    let (monitor, clock) = monitor_with_clock();

    let latencies = [120, 80, 2_500, 40, 3_200, 60, 90, 2_100, 70, 100];
    for (i, ms) in latencies.iter().enumerate() {
        let id = format!("s{}", i);
        monitor.start_search(&id, "Whole Milk").await;
        if i % 2 == 0 {
            monitor.record_cache_hit(&id).await;
        }
        monitor
            .record_search_complete(&id, 5, Duration::from_millis(*ms))
            .await;
        clock.advance(Duration::from_secs(1));
    }

    let report = monitor.generate_report().await;
    assert_eq!(report.total_searches, 10);
    assert_eq!(report.cache_hit_rate, 0.5);

    // sorted: 40 60 70 80 90 100 120 2100 2500 3200
    assert_eq!(report.latency_distribution.p50, Duration::from_millis(90));
    assert_eq!(report.latency_distribution.p90, Duration::from_millis(2_500));
    assert_eq!(report.latency_distribution.p99, Duration::from_millis(2_500));

    let slowest: Vec<Duration> = report.slowest_searches.iter().map(|s| s.duration).collect();
    assert_eq!(
        slowest,
        vec![
            Duration::from_millis(3_200),
            Duration::from_millis(2_500),
            Duration::from_millis(2_100)
        ]
    );
    assert_eq!(report.slow_search_count, 3);
    assert_eq!(monitor.metrics().await.slow_searches, 3);

    assert_eq!(report.top_queries.len(), 1);
    assert_eq!(report.top_queries[0].query, "whole milk");
    assert_eq!(report.top_queries[0].count, 10);
}

#[tokio::test]
async fn test_top_queries_are_capped_and_ranked() {
    let (monitor, _) = monitor_with_clock();

    for i in 0..12 {
        for _ in 0..=i {
            let id = monitor.begin_search(&format!("query {}", i)).await;
            monitor
                .record_search_complete(&id, 1, Duration::from_millis(10))
                .await;
        }
    }

    let report = monitor.generate_report().await;
    assert_eq!(report.top_queries.len(), 10);
    assert_eq!(report.top_queries[0].query, "query 11");
    assert_eq!(report.top_queries[0].count, 12);
    assert_eq!(report.top_queries[9].query, "query 2");
}

#[tokio::test]
async fn test_monitoring_cached_searches() {
    let tmp = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::starting_now());
    let cache = open_cache(config_in(&tmp), clock.clone()).await;
    let monitor = PerformanceMonitor::new(MonitorConfig::default(), clock);

    for query in ["pasta", "pasta", "rice", "pasta"] {
        let id = monitor.begin_search(query).await;
        let started = Instant::now();

        let result = match cache.lookup(query).await {
            Some(hit) => {
                monitor.record_cache_hit(&id).await;
                hit
            }
            None => {
                let fresh = sample_result(query);
                cache.store(query, fresh.clone()).await;
                fresh
            }
        };

        monitor
            .record_search_complete(&id, result.len(), started.elapsed())
            .await;
    }

    let metrics = monitor.metrics().await;
    let stats = cache.statistics().await;
    assert_eq!(metrics.cache_hits, stats.total_hits());
    assert_eq!(metrics.cache_misses, stats.misses);
    assert_eq!(metrics.cache_hits, 2);
    assert_eq!(monitor.generate_report().await.cache_hit_rate, 0.5);
}

//! Per-search session records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Rough shape of a query, derived from its text alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryComplexity {
    Simple,
    Medium,
    Complex,
}

impl QueryComplexity {
    /// Classify a query
    ///
    /// More than 5 tokens, or any character that is neither alphanumeric nor
    /// whitespace, is `Complex`; more than 2 tokens is `Medium`; anything else
    /// is `Simple`.
    pub fn classify(query: &str) -> Self {
        let tokens = query.split_whitespace().count();
        let has_symbols = query
            .chars()
            .any(|c| !c.is_alphanumeric() && !c.is_whitespace());

        if tokens > 5 || has_symbols {
            QueryComplexity::Complex
        } else if tokens > 2 {
            QueryComplexity::Medium
        } else {
            QueryComplexity::Simple
        }
    }
}

impl fmt::Display for QueryComplexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryComplexity::Simple => write!(f, "simple"),
            QueryComplexity::Medium => write!(f, "medium"),
            QueryComplexity::Complex => write!(f, "complex"),
        }
    }
}

/// One search from `start_search` until it completes or fails
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSession {
    pub id: String,
    pub query: String,
    pub start_time: DateTime<Utc>,
    /// Query length in characters
    pub query_length: usize,
    pub query_complexity: QueryComplexity,
    pub end_time: Option<DateTime<Utc>>,
    pub result_count: usize,
    pub total_duration: Duration,
    pub cache_hit: bool,
    /// When the cache hit was reported
    pub cache_hit_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub is_complete: bool,
}

impl SearchSession {
    pub fn new(id: impl Into<String>, query: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        let query = query.into();
        Self {
            id: id.into(),
            query_length: query.chars().count(),
            query_complexity: QueryComplexity::classify(&query),
            query,
            start_time,
            end_time: None,
            result_count: 0,
            total_duration: Duration::ZERO,
            cache_hit: false,
            cache_hit_at: None,
            error: None,
            is_complete: false,
        }
    }

    pub fn mark_cache_hit(&mut self, at: DateTime<Utc>) {
        self.cache_hit = true;
        self.cache_hit_at = Some(at);
    }

    pub fn complete(&mut self, result_count: usize, duration: Duration, at: DateTime<Utc>) {
        self.result_count = result_count;
        self.total_duration = duration;
        self.end_time = Some(at);
        self.is_complete = true;
    }

    /// Finish with an error; the elapsed wall time is kept for reference only
    pub fn fail(&mut self, error: impl Into<String>, at: DateTime<Utc>) {
        self.error = Some(error.into());
        self.total_duration = (at - self.start_time)
            .to_std()
            .unwrap_or(Duration::ZERO);
        self.end_time = Some(at);
        self.is_complete = true;
    }

    /// Completed without error
    pub fn succeeded(&self) -> bool {
        self.is_complete && self.error.is_none()
    }
}

//! Cache entry value object with TTL support

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Smallest lifetime an entry can be given, keeps `expires_at > created_at`
fn min_ttl() -> chrono::Duration {
    chrono::Duration::milliseconds(1)
}

/// A cached value with its creation and expiry timestamps
///
/// Entries are never mutated after creation; re-storing a key replaces the
/// entry wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// The cached value
    pub value: T,

    /// When the entry was created
    pub created_at: DateTime<Utc>,

    /// When the entry expires
    pub expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    /// Create an entry created at `now` that lives for `ttl`
    pub fn new(value: T, now: DateTime<Utc>, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl)
            .unwrap_or(chrono::Duration::seconds(3600))
            .max(min_ttl());

        Self {
            value,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Create an entry with explicit timestamps
    ///
    /// An `expires_at` not after `created_at` is pushed to the minimum lifetime.
    pub fn with_expiration(value: T, created_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value,
            created_at,
            expires_at: expires_at.max(created_at + min_ttl()),
        }
    }

    /// An entry is expired iff `now >= expires_at`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Time left before expiration, `None` once expired
    pub fn time_until_expiration(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.is_expired_at(now) {
            None
        } else {
            (self.expires_at - now).to_std().ok()
        }
    }

    /// Age of the entry at `now`
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at)
            .to_std()
            .unwrap_or(Duration::from_secs(0))
    }

    /// Total lifetime the entry was stamped with
    pub fn ttl(&self) -> Duration {
        (self.expires_at - self.created_at)
            .to_std()
            .unwrap_or(Duration::from_secs(0))
    }
}

impl<T: Clone> CacheEntry<T> {
    /// Copy of this entry whose expiry does not extend past `now + ttl`.
    ///
    /// Used when promoting into a tier with a shorter lifetime. The creation
    /// time is kept so capacity eviction still orders by original insertion.
    pub fn capped(&self, now: DateTime<Utc>, ttl: Duration) -> Self {
        let limit = now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
        Self::with_expiration(self.value.clone(), self.created_at, self.expires_at.min(limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_entry_creation() {
        let now = Utc::now();
        let entry = CacheEntry::new("value".to_string(), now, Duration::from_secs(300));

        assert_eq!(entry.value, "value");
        assert_eq!(entry.created_at, now);
        assert_eq!(entry.expires_at, now + chrono::Duration::seconds(300));
        assert!(entry.expires_at > entry.created_at);
        assert_eq!(entry.ttl(), Duration::from_secs(300));
    }

    #[test]
    fn test_entry_expiration_boundary() {
        let now = Utc::now();
        let entry = CacheEntry::new(1u32, now, Duration::from_secs(10));

        assert!(!entry.is_expired_at(now + chrono::Duration::milliseconds(9_999)));
        assert!(entry.is_expired_at(now + chrono::Duration::seconds(10)));
        assert!(entry.is_expired_at(now + chrono::Duration::seconds(11)));
    }

    #[test]
    fn test_zero_ttl_keeps_invariant() {
        let now = Utc::now();
        let entry = CacheEntry::new((), now, Duration::ZERO);
        assert!(entry.expires_at > entry.created_at);

        let backwards = CacheEntry::with_expiration((), now, now - chrono::Duration::seconds(5));
        assert!(backwards.expires_at > backwards.created_at);
    }

    #[test]
    fn test_time_until_expiration() {
        let now = Utc::now();
        let entry = CacheEntry::new(0u8, now, Duration::from_secs(60));

        let left = entry.time_until_expiration(now + chrono::Duration::seconds(20));
        assert_eq!(left, Some(Duration::from_secs(40)));
        assert!(entry
            .time_until_expiration(now + chrono::Duration::seconds(60))
            .is_none());
    }

    #[test]
    fn test_age() {
        let now = Utc::now();
        let entry = CacheEntry::new(0u8, now, Duration::from_secs(60));
        assert_eq!(entry.age(now + chrono::Duration::seconds(5)), Duration::from_secs(5));
        assert_eq!(entry.age(now - chrono::Duration::seconds(5)), Duration::ZERO);
    }

    #[test]
    fn test_capped_only_shortens() {
        let now = Utc::now();
        let entry = CacheEntry::new(7u32, now, Duration::from_secs(3600));

        let capped = entry.capped(now, Duration::from_secs(300));
        assert_eq!(capped.created_at, entry.created_at);
        assert_eq!(capped.expires_at, now + chrono::Duration::seconds(300));

        let untouched = entry.capped(now, Duration::from_secs(7200));
        assert_eq!(untouched.expires_at, entry.expires_at);
    }
}

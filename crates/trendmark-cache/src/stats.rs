//! Cache statistics

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, updated without locking
#[derive(Debug, Default)]
pub struct CacheStats {
    pub(crate) hits: AtomicU64,
    pub(crate) stale_hits: AtomicU64,
    pub(crate) misses: AtomicU64,
    pub(crate) fills: AtomicU64,
    pub(crate) joined: AtomicU64,
    pub(crate) failures: AtomicU64,
    pub(crate) timeouts: AtomicU64,
    pub(crate) evictions: AtomicU64,
}

impl CacheStats {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            stale_hits: self.stale_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fills: self.fills.load(Ordering::Relaxed),
            joined: self.joined.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Serializable view of [`CacheStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatsSnapshot {
    /// Fresh lookups
    pub hits: u64,
    /// Expired artifacts served within the grace window
    pub stale_hits: u64,
    /// Lookups that found nothing servable
    pub misses: u64,
    /// Fills started
    pub fills: u64,
    /// Callers that attached to a fill already in flight
    pub joined: u64,
    /// Fills that ended in an error
    pub failures: u64,
    /// Fills that ran past their deadline
    pub timeouts: u64,
    /// Artifacts evicted for capacity
    pub evictions: u64,
}

impl CacheStatsSnapshot {
    /// Fraction of lookups served from cache (fresh or stale)
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.stale_hits;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        format!(
            "hits={} stale={} misses={} fills={} joined={} failures={} timeouts={} evictions={} hit_rate={:.1}%",
            self.hits,
            self.stale_hits,
            self.misses,
            self.fills,
            self.joined,
            self.failures,
            self.timeouts,
            self.evictions,
            self.hit_rate() * 100.0
        )
    }
}

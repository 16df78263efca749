//! Cache counters.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Running counters of one [`EvictionCache`](super::EvictionCache).
///
/// Counters are independent of each other, so every access is `Relaxed`.
/// Read them together through [`snapshot`](Self::snapshot).
///
/// # Example
/// ```
/// use emberdb::buffer::CacheStats;
///
/// let stats = CacheStats::new();
/// stats.record_miss();
/// stats.record_load();
/// stats.record_hit();
/// assert_eq!(stats.snapshot().hit_rate(), 0.5);
/// ```
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// A lookup found the entry resident.
    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// A lookup had to go to the backend.
    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// A backend load succeeded.
    #[inline]
    pub fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    /// An entry left the cache, to make room or on close.
    #[inline]
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Counter values at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub loads: u64,
    pub evictions: u64,
}

impl StatsSnapshot {
    /// Share of lookups served from memory, 0.0 when there were none.
    pub fn hit_rate(&self) -> f64 {
        match self.hits + self.misses {
            0 => 0.0,
            total => self.hits as f64 / total as f64,
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} hits / {} misses ({:.1}% hit rate), {} loads, {} evictions",
            self.hits,
            self.misses,
            self.hit_rate() * 100.0,
            self.loads,
            self.evictions
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stats() {
        let snapshot = CacheStats::new().snapshot();
        assert_eq!(snapshot, StatsSnapshot::default());
        assert_eq!(snapshot.hit_rate(), 0.0);
    }

    #[test]
    fn test_counters() {
        let stats = CacheStats::new();
        for _ in 0..7 {
            stats.record_hit();
        }
        for _ in 0..3 {
            stats.record_miss();
            stats.record_load();
        }
        stats.record_eviction();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.hits, 7);
        assert_eq!(snapshot.misses, 3);
        assert_eq!(snapshot.loads, 3);
        assert_eq!(snapshot.evictions, 1);
        assert_eq!(snapshot.hit_rate(), 0.7);
    }

    #[test]
    fn test_display() {
        let snapshot = StatsSnapshot {
            hits: 80,
            misses: 20,
            loads: 20,
            evictions: 4,
        };
        assert_eq!(
            snapshot.to_string(),
            "80 hits / 20 misses (80.0% hit rate), 20 loads, 4 evictions"
        );
    }
}

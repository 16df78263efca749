//! Reference-counted eviction cache shared by the page store and the data
//! item layer.
//!
//! The cache maps `u64` keys to values produced by a [`CacheBackend`]. Each
//! `get` takes a reference that must be returned with `release`; only
//! unreferenced entries can be evicted. At most one backend load runs per
//! key: concurrent requests for a key that is being loaded wait for it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::buffer::replacer::TwoSegmentReplacer;
use crate::buffer::CacheStats;
use crate::common::config::{PROMOTION_AGE, YOUNG_SEGMENT_PERCENT};
use crate::common::{Error, Result};

/// How long a request sleeps before re-checking a key another thread loads.
const LOAD_POLL: Duration = Duration::from_millis(1);

/// Source and sink of cached values.
///
/// `evict` runs while the cache lock is held, so it must not call back into
/// the same cache.
pub trait CacheBackend<T>: Send + Sync {
    /// Produce the value for `key` on a miss.
    fn load(&self, key: u64) -> Result<T>;

    /// Write back `value` when it leaves the cache.
    fn evict(&self, key: u64, value: &T) -> Result<()>;
}

struct Entry<T> {
    value: Arc<T>,
    refs: usize,
}

struct CacheState<T> {
    entries: HashMap<u64, Entry<T>>,
    /// Keys whose backend load is in flight.
    loading: HashSet<u64>,
    replacer: TwoSegmentReplacer,
}

/// Bounded cache with a young/old replacement policy.
///
/// # Architecture
/// ```text
/// ┌───────────────────────────────────────────────────────┐
/// │                   EvictionCache<T, B>                 │
/// │  ┌──────────────────────────── Mutex ──────────────┐  │
/// │  │ entries: key → (Arc<T>, refs)                   │  │
/// │  │ loading: keys being loaded                      │  │
/// │  │ replacer: young ◀── new keys   old ◀── hot keys │  │
/// │  └─────────────────────────────────────────────────┘  │
/// │  ┌──────────────┐  ┌──────────────┐                   │
/// │  │   backend    │  │    stats     │                   │
/// │  │ load / evict │  │   atomics    │                   │
/// │  └──────────────┘  └──────────────┘                   │
/// └───────────────────────────────────────────────────────┘
/// ```
///
/// Resident plus loading entries never exceed `capacity`. Unreferenced
/// entries stay resident until pressure or [`close`](Self::close) pushes
/// them out through [`CacheBackend::evict`].
pub struct EvictionCache<T, B> {
    state: Mutex<CacheState<T>>,
    backend: B,
    capacity: usize,
    young_quota: usize,
    stats: CacheStats,
}

impl<T, B: CacheBackend<T>> EvictionCache<T, B> {
    /// Create a cache holding at most `capacity` entries.
    ///
    /// # Panics
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize, backend: B) -> Self {
        assert!(capacity > 0, "capacity must be > 0");

        let young_quota = (capacity * YOUNG_SEGMENT_PERCENT / 100).max(1);
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                loading: HashSet::new(),
                replacer: TwoSegmentReplacer::new(PROMOTION_AGE),
            }),
            backend,
            capacity,
            young_quota,
            stats: CacheStats::new(),
        }
    }

    /// Take a reference to the value for `key`, loading it on a miss.
    ///
    /// # Errors
    /// - `Error::CacheFull` if every resident entry is referenced
    /// - whatever the backend's `load` or `evict` returns
    pub fn get(&self, key: u64) -> Result<Arc<T>> {
        loop {
            let mut guard = self.state.lock();
            let state = &mut *guard;

            if let Some(entry) = state.entries.get_mut(&key) {
                entry.refs += 1;
                state.replacer.record_access(key);
                state.replacer.set_evictable(key, false);
                self.stats.record_hit();
                return Ok(Arc::clone(&entry.value));
            }

            if state.loading.contains(&key) {
                drop(guard);
                thread::sleep(LOAD_POLL);
                continue;
            }

            self.make_room(state)?;
            state.loading.insert(key);
            break;
        }

        self.stats.record_miss();

        let loaded = self.backend.load(key);
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.loading.remove(&key);

        let value = Arc::new(loaded?);
        state.entries.insert(
            key,
            Entry {
                value: Arc::clone(&value),
                refs: 1,
            },
        );
        state.replacer.record_access(key);
        self.stats.record_load();
        Ok(value)
    }

    /// Return a reference taken by [`get`](Self::get).
    ///
    /// The entry stays resident; once unreferenced it becomes evictable.
    pub fn release(&self, key: u64) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some(entry) = state.entries.get_mut(&key) else {
            return;
        };
        debug_assert!(entry.refs > 0, "release of unreferenced key {key}");
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs == 0 {
            state.replacer.set_evictable(key, true);
        }
    }

    /// Evict every resident entry, referenced or not.
    ///
    /// Every entry is evicted even if one fails; the first error is returned.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let mut first_error = None;
        for key in state.replacer.keys() {
            state.replacer.remove(key);
            if let Some(entry) = state.entries.remove(&key) {
                self.stats.record_eviction();
                if let Err(e) = self.backend.evict(key, &entry.value) {
                    first_error.get_or_insert(e);
                }
            }
        }
        tracing::debug!(stats = %self.stats.snapshot(), "cache closed");

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Whether `key` is currently resident.
    pub fn contains(&self, key: u64) -> bool {
        self.state.lock().entries.contains_key(&key)
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of resident plus loading entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    // ========================================================================
    // Internal: eviction
    // ========================================================================

    /// Free space for one more entry, called with the lock held.
    fn make_room(&self, state: &mut CacheState<T>) -> Result<()> {
        while state.replacer.young_len() >= self.young_quota {
            let Some(victim) = state.replacer.evict_young() else {
                break;
            };
            self.evict_entry(state, victim)?;
        }

        if state.entries.len() + state.loading.len() >= self.capacity {
            let Some(victim) = state.replacer.evict() else {
                return Err(Error::CacheFull);
            };
            self.evict_entry(state, victim)?;
        }
        Ok(())
    }

    fn evict_entry(&self, state: &mut CacheState<T>, key: u64) -> Result<()> {
        let Some(entry) = state.entries.remove(&key) else {
            return Ok(());
        };
        self.stats.record_eviction();
        tracing::trace!(key, "evicting cache entry");
        self.backend.evict(key, &entry.value)
    }
}

//! Two-segment (young/old) replacement policy.
//!
//! New keys enter the young segment. Every further access to a young key
//! bumps its age; once the age exceeds the promotion threshold the key moves
//! to the old segment. Both segments are ordered by recency, and victims are
//! taken from the least recently used end, young segment first, so a burst
//! of one-off loads cannot flush the frequently used keys.

use std::collections::{BTreeMap, HashMap};

/// Which segment a key currently lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Young,
    Old,
}

#[derive(Debug)]
struct Node {
    segment: Segment,
    /// Recency stamp; larger is more recent.
    tick: u64,
    age: u32,
    evictable: bool,
}

/// Recency bookkeeping for an [`EvictionCache`](crate::buffer::EvictionCache).
///
/// The replacer only tracks keys; the cache owns the values.
pub struct TwoSegmentReplacer {
    nodes: HashMap<u64, Node>,
    /// tick -> key, least recent first.
    young: BTreeMap<u64, u64>,
    old: BTreeMap<u64, u64>,
    clock: u64,
    promotion_age: u32,
    evictable: usize,
}

impl TwoSegmentReplacer {
    /// Create a replacer that promotes keys whose age exceeds `promotion_age`.
    pub fn new(promotion_age: u32) -> Self {
        Self {
            nodes: HashMap::new(),
            young: BTreeMap::new(),
            old: BTreeMap::new(),
            clock: 0,
            promotion_age,
            evictable: 0,
        }
    }

    /// Record that `key` was accessed.
    ///
    /// Unknown keys enter the head of the young segment (not evictable).
    /// Known keys move to the head of their segment; young keys age and may
    /// be promoted.
    pub fn record_access(&mut self, key: u64) {
        self.clock += 1;
        let tick = self.clock;

        let Some(node) = self.nodes.get_mut(&key) else {
            self.young.insert(tick, key);
            self.nodes.insert(
                key,
                Node {
                    segment: Segment::Young,
                    tick,
                    age: 1,
                    evictable: false,
                },
            );
            return;
        };

        match node.segment {
            Segment::Young => {
                self.young.remove(&node.tick);
                node.age += 1;
                if node.age > self.promotion_age {
                    node.segment = Segment::Old;
                    self.old.insert(tick, key);
                } else {
                    self.young.insert(tick, key);
                }
            }
            Segment::Old => {
                self.old.remove(&node.tick);
                self.old.insert(tick, key);
            }
        }
        node.tick = tick;
    }

    /// Mark a key as evictable (no outstanding references) or not.
    pub fn set_evictable(&mut self, key: u64, evictable: bool) {
        if let Some(node) = self.nodes.get_mut(&key) {
            if node.evictable != evictable {
                node.evictable = evictable;
                if evictable {
                    self.evictable += 1;
                } else {
                    self.evictable -= 1;
                }
            }
        }
    }

    /// Pick and forget the least recent evictable key of the young segment.
    pub fn evict_young(&mut self) -> Option<u64> {
        let victim = Self::first_evictable(&self.young, &self.nodes)?;
        self.remove(victim);
        Some(victim)
    }

    /// Pick and forget a victim, trying the young segment before the old.
    pub fn evict(&mut self) -> Option<u64> {
        if let Some(victim) = self.evict_young() {
            return Some(victim);
        }
        let victim = Self::first_evictable(&self.old, &self.nodes)?;
        self.remove(victim);
        Some(victim)
    }

    /// Remove a key from the replacer entirely.
    pub fn remove(&mut self, key: u64) {
        if let Some(node) = self.nodes.remove(&key) {
            match node.segment {
                Segment::Young => self.young.remove(&node.tick),
                Segment::Old => self.old.remove(&node.tick),
            };
            if node.evictable {
                self.evictable -= 1;
            }
        }
    }

    /// Segment of a tracked key.
    pub fn segment_of(&self, key: u64) -> Option<Segment> {
        self.nodes.get(&key).map(|n| n.segment)
    }

    /// Every tracked key, young segment first, least recent first.
    pub fn keys(&self) -> Vec<u64> {
        self.young.values().chain(self.old.values()).copied().collect()
    }

    /// Number of keys in the young segment.
    pub fn young_len(&self) -> usize {
        self.young.len()
    }

    /// Number of keys in the old segment.
    pub fn old_len(&self) -> usize {
        self.old.len()
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of evictable keys.
    pub fn size(&self) -> usize {
        self.evictable
    }

    fn first_evictable(segment: &BTreeMap<u64, u64>, nodes: &HashMap<u64, Node>) -> Option<u64> {
        segment
            .values()
            .copied()
            .find(|key| nodes.get(key).is_some_and(|n| n.evictable))
    }
}

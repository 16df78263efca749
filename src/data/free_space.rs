//! Free-space index.
//!
//! Pages are filed into buckets of `PAGE_SIZE / 40` bytes by how much room
//! they have left. A request is served from the first non-empty bucket
//! strictly above its own, so the page handed out can hold it (up to the
//! top bucket, which callers re-check). Selected pages leave the index until
//! the caller adds them back.
//!
//! The index lives only in memory; it is rebuilt from the pages at open.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::common::config::{FREE_SPACE_INTERVALS, PAGE_SIZE};
use crate::common::PageId;

const THRESHOLD: usize = PAGE_SIZE / FREE_SPACE_INTERVALS;

/// A page and the free bytes it had when it was added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    pub page_id: PageId,
    pub free_space: usize,
}

pub struct FreeSpaceIndex {
    buckets: Mutex<Vec<VecDeque<PageInfo>>>,
}

impl FreeSpaceIndex {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(vec![VecDeque::new(); FREE_SPACE_INTERVALS + 1]),
        }
    }

    /// File `page_id` under its free space.
    pub fn add(&self, page_id: PageId, free_space: usize) {
        let bucket = (free_space / THRESHOLD).min(FREE_SPACE_INTERVALS);
        self.buckets.lock()[bucket].push_back(PageInfo {
            page_id,
            free_space,
        });
    }

    /// Take a page with room for `need` bytes out of the index.
    pub fn select(&self, need: usize) -> Option<PageInfo> {
        let mut bucket = need / THRESHOLD;
        if bucket < FREE_SPACE_INTERVALS {
            bucket += 1;
        }

        let mut buckets = self.buckets.lock();
        buckets
            .iter_mut()
            .skip(bucket)
            .find_map(|pages| pages.pop_front())
    }

    /// Number of pages currently in the index.
    pub fn len(&self) -> usize {
        self.buckets.lock().iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FreeSpaceIndex {
    fn default() -> Self {
        Self::new()
    }
}

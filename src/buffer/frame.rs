//! Frame - a page held by the page store.
//!
//! The frame is the value type of the page cache: the cache counts
//! references to it, the frame itself only knows its page and whether that
//! page still has to be written back.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::PageId;
use crate::storage::page::Page;

/// A cached page plus its write-back flag.
///
/// Page contents sit behind a `RwLock`; the dirty flag is atomic so it can
/// be set while a read guard is out.
pub struct Frame {
    page_id: PageId,
    page: RwLock<Page>,
    dirty: AtomicBool,
}

impl Frame {
    pub fn new(page_id: PageId, page: Page) -> Self {
        Self {
            page_id,
            page: RwLock::new(page),
            dirty: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Shared view of the page.
    #[inline]
    pub fn page(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    /// Exclusive view of the page.
    ///
    /// Writers must follow up with [`mark_dirty`](Self::mark_dirty), or the
    /// change is lost when the frame leaves the cache.
    #[inline]
    pub fn page_mut(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write()
    }

    #[inline]
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Clear the flag before a write-back; true if there was anything to write.
    #[inline]
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_frame_is_clean() {
        let frame = Frame::new(PageId::new(3), Page::new());
        assert_eq!(frame.page_id(), PageId::new(3));
        assert!(!frame.is_dirty());
        assert!(!frame.take_dirty());
    }

    #[test]
    fn test_take_dirty_clears_once() {
        let frame = Frame::new(PageId::ONE, Page::new());
        frame.mark_dirty();
        frame.mark_dirty();

        assert!(frame.take_dirty());
        assert!(!frame.take_dirty());
    }

    #[test]
    fn test_dirty_under_read_guard() {
        let frame = Frame::new(PageId::ONE, Page::new());
        frame.page_mut().write_u16(0, 0x0102);

        let page = frame.page();
        frame.mark_dirty();
        assert_eq!(page.read_u16(0), 0x0102);
        assert!(frame.is_dirty());
    }
}

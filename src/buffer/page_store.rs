//! Page Store - the page caching layer.
//!
//! The [`PageStore`] provides:
//! - Page caching between the `.db` file and memory
//! - Reference counting through [`PageGuard`] or `acquire`/`release`
//! - Write-back of dirty pages on release and on eviction
//! - Immediate, durable page allocation

use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::{CacheBackend, CacheStats, EvictionCache, Frame, PageGuard};
use crate::common::{PageId, Result};
use crate::storage::page::Page;
use crate::storage::DiskManager;

/// Loads frames from disk and writes dirty ones back when they leave.
struct PageLoader {
    disk: Arc<Mutex<DiskManager>>,
}

impl PageLoader {
    fn flush(&self, frame: &Frame) -> Result<()> {
        let page = frame.page();
        if frame.take_dirty() {
            if let Err(e) = self.disk.lock().write_page(frame.page_id(), &page) {
                frame.mark_dirty();
                return Err(e);
            }
        }
        Ok(())
    }
}

impl CacheBackend<Frame> for PageLoader {
    fn load(&self, key: u64) -> Result<Frame> {
        let page_id = PageId::new(key as u32);
        let page = self.disk.lock().read_page(page_id)?;
        Ok(Frame::new(page_id, page))
    }

    fn evict(&self, _key: u64, frame: &Frame) -> Result<()> {
        self.flush(frame)
    }
}

/// Caches pages of one `.db` file.
///
/// # Architecture
/// ```text
/// ┌────────────────────────────────────────────────┐
/// │                   PageStore                    │
/// │  ┌──────────────────────────────────────────┐  │
/// │  │ EvictionCache<Frame, PageLoader>         │  │
/// │  │   pgno → Frame { RwLock<Page>, dirty }   │  │
/// │  └────────────────────┬─────────────────────┘  │
/// │              load / evict                      │
/// │  ┌────────────────────▼─────────────────────┐  │
/// │  │ Arc<Mutex<DiskManager>>                  │  │
/// │  └──────────────────────────────────────────┘  │
/// └────────────────────────────────────────────────┘
/// ```
///
/// # Usage
/// ```ignore
/// let store = PageStore::create("mydb.db", 64)?;
/// let page_id = store.new_page(&data_page::init_raw())?;
///
/// let guard = store.get_page(page_id)?;
/// guard.page_mut().write_u16(0, 100);
/// guard.mark_dirty();
/// // guard drops: page flushed and released
/// ```
pub struct PageStore {
    cache: EvictionCache<Frame, PageLoader>,
    disk: Arc<Mutex<DiskManager>>,
}

impl PageStore {
    /// Create a new, empty page file.
    pub fn create<P: AsRef<std::path::Path>>(path: P, capacity: usize) -> Result<Self> {
        Ok(Self::new(DiskManager::create(path)?, capacity))
    }

    /// Open an existing page file.
    pub fn open<P: AsRef<std::path::Path>>(path: P, capacity: usize) -> Result<Self> {
        Ok(Self::new(DiskManager::open(path)?, capacity))
    }

    /// Wrap a disk manager in a cache of `capacity` frames.
    pub fn new(disk_manager: DiskManager, capacity: usize) -> Self {
        let disk = Arc::new(Mutex::new(disk_manager));
        let loader = PageLoader {
            disk: Arc::clone(&disk),
        };
        Self {
            cache: EvictionCache::new(capacity, loader),
            disk,
        }
    }

    // ========================================================================
    // Public API: Allocate and fetch pages
    // ========================================================================

    /// Append a page with contents `initial` and return its number.
    ///
    /// The page is written and fsynced before this returns; it is not
    /// loaded into the cache.
    pub fn new_page(&self, initial: &Page) -> Result<PageId> {
        let page_id = self.disk.lock().append_page(initial)?;
        tracing::trace!(page = %page_id, "allocated page");
        Ok(page_id)
    }

    /// Fetch a page, returning a guard that releases it on drop.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page doesn't exist on disk
    /// - `Error::CacheFull` if every cached page is referenced
    pub fn get_page(&self, page_id: PageId) -> Result<PageGuard<'_>> {
        let frame = self.acquire(page_id)?;
        Ok(PageGuard::new(self, frame))
    }

    /// Fetch a page and take a reference the caller must [`release`](Self::release).
    pub fn acquire(&self, page_id: PageId) -> Result<Arc<Frame>> {
        self.cache.get(page_id.0 as u64)
    }

    /// Return a reference, writing the page back first if it is dirty.
    ///
    /// The reference is returned even if the write fails.
    pub fn release(&self, frame: &Frame) -> Result<()> {
        let flushed = self.flush(frame);
        self.cache.release(frame.page_id().0 as u64);
        flushed
    }

    // ========================================================================
    // Public API: Flush and maintenance
    // ========================================================================

    /// Write a page back if it is dirty.
    pub fn flush(&self, frame: &Frame) -> Result<()> {
        self.cache.backend().flush(frame)
    }

    /// Drop every page after `max_page`.
    ///
    /// Only used by recovery; pages past `max_page` must not be cached.
    pub fn truncate_to(&self, max_page: PageId) -> Result<()> {
        self.disk.lock().truncate_to(max_page)
    }

    /// Number of pages in the file.
    pub fn page_count(&self) -> u32 {
        self.disk.lock().page_count()
    }

    /// Write back and drop every cached page.
    pub fn close(&self) -> Result<()> {
        self.cache.close()
    }

    pub fn stats(&self) -> &CacheStats {
        self.cache.stats()
    }

    /// Number of frames the cache may hold.
    pub fn capacity(&self) -> usize {
        self.cache.capacity()
    }
}

//! Data Manager - the data item layer.
//!
//! Owns the page file, the log and the free-space index, and hands out
//! data items through a second [`EvictionCache`] keyed by uid.

use std::path::Path;
use std::sync::Arc;

use crate::buffer::{CacheBackend, CacheStats, EvictionCache, Frame, PageGuard, PageStore};
use crate::common::config::{
    file_path, DbOptions, DB_SUFFIX, INSERT_RETRIES, LOG_SUFFIX, MAX_FREE_SPACE,
};
use crate::common::{address_to_uid, uid_to_address, Error, PageId, Result, Uid};
use crate::concurrency::TransactionLedger;
use crate::data::{wrap_raw, DataItem, DataItemRef, FreeSpaceIndex};
use crate::recovery::{recover, LogRecord, Wal};
use crate::storage::page::{data_page, page_one};

/// Loads items by taking a reference on their page; eviction returns it.
struct ItemLoader {
    store: Arc<PageStore>,
}

impl CacheBackend<DataItem> for ItemLoader {
    fn load(&self, uid: u64) -> Result<DataItem> {
        let (page_id, offset) = uid_to_address(uid);
        let frame = self.store.acquire(page_id)?;
        DataItem::parse(uid, Arc::clone(&frame), offset).inspect_err(|_| {
            if let Err(e) = self.store.release(&frame) {
                tracing::error!(page = %page_id, error = %e, "failed to release page");
            }
        })
    }

    fn evict(&self, _uid: u64, item: &DataItem) -> Result<()> {
        self.store.release(item.frame())
    }
}

/// The data item layer.
///
/// # Usage
/// ```ignore
/// let dm = DataManager::create(prefix, &DbOptions::default())?;
/// let uid = dm.insert(xid, b"payload")?;
///
/// let item = dm.read(uid)?.expect("live item");
/// let mut writer = item.before();
/// writer.update(|data| data[0] = b'P');
/// writer.after(xid)?;
/// ```
pub struct DataManager {
    store: Arc<PageStore>,
    items: EvictionCache<DataItem, ItemLoader>,
    wal: Wal,
    free_space: FreeSpaceIndex,
    /// Page 1, referenced from open until close.
    page_one: Arc<Frame>,
}

impl DataManager {
    /// Create `<prefix>.db` (with page 1) and `<prefix>.log`.
    pub fn create<P: AsRef<Path>>(prefix: P, options: &DbOptions) -> Result<Self> {
        let prefix = prefix.as_ref();
        let store = Arc::new(PageStore::create(
            file_path(prefix, DB_SUFFIX),
            options.page_cache_capacity(),
        )?);
        let wal = Wal::create(file_path(prefix, LOG_SUFFIX))?;

        let page_id = store.new_page(&page_one::init_raw())?;
        debug_assert_eq!(page_id, PageId::ONE);
        let first_page = store.acquire(PageId::ONE)?;

        tracing::info!(prefix = %prefix.display(), "created data files");
        Ok(Self::assemble(store, wal, first_page, options))
    }

    /// Open existing files, recovering first if the last run did not close.
    pub fn open<P: AsRef<Path>>(
        prefix: P,
        options: &DbOptions,
        ledger: &TransactionLedger,
    ) -> Result<Self> {
        let prefix = prefix.as_ref();
        let store = Arc::new(PageStore::open(
            file_path(prefix, DB_SUFFIX),
            options.page_cache_capacity(),
        )?);
        let wal = Wal::open(file_path(prefix, LOG_SUFFIX))?;

        let first_page = store.acquire(PageId::ONE)?;
        if !page_one::check_vc(&first_page.page()) {
            tracing::warn!(prefix = %prefix.display(), "unclean shutdown detected");
            let report = recover(ledger, &wal, &store)?;
            tracing::info!(?report, "recovery complete");
        }

        page_one::set_vc_open(&mut first_page.page_mut());
        first_page.mark_dirty();
        store.flush(&first_page)?;

        let dm = Self::assemble(store, wal, first_page, options);
        dm.fill_free_space()?;
        tracing::info!(prefix = %prefix.display(), pages = dm.store.page_count(), "opened data files");
        Ok(dm)
    }

    fn assemble(
        store: Arc<PageStore>,
        wal: Wal,
        page_one: Arc<Frame>,
        options: &DbOptions,
    ) -> Self {
        let loader = ItemLoader {
            store: Arc::clone(&store),
        };
        Self {
            items: EvictionCache::new(options.item_cache_capacity(), loader),
            store,
            wal,
            free_space: FreeSpaceIndex::new(),
            page_one,
        }
    }

    fn fill_free_space(&self) -> Result<()> {
        for pgno in 2..=self.store.page_count() {
            let guard = self.store.get_page(PageId::new(pgno))?;
            let free = data_page::free_space(&guard.page());
            self.free_space.add(guard.page_id(), free);
        }
        Ok(())
    }

    // ========================================================================
    // Public API: Items
    // ========================================================================

    /// Store `payload` as a new data item on behalf of `xid`.
    ///
    /// The insert is logged before the page changes.
    ///
    /// # Errors
    /// - `Error::DataTooLarge` if the record cannot fit in one page
    /// - `Error::DatabaseBusy` if no page with room turned up
    pub fn insert(&self, xid: u64, payload: &[u8]) -> Result<Uid> {
        let raw = wrap_raw(payload);
        if raw.len() > MAX_FREE_SPACE {
            return Err(Error::DataTooLarge(raw.len()));
        }

        for _ in 0..INSERT_RETRIES {
            let Some(info) = self.free_space.select(raw.len()) else {
                let page_id = self.store.new_page(&data_page::init_raw())?;
                tracing::debug!(page = %page_id, "allocated data page");
                self.free_space.add(page_id, MAX_FREE_SPACE);
                continue;
            };

            let guard = match self.store.get_page(info.page_id) {
                Ok(guard) => guard,
                Err(e) => {
                    self.free_space.add(info.page_id, 0);
                    return Err(e);
                }
            };

            let free = data_page::free_space(&guard.page());
            if free < raw.len() {
                self.free_space.add(info.page_id, free);
                continue;
            }

            let inserted = self.insert_into(&guard, xid, &raw);
            let free = match inserted {
                Ok(_) => data_page::free_space(&guard.page()),
                Err(_) => 0,
            };
            self.free_space.add(info.page_id, free);
            return inserted;
        }

        Err(Error::DatabaseBusy)
    }

    fn insert_into(&self, guard: &PageGuard<'_>, xid: u64, raw: &[u8]) -> Result<Uid> {
        let mut page = guard.page_mut();
        let offset = data_page::fso(&page);
        self.wal
            .log(&LogRecord::encode_insert(xid, guard.page_id(), offset, raw))?;

        data_page::insert(&mut page, raw);
        guard.mark_dirty();
        Ok(address_to_uid(guard.page_id(), offset))
    }

    /// Fetch a live data item.
    ///
    /// `None` if the item was rolled back by recovery.
    pub fn read(&self, uid: Uid) -> Result<Option<DataItemRef<'_>>> {
        let item = self.items.get(uid)?;
        if !item.is_valid() {
            self.items.release(uid);
            return Ok(None);
        }
        Ok(Some(DataItemRef::new(self, item)))
    }

    pub(crate) fn release_item(&self, uid: Uid) {
        self.items.release(uid);
    }

    pub(crate) fn log_update(&self, xid: u64, uid: Uid, old_raw: &[u8], new_raw: &[u8]) -> Result<()> {
        self.wal
            .log(&LogRecord::encode_update(xid, uid, old_raw, new_raw))
    }

    // ========================================================================
    // Public API: Lifecycle and stats
    // ========================================================================

    /// Write everything back and mark the shutdown clean.
    ///
    /// Dropping a `DataManager` without calling this leaves the files as a
    /// crash would.
    pub fn close(&self) -> Result<()> {
        self.items.close()?;

        page_one::set_vc_close(&mut self.page_one.page_mut());
        self.page_one.mark_dirty();
        self.store.release(&self.page_one)?;

        self.store.close()?;
        tracing::info!(
            pages = %self.store.stats().snapshot(),
            items = %self.items.stats().snapshot(),
            "data files closed"
        );
        Ok(())
    }

    /// Number of pages in the page file.
    pub fn page_count(&self) -> u32 {
        self.store.page_count()
    }

    pub fn page_stats(&self) -> &CacheStats {
        self.store.stats()
    }

    pub fn item_stats(&self) -> &CacheStats {
        self.items.stats()
    }
}

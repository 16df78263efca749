//! Data items - variable-length records inside data pages.
//!
//! ```text
//! ┌───────────┬───────────┬──────────────────┐
//! │ valid (1B)│ size (2B) │ payload          │
//! └───────────┴───────────┴──────────────────┘
//! ```
//! `valid` is 0 for a live record and 1 for one rolled back by recovery.
//!
//! Mutation follows a before/after protocol: [`DataItemRef::before`] takes
//! the item's write lock and snapshots the raw bytes, the caller edits the
//! payload in place, and [`DataItemWriter::after`] logs an update record
//! carrying both images. Dropping the writer without `after` restores the
//! snapshot.

use std::ops::Deref;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::buffer::Frame;
use crate::common::{Error, Result, Uid};
use crate::data::DataManager;

const OFFSET_VALID: usize = 0;
const OFFSET_SIZE: usize = 1;
const OFFSET_DATA: usize = 3;

const VALID: u8 = 0;
const INVALID: u8 = 1;

/// Wrap a payload into a raw record.
pub fn wrap_raw(payload: &[u8]) -> Vec<u8> {
    let mut raw = Vec::with_capacity(OFFSET_DATA + payload.len());
    raw.push(VALID);
    raw.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    raw.extend_from_slice(payload);
    raw
}

/// Flag a raw record as rolled back.
pub fn mark_raw_invalid(raw: &mut [u8]) {
    raw[OFFSET_VALID] = INVALID;
}

/// A record resident in the item cache.
///
/// Holds a reference on its page for as long as it stays cached.
pub struct DataItem {
    uid: Uid,
    frame: Arc<Frame>,
    /// Start of the raw record within the page.
    offset: usize,
    /// Length of the raw record.
    len: usize,
    old_raw: Mutex<Vec<u8>>,
    lock: RwLock<()>,
}

impl DataItem {
    /// Parse the record at `offset` of a referenced page.
    pub(crate) fn parse(uid: Uid, frame: Arc<Frame>, offset: u16) -> Result<Self> {
        let offset = offset as usize;
        let len = {
            let page = frame.page();
            let bytes = page.as_slice();
            if offset + OFFSET_DATA > bytes.len() {
                return Err(Error::Corrupted(format!("item {uid:#x} starts past the page")));
            }
            let size = u16::from_le_bytes([bytes[offset + OFFSET_SIZE], bytes[offset + OFFSET_SIZE + 1]]);
            let len = OFFSET_DATA + size as usize;
            if offset + len > bytes.len() {
                return Err(Error::Corrupted(format!("item {uid:#x} runs past the page")));
            }
            len
        };

        Ok(Self {
            uid,
            frame,
            offset,
            len,
            old_raw: Mutex::new(Vec::with_capacity(len)),
            lock: RwLock::new(()),
        })
    }

    #[inline]
    pub fn uid(&self) -> Uid {
        self.uid
    }

    pub(crate) fn frame(&self) -> &Arc<Frame> {
        &self.frame
    }

    /// False once recovery has rolled the record back.
    pub fn is_valid(&self) -> bool {
        self.frame.page().as_slice()[self.offset + OFFSET_VALID] == VALID
    }

    /// Payload length in bytes.
    pub fn payload_len(&self) -> usize {
        self.len - OFFSET_DATA
    }

    /// Run `f` over the payload under the item's read lock.
    pub fn with_data<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let _shared = self.lock.read();
        let page = self.frame.page();
        f(&page.as_slice()[self.offset + OFFSET_DATA..self.offset + self.len])
    }

    /// Copy of the payload.
    pub fn data(&self) -> Vec<u8> {
        self.with_data(<[u8]>::to_vec)
    }

    /// Hold the item's read lock, excluding writers.
    pub fn read_lock(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read()
    }

    fn raw(&self) -> Vec<u8> {
        self.frame.page().as_slice()[self.offset..self.offset + self.len].to_vec()
    }
}

/// A referenced data item; the reference is returned on drop.
pub struct DataItemRef<'a> {
    dm: &'a DataManager,
    item: Arc<DataItem>,
}

impl<'a> DataItemRef<'a> {
    pub(crate) fn new(dm: &'a DataManager, item: Arc<DataItem>) -> Self {
        Self { dm, item }
    }

    /// Start a mutation: lock the item and snapshot its bytes.
    pub fn before(&self) -> DataItemWriter<'_> {
        let guard = self.item.lock.write();
        self.item.frame.mark_dirty();
        *self.item.old_raw.lock() = self.item.raw();
        DataItemWriter {
            dm: self.dm,
            item: &self.item,
            _guard: guard,
            done: false,
        }
    }
}

impl Deref for DataItemRef<'_> {
    type Target = DataItem;

    #[inline]
    fn deref(&self) -> &DataItem {
        &self.item
    }
}

impl Drop for DataItemRef<'_> {
    fn drop(&mut self) {
        self.dm.release_item(self.item.uid);
    }
}

/// Exclusive access to a data item between `before` and `after`.
pub struct DataItemWriter<'a> {
    dm: &'a DataManager,
    item: &'a DataItem,
    _guard: RwLockWriteGuard<'a, ()>,
    done: bool,
}

impl DataItemWriter<'_> {
    /// Edit the payload in place.
    pub fn update<R>(&mut self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let item = self.item;
        let mut page = item.frame.page_mut();
        f(&mut page.as_mut_slice()[item.offset + OFFSET_DATA..item.offset + item.len])
    }

    /// Current payload, including edits made so far.
    pub fn data(&self) -> Vec<u8> {
        let item = self.item;
        item.frame.page().as_slice()[item.offset + OFFSET_DATA..item.offset + item.len].to_vec()
    }

    /// Log the change on behalf of `xid` and release the write lock.
    ///
    /// If logging fails the edit is rolled back.
    pub fn after(mut self, xid: u64) -> Result<()> {
        let old_raw = self.item.old_raw.lock().clone();
        self.dm.log_update(xid, self.item.uid, &old_raw, &self.item.raw())?;
        self.done = true;
        Ok(())
    }
}

impl Drop for DataItemWriter<'_> {
    fn drop(&mut self) {
        if !self.done {
            let item = self.item;
            let old_raw = item.old_raw.lock();
            item.frame.page_mut().as_mut_slice()[item.offset..item.offset + item.len]
                .copy_from_slice(&old_raw);
        }
    }
}

//! Disk Manager - the `<path>.db` page file.
//!
//! Pages are numbered from 1 and stored back to back:
//! ```text
//! ┌─────────┬─────────┬─────────┬─────┬─────────┐
//! │ page 1  │ page 2  │ page 3  │ ... │ page N  │
//! └─────────┴─────────┴─────────┴─────┴─────────┘
//! 0         8192      16384           (N-1)×8192
//! ```
//! The file only grows by whole-page appends, and only shrinks when
//! recovery drops pages the log never mentions.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;

/// Synchronous page I/O on one file.
///
/// Not thread-safe on its own; the page store keeps it behind a `Mutex`.
/// Every write is fsynced before returning.
pub struct DiskManager {
    file: File,
    page_count: u32,
}

impl DiskManager {
    /// Create an empty page file.
    ///
    /// # Errors
    /// `Error::FileExists` if `path` is taken.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Err(Error::FileExists(path.to_path_buf()));
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        Ok(Self { file, page_count: 0 })
    }

    /// Open an existing page file.
    ///
    /// Bytes past the last whole page (a torn append) are not counted and
    /// get overwritten by the next append.
    ///
    /// # Errors
    /// `Error::FileNotFound` if there is no file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let page_count = (file.metadata()?.len() / PAGE_SIZE as u64) as u32;
        Ok(Self { file, page_count })
    }

    /// # Errors
    /// `Error::PageNotFound` past the end of the file.
    pub fn read_page(&mut self, page_id: PageId) -> Result<Page> {
        self.seek_existing(page_id)?;
        let mut page = Page::new();
        self.file.read_exact(page.as_mut_slice())?;
        Ok(page)
    }

    /// # Errors
    /// `Error::PageNotFound` past the end of the file; use
    /// [`append_page`](Self::append_page) to grow it.
    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        self.seek_existing(page_id)?;
        self.write_synced(page)
    }

    /// Add `initial` as page `page_count + 1`.
    pub fn append_page(&mut self, initial: &Page) -> Result<PageId> {
        let page_id = PageId::new(self.page_count + 1);
        self.file.seek(SeekFrom::Start(page_id.file_offset(PAGE_SIZE)))?;
        self.write_synced(initial)?;
        self.page_count = page_id.0;
        Ok(page_id)
    }

    /// Keep pages `1..=max_page`, dropping the rest.
    pub fn truncate_to(&mut self, max_page: PageId) -> Result<()> {
        let keep = max_page.0.min(self.page_count);
        self.file.set_len(keep as u64 * PAGE_SIZE as u64)?;
        self.file.sync_all()?;
        self.page_count = keep;
        Ok(())
    }

    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    fn seek_existing(&mut self, page_id: PageId) -> Result<()> {
        if !page_id.is_valid() || page_id.0 > self.page_count {
            return Err(Error::PageNotFound(page_id.0));
        }
        self.file.seek(SeekFrom::Start(page_id.file_offset(PAGE_SIZE)))?;
        Ok(())
    }

    fn write_synced(&mut self, page: &Page) -> Result<()> {
        self.file.write_all(page.as_slice())?;
        self.file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_create_and_open_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pages.db");

        assert!(matches!(DiskManager::open(&path), Err(Error::FileNotFound(_))));
        let dm = DiskManager::create(&path).unwrap();
        assert_eq!(dm.page_count(), 0);
        assert!(matches!(DiskManager::create(&path), Err(Error::FileExists(_))));
    }

    #[test]
    fn test_append_is_one_based() {
        let dir = tempdir().unwrap();
        let mut dm = DiskManager::create(dir.path().join("pages.db")).unwrap();

        assert_eq!(dm.append_page(&Page::from_bytes(&[7, 8, 9])).unwrap(), PageId::ONE);
        assert_eq!(dm.append_page(&Page::new()).unwrap(), PageId::new(2));

        let first = dm.read_page(PageId::ONE).unwrap();
        assert_eq!(&first.as_slice()[..4], &[7, 8, 9, 0]);
    }

    #[test]
    fn test_overwrite_and_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pages.db");
        {
            let mut dm = DiskManager::create(&path).unwrap();
            dm.append_page(&Page::new()).unwrap();
            dm.append_page(&Page::new()).unwrap();

            let mut page = Page::new();
            page.write_at(PAGE_SIZE - 2, &[0xAB, 0xCD]);
            dm.write_page(PageId::new(2), &page).unwrap();
        }

        let mut dm = DiskManager::open(&path).unwrap();
        assert_eq!(dm.page_count(), 2);
        let page = dm.read_page(PageId::new(2)).unwrap();
        assert_eq!(&page.as_slice()[PAGE_SIZE - 2..], &[0xAB, 0xCD]);
    }

    #[test]
    fn test_out_of_range() {
        let dir = tempdir().unwrap();
        let mut dm = DiskManager::create(dir.path().join("pages.db")).unwrap();

        assert!(matches!(dm.write_page(PageId::ONE, &Page::new()), Err(Error::PageNotFound(1))));
        dm.append_page(&Page::new()).unwrap();
        assert!(matches!(dm.read_page(PageId::new(2)), Err(Error::PageNotFound(2))));
        assert!(matches!(dm.read_page(PageId::INVALID), Err(Error::PageNotFound(0))));
    }

    #[test]
    fn test_truncate_then_append() {
        let dir = tempdir().unwrap();
        let mut dm = DiskManager::create(dir.path().join("pages.db")).unwrap();
        for i in 0..5u8 {
            dm.append_page(&Page::from_bytes(&[i])).unwrap();
        }

        dm.truncate_to(PageId::new(2)).unwrap();
        assert_eq!(dm.page_count(), 2);
        assert!(dm.read_page(PageId::new(3)).is_err());
        assert_eq!(dm.append_page(&Page::new()).unwrap(), PageId::new(3));

        // Truncating past the end is a no-op.
        dm.truncate_to(PageId::new(10)).unwrap();
        assert_eq!(dm.page_count(), 3);
    }

    #[test]
    fn test_torn_tail_is_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pages.db");
        {
            let mut dm = DiskManager::create(&path).unwrap();
            dm.append_page(&Page::from_bytes(&[1])).unwrap();
        }
        let mut bytes = fs::read(&path).unwrap();
        bytes.extend_from_slice(&[0xFF; 100]);
        fs::write(&path, bytes).unwrap();

        let mut dm = DiskManager::open(&path).unwrap();
        assert_eq!(dm.page_count(), 1);
        assert_eq!(dm.append_page(&Page::from_bytes(&[2])).unwrap(), PageId::new(2));
        assert_eq!(dm.read_page(PageId::new(2)).unwrap().as_slice()[0], 2);
    }
}

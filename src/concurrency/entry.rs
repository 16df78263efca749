//! Versioned records.
//!
//! An entry is the payload of a data item with two transaction stamps in
//! front:
//! ```text
//! ┌────────────┬────────────┬──────────────────┐
//! │ xmin (8B)  │ xmax (8B)  │ data             │
//! └────────────┴────────────┴──────────────────┘
//! ```
//! `xmin` created the version; `xmax` deleted it, 0 while it is live.

use crate::common::{Error, Result, Uid};
use crate::concurrency::Stamps;
use crate::data::{DataItemRef, DataManager};

const OFFSET_XMIN: usize = 0;
const OFFSET_XMAX: usize = 8;
const OFFSET_DATA: usize = 16;

/// Build the item payload for a new version created by `xid`.
pub fn wrap_entry_raw(xid: u64, data: &[u8]) -> Vec<u8> {
    let mut raw = Vec::with_capacity(OFFSET_DATA + data.len());
    raw.extend_from_slice(&xid.to_le_bytes());
    raw.extend_from_slice(&0u64.to_le_bytes());
    raw.extend_from_slice(data);
    raw
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

/// One version, borrowed from the item cache.
pub struct Entry<'a> {
    item: DataItemRef<'a>,
}

impl<'a> Entry<'a> {
    /// Load the entry stored at `uid`; `None` if recovery rolled it back.
    pub fn load(dm: &'a DataManager, uid: Uid) -> Result<Option<Self>> {
        let Some(item) = dm.read(uid)? else {
            return Ok(None);
        };
        if item.payload_len() < OFFSET_DATA {
            return Err(Error::Corrupted(format!(
                "entry {uid:#x} is {} bytes, shorter than its header",
                item.payload_len()
            )));
        }
        Ok(Some(Self { item }))
    }

    pub fn uid(&self) -> Uid {
        self.item.uid()
    }

    pub fn xmin(&self) -> u64 {
        self.item.with_data(|d| read_u64(d, OFFSET_XMIN))
    }

    pub fn xmax(&self) -> u64 {
        self.item.with_data(|d| read_u64(d, OFFSET_XMAX))
    }

    /// Both stamps, read under one lock.
    pub fn stamps(&self) -> Stamps {
        self.item.with_data(|d| Stamps {
            xmin: read_u64(d, OFFSET_XMIN),
            xmax: read_u64(d, OFFSET_XMAX),
        })
    }

    /// User data without the stamps.
    pub fn data(&self) -> Vec<u8> {
        self.item.with_data(|d| d[OFFSET_DATA..].to_vec())
    }

    /// Mark the version deleted by `xid`, logged under `xid`.
    pub fn set_xmax(&self, xid: u64) -> Result<()> {
        let mut writer = self.item.before();
        writer.update(|d| d[OFFSET_XMAX..OFFSET_DATA].copy_from_slice(&xid.to_le_bytes()));
        writer.after(xid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::DbOptions;
    use crate::concurrency::SUPER_XID;
    use tempfile::tempdir;

    #[test]
    fn test_wrap_layout() {
        let raw = wrap_entry_raw(7, b"xy");
        assert_eq!(raw.len(), 18);
        assert_eq!(read_u64(&raw, OFFSET_XMIN), 7);
        assert_eq!(read_u64(&raw, OFFSET_XMAX), 0);
        assert_eq!(&raw[16..], b"xy");
    }

    #[test]
    fn test_load_and_set_xmax() {
        let dir = tempdir().unwrap();
        let dm = DataManager::create(dir.path().join("entry"), &DbOptions::default()).unwrap();

        let uid = dm.insert(3, &wrap_entry_raw(3, b"row")).unwrap();
        let entry = Entry::load(&dm, uid).unwrap().unwrap();
        assert_eq!(entry.uid(), uid);
        assert_eq!(entry.xmin(), 3);
        assert_eq!(entry.xmax(), 0);
        assert_eq!(entry.data(), b"row");

        entry.set_xmax(4).unwrap();
        assert_eq!(entry.stamps(), Stamps { xmin: 3, xmax: 4 });
        assert_eq!(entry.xmax(), 4);
        assert_eq!(entry.xmin(), 3);
        assert_eq!(entry.data(), b"row");
    }

    #[test]
    fn test_short_item_is_corrupted() {
        let dir = tempdir().unwrap();
        let dm = DataManager::create(dir.path().join("entry"), &DbOptions::default()).unwrap();

        let uid = dm.insert(SUPER_XID, b"tiny").unwrap();
        assert!(matches!(Entry::load(&dm, uid), Err(Error::Corrupted(_))));
    }
}

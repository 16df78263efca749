//! Transaction ledger - the `<path>.xid` file.
//!
//! # File Layout
//! ```text
//! ┌───────────────┬──────────┬──────────┬─────┬──────────┐
//! │ counter (8B)  │ xid 1    │ xid 2    │ ... │ xid N    │
//! │               │ status 1B│ status 1B│     │ status 1B│
//! └───────────────┴──────────┴──────────┴─────┴──────────┘
//! ```
//! The counter is the last allocated xid, so a healthy file is exactly
//! `8 + counter` bytes long.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use parking_lot::Mutex;

use crate::common::{Error, Result};

/// The super transaction: always committed, never active.
pub const SUPER_XID: u64 = 0;

const HEADER_SIZE: u64 = 8;

/// Persisted status of one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum XidStatus {
    Active = 0,
    Committed = 1,
    Aborted = 2,
}

impl XidStatus {
    fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(XidStatus::Active),
            1 => Ok(XidStatus::Committed),
            2 => Ok(XidStatus::Aborted),
            other => Err(Error::BadLedgerFile(format!("unknown status byte {other}"))),
        }
    }
}

struct LedgerInner {
    file: File,
    counter: u64,
}

/// Durable xid allocator and status table.
pub struct TransactionLedger {
    inner: Mutex<LedgerInner>,
}

#[inline]
fn status_position(xid: u64) -> u64 {
    HEADER_SIZE + (xid - 1)
}

impl TransactionLedger {
    /// Create an empty ledger.
    ///
    /// # Errors
    /// `Error::FileExists` if the file is already there.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Err(Error::FileExists(path.to_path_buf()));
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        file.write_all(&0u64.to_le_bytes())?;
        file.sync_all()?;

        Ok(Self {
            inner: Mutex::new(LedgerInner { file, counter: 0 }),
        })
    }

    /// Open an existing ledger.
    ///
    /// # Errors
    /// - `Error::FileNotFound` if the file is missing
    /// - `Error::BadLedgerFile` if the length disagrees with the counter
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        let len = file.metadata()?.len();
        if len < HEADER_SIZE {
            return Err(Error::BadLedgerFile(format!("{len} bytes, no counter")));
        }
        let mut header = [0u8; 8];
        file.read_exact(&mut header)?;
        let counter = u64::from_le_bytes(header);

        if HEADER_SIZE.checked_add(counter) != Some(len) {
            return Err(Error::BadLedgerFile(format!(
                "counter {counter} but file holds {len} bytes"
            )));
        }

        Ok(Self {
            inner: Mutex::new(LedgerInner { file, counter }),
        })
    }

    /// Allocate the next xid and record it as active.
    ///
    /// Status and counter are durable when this returns.
    pub fn begin(&self) -> Result<u64> {
        let mut inner = self.inner.lock();
        let xid = inner.counter + 1;

        inner.file.seek(SeekFrom::Start(status_position(xid)))?;
        inner.file.write_all(&[XidStatus::Active as u8])?;
        inner.file.seek(SeekFrom::Start(0))?;
        inner.file.write_all(&xid.to_le_bytes())?;
        inner.file.sync_all()?;

        inner.counter = xid;
        Ok(xid)
    }

    pub fn commit(&self, xid: u64) -> Result<()> {
        self.set_status(xid, XidStatus::Committed)
    }

    pub fn abort(&self, xid: u64) -> Result<()> {
        self.set_status(xid, XidStatus::Aborted)
    }

    /// Status of `xid`. The super transaction is always committed.
    pub fn status(&self, xid: u64) -> Result<XidStatus> {
        if xid == SUPER_XID {
            return Ok(XidStatus::Committed);
        }
        let mut inner = self.inner.lock();
        Self::check_xid(&inner, xid)?;

        let mut byte = [0u8; 1];
        inner.file.seek(SeekFrom::Start(status_position(xid)))?;
        inner.file.read_exact(&mut byte)?;
        XidStatus::from_u8(byte[0])
    }

    pub fn is_active(&self, xid: u64) -> Result<bool> {
        Ok(self.status(xid)? == XidStatus::Active)
    }

    pub fn is_committed(&self, xid: u64) -> Result<bool> {
        Ok(self.status(xid)? == XidStatus::Committed)
    }

    pub fn is_aborted(&self, xid: u64) -> Result<bool> {
        Ok(self.status(xid)? == XidStatus::Aborted)
    }

    /// Last allocated xid.
    pub fn counter(&self) -> u64 {
        self.inner.lock().counter
    }

    fn set_status(&self, xid: u64, status: XidStatus) -> Result<()> {
        let mut inner = self.inner.lock();
        Self::check_xid(&inner, xid)?;

        inner.file.seek(SeekFrom::Start(status_position(xid)))?;
        inner.file.write_all(&[status as u8])?;
        inner.file.sync_all()?;
        Ok(())
    }

    fn check_xid(inner: &LedgerInner, xid: u64) -> Result<()> {
        if xid == SUPER_XID || xid > inner.counter {
            return Err(Error::UnknownTransaction(xid));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_begin_commit_abort() {
        let dir = tempdir().unwrap();
        let ledger = TransactionLedger::create(dir.path().join("t.xid")).unwrap();

        let a = ledger.begin().unwrap();
        let b = ledger.begin().unwrap();
        assert_eq!((a, b), (1, 2));
        assert!(ledger.is_active(a).unwrap());

        ledger.commit(a).unwrap();
        ledger.abort(b).unwrap();

        assert!(ledger.is_committed(a).unwrap());
        assert!(!ledger.is_active(a).unwrap());
        assert!(ledger.is_aborted(b).unwrap());
    }

    #[test]
    fn test_super_xid() {
        let dir = tempdir().unwrap();
        let ledger = TransactionLedger::create(dir.path().join("t.xid")).unwrap();

        assert!(ledger.is_committed(SUPER_XID).unwrap());
        assert!(!ledger.is_active(SUPER_XID).unwrap());
        assert!(!ledger.is_aborted(SUPER_XID).unwrap());
        assert!(matches!(
            ledger.commit(SUPER_XID),
            Err(Error::UnknownTransaction(0))
        ));
    }

    #[test]
    fn test_statuses_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.xid");
        {
            let ledger = TransactionLedger::create(&path).unwrap();
            let a = ledger.begin().unwrap();
            ledger.begin().unwrap();
            ledger.commit(a).unwrap();
        }

        let ledger = TransactionLedger::open(&path).unwrap();
        assert_eq!(ledger.counter(), 2);
        assert!(ledger.is_committed(1).unwrap());
        assert!(ledger.is_active(2).unwrap());
        assert_eq!(ledger.begin().unwrap(), 3);
        assert_eq!(fs::metadata(&path).unwrap().len(), 8 + 3);
    }

    #[test]
    fn test_length_mismatch_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.xid");
        {
            let ledger = TransactionLedger::create(&path).unwrap();
            ledger.begin().unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0]).unwrap();
        drop(file);

        let err = TransactionLedger::open(&path).err().unwrap();
        assert!(matches!(err, Error::BadLedgerFile(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_unknown_xid() {
        let dir = tempdir().unwrap();
        let ledger = TransactionLedger::create(dir.path().join("t.xid")).unwrap();
        assert!(matches!(ledger.status(5), Err(Error::UnknownTransaction(5))));
    }
}

//! Multi-version reads and writes on top of the data layer.
//!
//! Every record is an [`Entry`] whose stamps decide who may see it. Deletes
//! take an exclusive lock on the record first; a delete that loses a
//! conflict aborts its transaction, which then refuses further work with
//! the same error until the caller aborts it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::{ConflictKind, Error, Result, Uid};
use crate::concurrency::entry::{wrap_entry_raw, Entry};
use crate::concurrency::visibility::{is_version_skip, is_visible};
use crate::concurrency::{IsolationLevel, LockTable, Transaction, TransactionLedger};
use crate::data::DataManager;

/// Transaction front end: begin/commit/abort and versioned record access.
pub struct VersionManager {
    ledger: Arc<TransactionLedger>,
    dm: Arc<DataManager>,
    active: Mutex<HashMap<u64, Arc<Transaction>>>,
    lock_table: LockTable,
}

impl VersionManager {
    pub fn new(ledger: Arc<TransactionLedger>, dm: Arc<DataManager>) -> Self {
        Self {
            ledger,
            dm,
            active: Mutex::new(HashMap::new()),
            lock_table: LockTable::new(),
        }
    }

    /// Start a transaction.
    pub fn begin(&self, level: IsolationLevel) -> Result<u64> {
        let mut active = self.active.lock();
        let xid = self.ledger.begin()?;
        let t = Transaction::new(xid, level, active.keys().copied());
        active.insert(xid, Arc::new(t));
        Ok(xid)
    }

    /// Make `xid`'s writes visible and release its locks.
    ///
    /// # Errors
    /// The recorded conflict if the transaction was aborted by the engine.
    pub fn commit(&self, xid: u64) -> Result<()> {
        let _t = self.transaction(xid)?;
        {
            let mut active = self.active.lock();
            self.ledger.commit(xid)?;
            active.remove(&xid);
        }
        self.lock_table.remove(xid);
        Ok(())
    }

    /// Roll `xid` back and release its locks.
    ///
    /// A transaction the engine already aborted is only forgotten.
    pub fn abort(&self, xid: u64) -> Result<()> {
        {
            let mut active = self.active.lock();
            let t = active.get(&xid).ok_or(Error::UnknownTransaction(xid))?;
            if !t.is_auto_aborted() {
                self.ledger.abort(xid)?;
            }
            active.remove(&xid);
        }
        self.lock_table.remove(xid);
        Ok(())
    }

    /// Read the version at `uid` as `xid` sees it.
    ///
    /// `None` if the version does not exist for this transaction.
    pub fn read(&self, xid: u64, uid: Uid) -> Result<Option<Vec<u8>>> {
        let t = self.transaction(xid)?;
        let Some(entry) = Entry::load(&self.dm, uid)? else {
            return Ok(None);
        };
        if is_visible(&self.ledger, &t, entry.stamps())? {
            Ok(Some(entry.data()))
        } else {
            Ok(None)
        }
    }

    /// Store a new version created by `xid`.
    pub fn insert(&self, xid: u64, data: &[u8]) -> Result<Uid> {
        let _t = self.transaction(xid)?;
        self.dm.insert(xid, &wrap_entry_raw(xid, data))
    }

    /// Delete the version at `uid` on behalf of `xid`.
    ///
    /// Blocks while another transaction holds the record. Returns `false`
    /// if the version is invisible to `xid` or already deleted by it.
    ///
    /// # Errors
    /// `Error::Conflict` on deadlock, or on a version skip under repeatable
    /// read. The transaction is aborted before the error is returned.
    pub fn delete(&self, xid: u64, uid: Uid) -> Result<bool> {
        let t = self.transaction(xid)?;
        let Some(entry) = Entry::load(&self.dm, uid)? else {
            return Ok(false);
        };
        if !is_visible(&self.ledger, &t, entry.stamps())? {
            return Ok(false);
        }

        let waiter = match self.lock_table.add(xid, uid) {
            Ok(waiter) => waiter,
            Err(Error::Conflict(kind)) => return Err(self.auto_abort(&t, kind)),
            Err(e) => return Err(e),
        };
        if let Some(waiter) = waiter {
            waiter.wait();
        }

        let stamps = entry.stamps();
        if stamps.xmax == xid {
            return Ok(false);
        }
        if is_version_skip(&self.ledger, &t, stamps)? {
            return Err(self.auto_abort(&t, ConflictKind::VersionSkip));
        }

        entry.set_xmax(xid)?;
        Ok(true)
    }

    /// Number of transactions begun but not yet committed or aborted.
    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    pub fn ledger(&self) -> &TransactionLedger {
        &self.ledger
    }

    fn transaction(&self, xid: u64) -> Result<Arc<Transaction>> {
        let t = self
            .active
            .lock()
            .get(&xid)
            .cloned()
            .ok_or(Error::UnknownTransaction(xid))?;
        match t.conflict() {
            Some(kind) => Err(Error::Conflict(kind)),
            None => Ok(t),
        }
    }

    /// Abort `t` after it lost a conflict; the transaction stays in the
    /// active set so later calls report the same error.
    fn auto_abort(&self, t: &Transaction, kind: ConflictKind) -> Error {
        t.set_conflict(kind);
        if let Err(e) = self.ledger.abort(t.xid) {
            tracing::error!(xid = t.xid, error = %e, "failed to record abort");
            return e;
        }
        self.lock_table.remove(t.xid);
        tracing::debug!(xid = t.xid, %kind, "transaction aborted on conflict");
        Error::Conflict(kind)
    }
}

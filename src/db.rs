//! Database facade: every file under one path prefix.
//!
//! ```text
//! <prefix>.xid   transaction ledger
//! <prefix>.db    page file
//! <prefix>.log   write-ahead log
//! <prefix>.bt    boot file (schema root pointer)
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::common::config::{file_path, DbOptions, XID_SUFFIX};
use crate::common::Result;
use crate::concurrency::{TransactionLedger, VersionManager};
use crate::data::DataManager;
use crate::storage::Booter;

/// Root pointer the boot file starts with: no schema yet.
const EMPTY_BOOT: [u8; 8] = [0; 8];

/// An open database.
///
/// Dropping it without [`close`](Database::close) leaves the files as a
/// crash would; the next [`open`](Database::open) recovers them.
pub struct Database {
    prefix: PathBuf,
    ledger: Arc<TransactionLedger>,
    dm: Arc<DataManager>,
    vm: VersionManager,
    booter: Booter,
}

impl Database {
    /// Create a fresh database at `prefix`.
    ///
    /// # Errors
    /// `Error::FileExists` if any of the files is already there.
    pub fn create<P: AsRef<Path>>(prefix: P, options: DbOptions) -> Result<Self> {
        let prefix = prefix.as_ref();
        let ledger = Arc::new(TransactionLedger::create(file_path(prefix, XID_SUFFIX))?);
        let dm = Arc::new(DataManager::create(prefix, &options)?);
        let booter = Booter::create(prefix)?;
        booter.update(&EMPTY_BOOT)?;

        tracing::info!(prefix = %prefix.display(), memory = options.memory, "database created");
        Ok(Self::assemble(prefix, ledger, dm, booter))
    }

    /// Open an existing database, recovering it if it was not closed.
    pub fn open<P: AsRef<Path>>(prefix: P, options: DbOptions) -> Result<Self> {
        let prefix = prefix.as_ref();
        let ledger = Arc::new(TransactionLedger::open(file_path(prefix, XID_SUFFIX))?);
        let dm = Arc::new(DataManager::open(prefix, &options, &ledger)?);
        let booter = Booter::open(prefix)?;

        tracing::info!(
            prefix = %prefix.display(),
            memory = options.memory,
            xids = ledger.counter(),
            "database opened"
        );
        Ok(Self::assemble(prefix, ledger, dm, booter))
    }

    fn assemble(
        prefix: &Path,
        ledger: Arc<TransactionLedger>,
        dm: Arc<DataManager>,
        booter: Booter,
    ) -> Self {
        let vm = VersionManager::new(Arc::clone(&ledger), Arc::clone(&dm));
        Self {
            prefix: prefix.to_path_buf(),
            ledger,
            dm,
            vm,
            booter,
        }
    }

    /// Flush everything and mark the shutdown clean.
    pub fn close(self) -> Result<()> {
        self.dm.close()?;
        tracing::info!(prefix = %self.prefix.display(), "database closed");
        Ok(())
    }

    pub fn vm(&self) -> &VersionManager {
        &self.vm
    }

    /// Data layer, shared with B+Tree indexes.
    pub fn dm(&self) -> &Arc<DataManager> {
        &self.dm
    }

    pub fn ledger(&self) -> &TransactionLedger {
        &self.ledger
    }

    pub fn booter(&self) -> &Booter {
        &self.booter
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }
}

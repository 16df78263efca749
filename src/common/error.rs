//! Error types for EmberDB.

use std::fmt;
use std::path::PathBuf;

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a transaction lost a conflict and had to be rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// Waiting for the lock would have closed a cycle in the wait-for graph.
    Deadlock,
    /// A repeatable-read transaction tried to delete a version that was
    /// deleted by a transaction it cannot see.
    VersionSkip,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::Deadlock => write!(f, "deadlock detected"),
            ConflictKind::VersionSkip => write!(f, "concurrent update (version skip)"),
        }
    }
}

/// All possible errors in EmberDB.
///
/// The variants fall into four groups, see [`Error::is_fatal`] and
/// [`Error::is_conflict`]:
/// - fatal: the files on disk are inconsistent and nothing can be trusted
/// - resource exhaustion: the request cannot be served, state is intact
/// - conflict: the transaction must be aborted or retried
/// - logical: bad arguments or missing objects
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transaction ledger length disagrees with its counter.
    #[error("bad transaction ledger file: {0}")]
    BadLedgerFile(String),

    /// The write-ahead log failed checksum validation.
    #[error("bad log file: {0}")]
    BadLogFile(String),

    /// A page or record is malformed.
    #[error("corrupted data: {0}")]
    Corrupted(String),

    /// Requested page does not exist on disk.
    #[error("page {0} not found")]
    PageNotFound(u32),

    /// Every cache slot is referenced, nothing can be evicted.
    #[error("cache is full")]
    CacheFull,

    /// A record does not fit in a single page.
    #[error("data too large: {0} bytes")]
    DataTooLarge(usize),

    /// No page with enough free space could be found.
    #[error("database is busy")]
    DatabaseBusy,

    /// The transaction lost a concurrency conflict.
    #[error("transaction conflict: {0}")]
    Conflict(ConflictKind),

    /// The transaction id is not active in the version manager.
    #[error("transaction {0} is not active")]
    UnknownTransaction(u64),

    /// Memory budget string could not be parsed.
    #[error("invalid memory size: {0:?}")]
    InvalidMemory(String),

    /// Refused to create a file that is already there.
    #[error("file already exists: {0}")]
    FileExists(PathBuf),

    /// A file that must exist is missing.
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),
}

impl Error {
    /// Errors after which the on-disk state can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::BadLedgerFile(_) | Error::BadLogFile(_) | Error::Corrupted(_)
        )
    }

    /// Errors that require the transaction to be aborted or retried.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}

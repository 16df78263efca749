//! Write-ahead logging and crash recovery.
//!
//! - [`Wal`] - the checksummed `.log` file
//! - [`LogRecord`] - physical insert/update records
//! - [`recover`] - redo/undo replay at open

mod log_record;
mod recover;
mod wal;

pub use log_record::LogRecord;
pub use recover::{recover, RecoveryReport};
pub use wal::Wal;

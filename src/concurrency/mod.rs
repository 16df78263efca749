//! Transactions and multi-version concurrency control.
//!
//! - [`TransactionLedger`] - durable xid allocation and status
//! - [`VersionManager`] - begin/commit/abort and versioned read/insert/delete
//! - [`LockTable`] - exclusive record locks with deadlock detection
//! - [`visibility`] - read-committed and repeatable-read visibility rules

mod entry;
mod ledger;
mod lock_table;
mod transaction;
mod version_manager;
pub mod visibility;

pub use entry::{wrap_entry_raw, Entry};
pub use ledger::{TransactionLedger, XidStatus, SUPER_XID};
pub use lock_table::{LockTable, Waiter};
pub use transaction::{IsolationLevel, Transaction};
pub use version_manager::VersionManager;
pub use visibility::Stamps;

//! EmberDB - an embedded storage engine with MVCC transactions.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            EmberDB                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Transaction Layer (concurrency/)               │   │
//! │  │   VersionManager + Visibility + LockTable + Ledger       │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌──────────────────────────┐  ┌───────────────────────────┐   │
//! │  │   Index Layer (index/)   │  │    Data Layer (data/)     │   │
//! │  │        B+Tree  ─────────────→  DataManager + DataItem   │   │
//! │  │                          │  │    + FreeSpaceIndex       │   │
//! │  └──────────────────────────┘  └───────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │      Cache Layer (buffer/)  +  Recovery (recovery/)     │   │
//! │  │   EvictionCache<T> (young/old) + PageStore │ WAL + redo │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Storage Layer (storage/)                       │   │
//! │  │     DiskManager + Page formats + Booter                  │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, Uid, Error, config)
//! - [`storage`] - Page file I/O, page formats and the boot file
//! - [`buffer`] - Generic eviction cache and the page store built on it
//! - [`recovery`] - Write-ahead log and crash recovery
//! - [`data`] - Data items and the free-space index
//! - [`index`] - B+Tree index
//! - [`concurrency`] - Transaction ledger, MVCC and record locks
//! - [`db`] - The [`Database`] facade over all of the above
//!
//! # Quick Start
//! ```no_run
//! use emberdb::concurrency::IsolationLevel;
//! use emberdb::{Database, DbOptions};
//!
//! let db = Database::create("/tmp/mydb", DbOptions::default())?;
//! let xid = db.vm().begin(IsolationLevel::ReadCommitted)?;
//! let uid = db.vm().insert(xid, b"hello")?;
//! assert_eq!(db.vm().read(xid, uid)?, Some(b"hello".to_vec()));
//! db.vm().commit(xid)?;
//! db.close()?;
//! # Ok::<(), emberdb::Error>(())
//! ```

pub mod buffer;
pub mod common;
pub mod concurrency;
pub mod data;
pub mod db;
pub mod index;
pub mod recovery;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::{DbOptions, PAGE_SIZE};
pub use common::{Error, PageId, Result, Uid};

pub use buffer::{CacheStats, StatsSnapshot};
pub use db::Database;
pub use index::BPlusTree;

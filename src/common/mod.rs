//! Common types and utilities shared across EmberDB.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and open options
//! - Error types
//! - Identifiers (PageId, Uid)

mod address;
pub mod config;
pub mod error;
mod page_id;

pub use address::{address_to_uid, uid_to_address, Uid};
pub use error::{ConflictKind, Error, Result};
pub use page_id::PageId;

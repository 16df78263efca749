//! Data item layer.
//!
//! - [`DataManager`] - allocates, reads and logs data items
//! - [`DataItem`] / [`DataItemRef`] / [`DataItemWriter`] - records and their
//!   before/after mutation protocol
//! - [`FreeSpaceIndex`] - picks the page an insert lands on

mod data_item;
mod data_manager;
mod free_space;

pub use data_item::{mark_raw_invalid, wrap_raw, DataItem, DataItemRef, DataItemWriter};
pub use data_manager::DataManager;
pub use free_space::{FreeSpaceIndex, PageInfo};

//! Storage layer - disk I/O and page formats.
//!
//! This module handles persistent storage:
//! - [`DiskManager`] - Low-level page file I/O
//! - [`page`] - Page types and layouts
//! - [`Booter`] - Atomically replaced root-pointer file

mod booter;
mod disk_manager;
pub mod page;

pub use booter::Booter;
pub use disk_manager::DiskManager;

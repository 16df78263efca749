//! Caching layer.
//!
//! Everything that keeps disk-backed objects in memory goes through the
//! same reference-counted [`EvictionCache`]: pages in the [`PageStore`],
//! and data items one level up.
//!
//! # Components
//! - [`EvictionCache`] / [`CacheBackend`] - Generic bounded cache
//! - [`PageStore`] - The page cache over the `.db` file
//! - [`Frame`] - A cached page + dirty flag
//! - [`PageGuard`] - RAII page reference
//! - [`CacheStats`] - Performance statistics
//! - [`replacer`] - Eviction policy implementations

mod cache;
mod frame;
mod page_guard;
mod page_store;
pub mod replacer;
mod stats;

pub use cache::{CacheBackend, EvictionCache};
pub use frame::Frame;
pub use page_guard::PageGuard;
pub use page_store::PageStore;
pub use stats::{CacheStats, StatsSnapshot};

//! Page types and layout.
//!
//! This module contains:
//! - [`Page`] - The raw 8KB data container
//! - [`data_page`] - Free-space offset header and record packing
//! - [`page_one`] - The validity-check page used to detect unclean shutdown

#[allow(clippy::module_inception)]
mod page;
pub mod data_page;
pub mod page_one;

pub use page::Page;

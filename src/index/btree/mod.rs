//! B+Tree index over `u64` keys.
//!
//! Nodes are ordinary data items, so they are cached, logged and recovered
//! by the data layer like any other record. Every write runs under the
//! super transaction and is never rolled back.
//!
//! - [`BPlusTree`] - search, range scan and insert
//! - leaves are chained through sibling pointers for range scans

mod node;
mod tree;

pub use node::{BALANCE, NODE_SIZE};
pub use tree::BPlusTree;

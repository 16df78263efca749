//! Secondary indexes.
//!
//! - [`btree`] - B+Tree keyed by `u64`
//! - [`str_to_key`] - maps string column values onto B+Tree keys

pub mod btree;

pub use btree::BPlusTree;

const STRING_KEY_SEED: u64 = 13331;

/// Hash a string value to an index key.
///
/// Deterministic across runs and platforms; distinct strings may collide,
/// so callers re-check the stored value after a lookup.
pub fn str_to_key(s: &str) -> u64 {
    s.bytes()
        .fold(0u64, |key, b| key.wrapping_mul(STRING_KEY_SEED).wrapping_add(b as u64))
}

//! Eviction policy implementations (replacers).
//!
//! Currently implements:
//! - [`TwoSegmentReplacer`] - young/old segments with age-based promotion

mod two_segment;

pub use two_segment::{Segment, TwoSegmentReplacer};

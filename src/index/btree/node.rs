//! B+Tree node layout.
//!
//! ```text
//! ┌────────────┬────────────┬──────────────┬───────────────────────────────┐
//! │ leaf (1B)  │ nkeys (2B) │ sibling (8B) │ (son 8B, key 8B) × 2·B+2      │
//! └────────────┴────────────┴──────────────┴───────────────────────────────┘
//! ```
//! In a leaf, `son[i]` is the uid indexed under `key[i]`. In an internal
//! node, `son[i]` covers keys below `key[i]` (and at or above `key[i-1]`).
//! The rightmost node of a level has no sibling and its last son covers
//! everything above.
//!
//! Every node is one data item of fixed size, so it is edited in place.

use crate::common::config::BTREE_BALANCE;
use crate::common::{Error, Result, Uid};
use crate::concurrency::SUPER_XID;
use crate::data::{DataItemRef, DataManager};

/// Balance factor: a node splits when it reaches `2 * BALANCE` keys.
pub const BALANCE: usize = BTREE_BALANCE;

const OFFSET_LEAF: usize = 0;
const OFFSET_NKEYS: usize = 1;
const OFFSET_SIBLING: usize = 3;
const OFFSET_PAIRS: usize = 11;

const PAIR_SIZE: usize = 16;
const MAX_PAIRS: usize = 2 * BALANCE + 2;

/// Payload size of every node item.
pub const NODE_SIZE: usize = OFFSET_PAIRS + PAIR_SIZE * MAX_PAIRS;

// ============================================================================
// Raw accessors
// ============================================================================

fn read_u64(raw: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&raw[at..at + 8]);
    u64::from_le_bytes(buf)
}

fn write_u64(raw: &mut [u8], at: usize, value: u64) {
    raw[at..at + 8].copy_from_slice(&value.to_le_bytes());
}

fn is_leaf(raw: &[u8]) -> bool {
    raw[OFFSET_LEAF] == 1
}

fn set_leaf(raw: &mut [u8], leaf: bool) {
    raw[OFFSET_LEAF] = leaf as u8;
}

fn nkeys(raw: &[u8]) -> usize {
    u16::from_le_bytes([raw[OFFSET_NKEYS], raw[OFFSET_NKEYS + 1]]) as usize
}

fn set_nkeys(raw: &mut [u8], n: usize) {
    raw[OFFSET_NKEYS..OFFSET_NKEYS + 2].copy_from_slice(&(n as u16).to_le_bytes());
}

fn sibling(raw: &[u8]) -> Uid {
    read_u64(raw, OFFSET_SIBLING)
}

fn set_sibling(raw: &mut [u8], uid: Uid) {
    write_u64(raw, OFFSET_SIBLING, uid);
}

fn son(raw: &[u8], k: usize) -> Uid {
    read_u64(raw, OFFSET_PAIRS + k * PAIR_SIZE)
}

fn set_son(raw: &mut [u8], k: usize, uid: Uid) {
    write_u64(raw, OFFSET_PAIRS + k * PAIR_SIZE, uid);
}

fn key(raw: &[u8], k: usize) -> u64 {
    read_u64(raw, OFFSET_PAIRS + k * PAIR_SIZE + 8)
}

fn set_key(raw: &mut [u8], k: usize, key: u64) {
    write_u64(raw, OFFSET_PAIRS + k * PAIR_SIZE + 8, key);
}

/// Move pairs `k..` one slot to the right.
fn shift_from(raw: &mut [u8], k: usize) {
    let start = OFFSET_PAIRS + k * PAIR_SIZE;
    let end = OFFSET_PAIRS + (MAX_PAIRS - 1) * PAIR_SIZE;
    raw.copy_within(start..end, start + PAIR_SIZE);
}

/// Image of an empty leaf, the root of a new tree.
pub fn nil_root_raw() -> Vec<u8> {
    let mut raw = vec![0u8; NODE_SIZE];
    set_leaf(&mut raw, true);
    raw
}

/// Image of an internal root over two children after a root split.
pub fn new_root_raw(left: Uid, right: Uid, split_key: u64) -> Vec<u8> {
    let mut raw = vec![0u8; NODE_SIZE];
    set_leaf(&mut raw, false);
    set_nkeys(&mut raw, 2);
    set_son(&mut raw, 0, left);
    set_key(&mut raw, 0, split_key);
    set_son(&mut raw, 1, right);
    set_key(&mut raw, 1, u64::MAX);
    raw
}

/// Put (`key`, `uid`) in sorted position.
///
/// In a leaf the pair goes before the first key at or above `new_key`. In an
/// internal node `uid` is the right half of `split_child`, and goes right
/// after it.
///
/// Returns false, leaving the node untouched, when the pair belongs further
/// right: past every key of a leaf that has a sibling, or next to a child
/// that moved to the sibling when this node split.
fn insert_pair(raw: &mut [u8], uid: Uid, new_key: u64, split_child: Uid) -> Result<bool> {
    let n = nkeys(raw);

    if is_leaf(raw) {
        let kth = (0..n).find(|&i| key(raw, i) >= new_key).unwrap_or(n);
        if kth == n && sibling(raw) != 0 {
            return Ok(false);
        }
        shift_from(raw, kth);
        set_key(raw, kth, new_key);
        set_son(raw, kth, uid);
    } else {
        let Some(kth) = (0..n).find(|&i| son(raw, i) == split_child) else {
            if sibling(raw) != 0 {
                return Ok(false);
            }
            return Err(Error::Corrupted(format!(
                "b+tree child {split_child:#x} has no parent entry"
            )));
        };
        // son[kth] now covers keys below `new_key`; the new son takes over
        // up to the old bound.
        let bound = key(raw, kth);
        set_key(raw, kth, new_key);
        shift_from(raw, kth + 1);
        set_key(raw, kth + 1, bound);
        set_son(raw, kth + 1, uid);
    }
    set_nkeys(raw, n + 1);
    Ok(true)
}

/// Image of the right half of a full node.
fn split_raw(raw: &[u8]) -> Vec<u8> {
    let mut right = vec![0u8; NODE_SIZE];
    set_leaf(&mut right, is_leaf(raw));
    set_nkeys(&mut right, BALANCE);
    set_sibling(&mut right, sibling(raw));

    let from = OFFSET_PAIRS + BALANCE * PAIR_SIZE;
    let to = OFFSET_PAIRS + 2 * BALANCE * PAIR_SIZE;
    right[OFFSET_PAIRS..OFFSET_PAIRS + BALANCE * PAIR_SIZE].copy_from_slice(&raw[from..to]);
    right
}

// ============================================================================
// Node
// ============================================================================

/// Where a descent goes next.
pub(crate) enum Next {
    /// Child covering the key.
    Son(Uid),
    /// The key lies to the right; continue at this node of the same level.
    Sibling(Uid),
}

/// Outcome of inserting into one node.
pub(crate) enum InsertOutcome {
    /// The key belongs to the sibling; retry there.
    Sibling(Uid),
    /// Inserted without a split.
    Done,
    /// Inserted and split: the new right node and its first key must be
    /// added to the parent.
    Split { son: Uid, key: u64 },
}

/// A referenced tree node.
pub(crate) struct Node<'a> {
    dm: &'a DataManager,
    uid: Uid,
    item: DataItemRef<'a>,
}

impl<'a> Node<'a> {
    pub fn load(dm: &'a DataManager, uid: Uid) -> Result<Self> {
        let item = dm
            .read(uid)?
            .ok_or_else(|| Error::Corrupted(format!("b+tree node {uid:#x} is missing")))?;
        if item.payload_len() != NODE_SIZE {
            return Err(Error::Corrupted(format!(
                "b+tree node {uid:#x} has {} bytes",
                item.payload_len()
            )));
        }
        Ok(Self { dm, uid, item })
    }

    pub fn is_leaf(&self) -> bool {
        self.item.with_data(is_leaf)
    }

    /// First son, for walking down the left spine.
    pub fn first_son(&self) -> Uid {
        self.item.with_data(|raw| son(raw, 0))
    }

    /// Child of an internal node an insert of `target` descends into.
    pub fn search_next(&self, target: u64) -> Next {
        self.next_where(|bound| target < bound)
    }

    /// Leftmost child that may hold keys at or above `lo`.
    ///
    /// A child can hold keys equal to its bound when duplicates straddle a
    /// split, so range scans start one child further left than inserts.
    pub fn search_first(&self, lo: u64) -> Next {
        self.next_where(|bound| lo <= bound)
    }

    fn next_where(&self, covers: impl Fn(u64) -> bool) -> Next {
        self.item.with_data(|raw| {
            let n = nkeys(raw);
            if let Some(i) = (0..n).find(|&i| covers(key(raw, i))) {
                return Next::Son(son(raw, i));
            }
            match sibling(raw) {
                0 if n > 0 => Next::Son(son(raw, n - 1)),
                next => Next::Sibling(next),
            }
        })
    }

    /// Uids in this leaf with keys in `lo..=hi`, plus the sibling to continue
    /// at (0 when the range ends here).
    pub fn leaf_search_range(&self, lo: u64, hi: u64) -> (Vec<Uid>, Uid) {
        self.item.with_data(|raw| {
            let n = nkeys(raw);
            let mut uids = Vec::new();
            let mut k = (0..n).find(|&i| key(raw, i) >= lo).unwrap_or(n);
            while k < n && key(raw, k) <= hi {
                uids.push(son(raw, k));
                k += 1;
            }
            let next = if k == n { sibling(raw) } else { 0 };
            (uids, next)
        })
    }

    /// Insert (`key`, `uid`), splitting the node when it fills up.
    ///
    /// `split_child` is the child whose split produced `uid`; unused for
    /// leaves. The new right node is published before this node points at
    /// it, so a concurrent scan never follows a dangling sibling.
    pub fn insert_and_split(&self, uid: Uid, new_key: u64, split_child: Uid) -> Result<InsertOutcome> {
        let mut writer = self.item.before();

        if !writer.update(|raw| insert_pair(raw, uid, new_key, split_child))? {
            let next = writer.update(|raw| sibling(raw));
            return Ok(InsertOutcome::Sibling(next));
        }

        let outcome = match writer.update(|raw| (nkeys(raw) == 2 * BALANCE).then(|| split_raw(raw))) {
            None => InsertOutcome::Done,
            Some(right) => {
                let son = self.dm.insert(SUPER_XID, &right)?;
                writer.update(|raw| {
                    set_nkeys(raw, BALANCE);
                    set_sibling(raw, son);
                });
                tracing::debug!(node = self.uid, right = son, "split b+tree node");
                InsertOutcome::Split {
                    son,
                    key: key(&right, 0),
                }
            }
        };

        writer.after(SUPER_XID)?;
        Ok(outcome)
    }
}

//! B+Tree index over data items.

use std::sync::Arc;

use parking_lot::Mutex;

use super::node::{new_root_raw, nil_root_raw, InsertOutcome, Next, Node};
use crate::common::{Error, Result, Uid};
use crate::concurrency::SUPER_XID;
use crate::data::{DataItemRef, DataManager};

/// A persistent B+Tree mapping `u64` keys to uids.
///
/// The tree is reached through a boot item holding the root's uid. A root
/// split writes the new root first and then swaps the boot item, so readers
/// see either the old root or the complete new one.
///
/// Duplicate keys are allowed; their relative order is unspecified.
///
/// # Usage
/// ```ignore
/// let boot_uid = BPlusTree::create(&dm)?;
/// let tree = BPlusTree::load(boot_uid, Arc::clone(&dm))?;
/// tree.insert(42, uid)?;
/// assert_eq!(tree.search(42)?, vec![uid]);
/// ```
pub struct BPlusTree {
    dm: Arc<DataManager>,
    boot_uid: Uid,
    boot_lock: Mutex<()>,
}

impl BPlusTree {
    /// Write an empty tree and return the uid of its boot item.
    pub fn create(dm: &DataManager) -> Result<Uid> {
        let root = dm.insert(SUPER_XID, &nil_root_raw())?;
        dm.insert(SUPER_XID, &root.to_le_bytes())
    }

    /// Open the tree whose boot item is `boot_uid`.
    pub fn load(boot_uid: Uid, dm: Arc<DataManager>) -> Result<Self> {
        let tree = Self {
            dm,
            boot_uid,
            boot_lock: Mutex::new(()),
        };
        // Fail early on a bad boot uid.
        tree.root_uid()?;
        Ok(tree)
    }

    pub fn boot_uid(&self) -> Uid {
        self.boot_uid
    }

    /// Uid of the current root node.
    pub fn root_uid(&self) -> Result<Uid> {
        let _boot = self.boot_lock.lock();
        let boot = self.boot_item()?;
        let data = boot.data();
        let bytes: [u8; 8] = data
            .as_slice()
            .try_into()
            .map_err(|_| Error::Corrupted(format!("boot item holds {} bytes", data.len())))?;
        Ok(u64::from_le_bytes(bytes))
    }

    /// Publish a new root over `left` and `right`.
    fn update_root_uid(&self, left: Uid, right: Uid, split_key: u64) -> Result<()> {
        let _boot = self.boot_lock.lock();
        let new_root = self.dm.insert(SUPER_XID, &new_root_raw(left, right, split_key))?;

        let boot = self.boot_item()?;
        let mut writer = boot.before();
        writer.update(|data| data.copy_from_slice(&new_root.to_le_bytes()));
        writer.after(SUPER_XID)?;
        tracing::debug!(old = left, new = new_root, "b+tree root split");
        Ok(())
    }

    fn boot_item(&self) -> Result<DataItemRef<'_>> {
        self.dm
            .read(self.boot_uid)?
            .ok_or_else(|| Error::Corrupted(format!("boot item {:#x} is missing", self.boot_uid)))
    }

    // ========================================================================
    // Public API: Search
    // ========================================================================

    /// Uids indexed under `key`.
    pub fn search(&self, key: u64) -> Result<Vec<Uid>> {
        self.search_range(key, key)
    }

    /// Uids with keys in `lo..=hi`, in ascending key order.
    pub fn search_range(&self, lo: u64, hi: u64) -> Result<Vec<Uid>> {
        let mut uids = Vec::new();
        if lo > hi {
            return Ok(uids);
        }

        let mut leaf = self.search_leaf(self.root_uid()?, lo)?;
        loop {
            let (found, next) = Node::load(&self.dm, leaf)?.leaf_search_range(lo, hi);
            uids.extend(found);
            if next == 0 {
                break;
            }
            leaf = next;
        }
        Ok(uids)
    }

    /// Leftmost leaf that may hold keys at or above `lo`.
    fn search_leaf(&self, mut node: Uid, lo: u64) -> Result<Uid> {
        loop {
            let current = Node::load(&self.dm, node)?;
            if current.is_leaf() {
                return Ok(node);
            }
            node = self.chase(node, current.search_first(lo), |n| n.search_first(lo))?;
        }
    }

    /// Child an insert of `key` descends into.
    fn search_next(&self, node: Uid, key: u64) -> Result<Uid> {
        let first = Node::load(&self.dm, node)?.search_next(key);
        self.chase(node, first, |n| n.search_next(key))
    }

    /// Follow siblings of nodes split under us until a child is found.
    fn chase(&self, mut node: Uid, mut next: Next, step: impl Fn(&Node<'_>) -> Next) -> Result<Uid> {
        loop {
            match next {
                Next::Son(son) => return Ok(son),
                Next::Sibling(0) => {
                    return Err(Error::Corrupted(format!("b+tree node {node:#x} is empty")))
                }
                Next::Sibling(sibling) => {
                    node = sibling;
                    next = step(&Node::load(&self.dm, node)?);
                }
            }
        }
    }

    // ========================================================================
    // Public API: Insert
    // ========================================================================

    /// Index `uid` under `key`.
    pub fn insert(&self, key: u64, uid: Uid) -> Result<()> {
        let root = self.root_uid()?;
        if let Some((son, split_key)) = self.insert_at(root, uid, key)? {
            self.update_root_uid(root, son, split_key)?;
        }
        Ok(())
    }

    /// Insert below `node`; returns the (new node, first key) pair the
    /// caller must add if `node` split.
    fn insert_at(&self, node: Uid, uid: Uid, key: u64) -> Result<Option<(Uid, u64)>> {
        if Node::load(&self.dm, node)?.is_leaf() {
            return self.insert_and_split(node, uid, key, 0);
        }

        let child = self.search_next(node, key)?;
        match self.insert_at(child, uid, key)? {
            Some((son, split_key)) => self.insert_and_split(node, son, split_key, child),
            None => Ok(None),
        }
    }

    fn insert_and_split(
        &self,
        mut node: Uid,
        uid: Uid,
        key: u64,
        split_child: Uid,
    ) -> Result<Option<(Uid, u64)>> {
        loop {
            match Node::load(&self.dm, node)?.insert_and_split(uid, key, split_child)? {
                InsertOutcome::Sibling(next) => node = next,
                InsertOutcome::Done => return Ok(None),
                InsertOutcome::Split { son, key } => return Ok(Some((son, key))),
            }
        }
    }

    /// Number of levels, 1 for a tree that is a single leaf.
    ///
    /// Every root split adds exactly one level.
    pub fn height(&self) -> Result<usize> {
        let mut node = self.root_uid()?;
        let mut height = 1;
        loop {
            let current = Node::load(&self.dm, node)?;
            if current.is_leaf() {
                return Ok(height);
            }
            node = current.first_son();
            height += 1;
        }
    }
}

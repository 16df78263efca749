//! In-memory state of a running transaction.

use std::collections::HashSet;

use parking_lot::Mutex;

use crate::common::ConflictKind;
use crate::concurrency::SUPER_XID;

/// How much of other transactions' work a transaction may observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Sees every version committed at the time of the read.
    #[default]
    ReadCommitted,
    /// Sees only versions committed before it began.
    RepeatableRead,
}

impl IsolationLevel {
    /// Numeric level as used by the wire protocol (0 or 1).
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(IsolationLevel::ReadCommitted),
            1 => Some(IsolationLevel::RepeatableRead),
            _ => None,
        }
    }
}

/// A transaction the version manager is tracking.
#[derive(Debug)]
pub struct Transaction {
    pub xid: u64,
    pub level: IsolationLevel,
    /// Xids active when a repeatable-read transaction began.
    snapshot: HashSet<u64>,
    /// Set once a conflict rolled the transaction back.
    conflict: Mutex<Option<ConflictKind>>,
}

impl Transaction {
    /// Start tracking `xid`, capturing `active` as the snapshot under
    /// repeatable read.
    pub fn new(xid: u64, level: IsolationLevel, active: impl IntoIterator<Item = u64>) -> Self {
        let snapshot = match level {
            IsolationLevel::ReadCommitted => HashSet::new(),
            IsolationLevel::RepeatableRead => active.into_iter().collect(),
        };
        Self {
            xid,
            level,
            snapshot,
            conflict: Mutex::new(None),
        }
    }

    /// The conflict that rolled this transaction back, if any.
    pub fn conflict(&self) -> Option<ConflictKind> {
        *self.conflict.lock()
    }

    pub(crate) fn set_conflict(&self, kind: ConflictKind) {
        *self.conflict.lock() = Some(kind);
    }

    /// True once the engine aborted the transaction on its own.
    pub fn is_auto_aborted(&self) -> bool {
        self.conflict.lock().is_some()
    }

    /// Whether `xid` was still running when this transaction began.
    pub fn in_snapshot(&self, xid: u64) -> bool {
        xid != SUPER_XID && self.snapshot.contains(&xid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_only_for_repeatable_read() {
        let rc = Transaction::new(5, IsolationLevel::ReadCommitted, [2, 3]);
        assert!(!rc.in_snapshot(2));

        let rr = Transaction::new(5, IsolationLevel::RepeatableRead, [2, 3]);
        assert!(rr.in_snapshot(2));
        assert!(rr.in_snapshot(3));
        assert!(!rr.in_snapshot(4));
    }

    #[test]
    fn test_super_xid_never_in_snapshot() {
        let rr = Transaction::new(5, IsolationLevel::RepeatableRead, [SUPER_XID, 1]);
        assert!(!rr.in_snapshot(SUPER_XID));
    }

    #[test]
    fn test_conflict_marks_auto_abort() {
        let t = Transaction::new(5, IsolationLevel::ReadCommitted, []);
        assert!(!t.is_auto_aborted());
        t.set_conflict(ConflictKind::Deadlock);
        assert!(t.is_auto_aborted());
        assert_eq!(t.conflict(), Some(ConflictKind::Deadlock));
    }

    #[test]
    fn test_level_from_number() {
        assert_eq!(IsolationLevel::from_level(0), Some(IsolationLevel::ReadCommitted));
        assert_eq!(IsolationLevel::from_level(1), Some(IsolationLevel::RepeatableRead));
        assert_eq!(IsolationLevel::from_level(2), None);
    }
}

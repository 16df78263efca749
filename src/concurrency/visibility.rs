//! Which versions a transaction may see.

use crate::common::Result;
use crate::concurrency::{IsolationLevel, Transaction, TransactionLedger};

/// Xids stamped on a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamps {
    pub xmin: u64,
    pub xmax: u64,
}

/// Whether `t` can see the version stamped with `stamps`.
pub fn is_visible(ledger: &TransactionLedger, t: &Transaction, stamps: Stamps) -> Result<bool> {
    match t.level {
        IsolationLevel::ReadCommitted => read_committed(ledger, t, stamps),
        IsolationLevel::RepeatableRead => repeatable_read(ledger, t, stamps),
    }
}

/// Whether deleting the version would skip over a version `t` cannot see.
///
/// Only repeatable read rejects this: the deleter committed, and either
/// began after `t` or was still running when `t` took its snapshot.
pub fn is_version_skip(ledger: &TransactionLedger, t: &Transaction, stamps: Stamps) -> Result<bool> {
    match t.level {
        IsolationLevel::ReadCommitted => Ok(false),
        IsolationLevel::RepeatableRead => {
            let xmax = stamps.xmax;
            Ok(ledger.is_committed(xmax)? && (xmax > t.xid || t.in_snapshot(xmax)))
        }
    }
}

fn read_committed(ledger: &TransactionLedger, t: &Transaction, Stamps { xmin, xmax }: Stamps) -> Result<bool> {
    if xmin == t.xid && xmax == 0 {
        return Ok(true);
    }
    if ledger.is_committed(xmin)? {
        if xmax == 0 {
            return Ok(true);
        }
        if xmax != t.xid && !ledger.is_committed(xmax)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn repeatable_read(ledger: &TransactionLedger, t: &Transaction, Stamps { xmin, xmax }: Stamps) -> Result<bool> {
    let xid = t.xid;
    if xmin == xid && xmax != xid {
        return Ok(true);
    }
    if xmin < xid && !t.in_snapshot(xmin) && ledger.is_committed(xmin)? {
        if xmax == 0 {
            return Ok(true);
        }
        if xmax != xid && (xmax > xid || t.in_snapshot(xmax) || !ledger.is_committed(xmax)?) {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::SUPER_XID;
    use tempfile::tempdir;

    fn stamps(xmin: u64, xmax: u64) -> Stamps {
        Stamps { xmin, xmax }
    }

    #[test]
    fn test_read_committed() {
        let dir = tempdir().unwrap();
        let ledger = TransactionLedger::create(dir.path().join("t.xid")).unwrap();
        let a = ledger.begin().unwrap();
        let b = ledger.begin().unwrap();
        let t = Transaction::new(b, IsolationLevel::ReadCommitted, []);

        // Own insert.
        assert!(is_visible(&ledger, &t, stamps(b, 0)).unwrap());
        // Own delete.
        assert!(!is_visible(&ledger, &t, stamps(b, b)).unwrap());
        // Uncommitted insert by someone else.
        assert!(!is_visible(&ledger, &t, stamps(a, 0)).unwrap());
        // Super transaction inserts are always committed.
        assert!(is_visible(&ledger, &t, stamps(SUPER_XID, 0)).unwrap());
        // Committed insert, uncommitted delete by someone else.
        assert!(is_visible(&ledger, &t, stamps(SUPER_XID, a)).unwrap());

        ledger.commit(a).unwrap();
        assert!(is_visible(&ledger, &t, stamps(a, 0)).unwrap());
        // Committed delete.
        assert!(!is_visible(&ledger, &t, stamps(SUPER_XID, a)).unwrap());
    }

    #[test]
    fn test_repeatable_read_ignores_snapshot_commits() {
        let dir = tempdir().unwrap();
        let ledger = TransactionLedger::create(dir.path().join("t.xid")).unwrap();
        let a = ledger.begin().unwrap();
        let b = ledger.begin().unwrap();
        let t = Transaction::new(b, IsolationLevel::RepeatableRead, [a]);

        ledger.commit(a).unwrap();
        // `a` was running when `b` began, so its insert stays hidden.
        assert!(!is_visible(&ledger, &t, stamps(a, 0)).unwrap());
        // ...and its delete does not hide anything from `b`.
        assert!(is_visible(&ledger, &t, stamps(SUPER_XID, a)).unwrap());

        let c = ledger.begin().unwrap();
        ledger.commit(c).unwrap();
        // Committed after `b` began.
        assert!(!is_visible(&ledger, &t, stamps(c, 0)).unwrap());
        assert!(is_visible(&ledger, &t, stamps(SUPER_XID, c)).unwrap());
        // Own insert, deleted by someone else, still visible.
        assert!(is_visible(&ledger, &t, stamps(b, c)).unwrap());
    }

    #[test]
    fn test_version_skip() {
        let dir = tempdir().unwrap();
        let ledger = TransactionLedger::create(dir.path().join("t.xid")).unwrap();
        let a = ledger.begin().unwrap();
        let b = ledger.begin().unwrap();
        let rr = Transaction::new(b, IsolationLevel::RepeatableRead, [a]);
        let rc = Transaction::new(b, IsolationLevel::ReadCommitted, []);

        assert!(!is_version_skip(&ledger, &rr, stamps(SUPER_XID, a)).unwrap());
        ledger.commit(a).unwrap();
        assert!(is_version_skip(&ledger, &rr, stamps(SUPER_XID, a)).unwrap());
        assert!(!is_version_skip(&ledger, &rc, stamps(SUPER_XID, a)).unwrap());

        // Never a skip on a live version.
        assert!(!is_version_skip(&ledger, &rr, stamps(SUPER_XID, 0)).unwrap());
    }
}

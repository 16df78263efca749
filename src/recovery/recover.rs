//! Crash recovery.
//!
//! Runs when page 1 says the previous process never closed the database.
//! Three passes over the log:
//! 1. find the highest page any record touches and truncate the page file
//!    to it, dropping pages allocated but never logged
//! 2. redo, forward, every record of a transaction that is no longer active
//! 3. undo, backward, every record of a transaction still marked active
//!
//! Every write is physical and positional, so running recovery again over
//! the same files reproduces the same pages.

use crate::buffer::PageStore;
use crate::common::{uid_to_address, PageId, Result};
use crate::concurrency::TransactionLedger;
use crate::data::mark_raw_invalid;
use crate::recovery::{LogRecord, Wal};
use crate::storage::page::data_page;

/// What a recovery run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Highest page referenced by the log; the page file was cut to it.
    pub max_page: u32,
    pub redone: usize,
    pub undone: usize,
}

#[derive(Clone, Copy)]
enum Pass {
    Redo,
    Undo,
}

/// Bring the page file back in line with the log and the ledger.
pub fn recover(ledger: &TransactionLedger, wal: &Wal, store: &PageStore) -> Result<RecoveryReport> {
    tracing::info!("recovery started");
    let mut report = RecoveryReport {
        max_page: 1,
        ..Default::default()
    };

    let records = read_all(wal)?;
    for record in &records {
        report.max_page = report.max_page.max(record.page_id().0);
    }
    store.truncate_to(PageId::new(report.max_page))?;
    tracing::info!(max_page = report.max_page, "truncated page file");

    let mut undo = Vec::new();
    for record in &records {
        if ledger.is_active(record.xid())? {
            undo.push(record);
        } else {
            apply(store, record, Pass::Redo)?;
            report.redone += 1;
        }
    }
    tracing::info!(records = report.redone, "redo finished");

    for record in undo.into_iter().rev() {
        apply(store, record, Pass::Undo)?;
        report.undone += 1;
    }
    tracing::info!(records = report.undone, "undo finished");

    Ok(report)
}

fn read_all(wal: &Wal) -> Result<Vec<LogRecord>> {
    wal.rewind();
    let mut records = Vec::new();
    while let Some(bytes) = wal.next()? {
        records.push(LogRecord::decode(&bytes)?);
    }
    wal.rewind();
    Ok(records)
}

fn apply(store: &PageStore, record: &LogRecord, pass: Pass) -> Result<()> {
    match record {
        LogRecord::Insert {
            page_id,
            offset,
            raw,
            ..
        } => {
            let guard = store.get_page(*page_id)?;
            match pass {
                Pass::Redo => data_page::recover_insert(&mut guard.page_mut(), raw, *offset),
                Pass::Undo => {
                    let mut raw = raw.clone();
                    mark_raw_invalid(&mut raw);
                    data_page::recover_insert(&mut guard.page_mut(), &raw, *offset);
                }
            }
            guard.mark_dirty();
        }
        LogRecord::Update {
            uid,
            old_raw,
            new_raw,
            ..
        } => {
            let (page_id, offset) = uid_to_address(*uid);
            let image = match pass {
                Pass::Redo => new_raw,
                Pass::Undo => old_raw,
            };
            let guard = store.get_page(page_id)?;
            data_page::recover_update(&mut guard.page_mut(), image, offset);
            guard.mark_dirty();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::address_to_uid;
    use crate::data::wrap_raw;
    use crate::storage::page::page_one;
    use tempfile::tempdir;

    struct Fixture {
        _dir: tempfile::TempDir,
        ledger: TransactionLedger,
        wal: Wal,
        store: PageStore,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let ledger = TransactionLedger::create(dir.path().join("r.xid")).unwrap();
        let wal = Wal::create(dir.path().join("r.log")).unwrap();
        let store = PageStore::create(dir.path().join("r.db"), 16).unwrap();
        store.new_page(&page_one::init_raw()).unwrap();
        Fixture {
            _dir: dir,
            ledger,
            wal,
            store,
        }
    }

    fn page_bytes(store: &PageStore, page_id: PageId, offset: u16, len: usize) -> Vec<u8> {
        let guard = store.get_page(page_id).unwrap();
        let page = guard.page();
        page.as_slice()[offset as usize..offset as usize + len].to_vec()
    }

    #[test]
    fn test_redo_committed_insert() {
        let f = fixture();
        let page_id = f.store.new_page(&data_page::init_raw()).unwrap();
        let xid = f.ledger.begin().unwrap();
        let raw = wrap_raw(b"durable");
        f.wal
            .log(&LogRecord::encode_insert(xid, page_id, 2, &raw))
            .unwrap();
        f.ledger.commit(xid).unwrap();

        // The page itself never received the write.
        let report = recover(&f.ledger, &f.wal, &f.store).unwrap();

        assert_eq!(report.redone, 1);
        assert_eq!(report.undone, 0);
        assert_eq!(page_bytes(&f.store, page_id, 2, raw.len()), raw);
        let guard = f.store.get_page(page_id).unwrap();
        assert_eq!(data_page::fso(&guard.page()) as usize, 2 + raw.len());
    }

    #[test]
    fn test_undo_active_insert_and_update() {
        let f = fixture();
        let page_id = f.store.new_page(&data_page::init_raw()).unwrap();

        let committed = f.ledger.begin().unwrap();
        let raw = wrap_raw(b"abcd");
        f.wal
            .log(&LogRecord::encode_insert(committed, page_id, 2, &raw))
            .unwrap();
        f.ledger.commit(committed).unwrap();

        let crashed = f.ledger.begin().unwrap();
        let uid = address_to_uid(page_id, 2);
        let new_raw = wrap_raw(b"wxyz");
        f.wal
            .log(&LogRecord::encode_update(crashed, uid, &raw, &new_raw))
            .unwrap();
        let orphan = wrap_raw(b"orphan");
        let orphan_offset = 2 + raw.len() as u16;
        f.wal
            .log(&LogRecord::encode_insert(crashed, page_id, orphan_offset, &orphan))
            .unwrap();

        let report = recover(&f.ledger, &f.wal, &f.store).unwrap();
        assert_eq!(report.redone, 1);
        assert_eq!(report.undone, 2);

        // The update is rolled back to the committed image.
        assert_eq!(page_bytes(&f.store, page_id, 2, raw.len()), raw);
        // The orphan insert is present but flagged invalid.
        let undone = page_bytes(&f.store, page_id, orphan_offset, orphan.len());
        assert_eq!(undone[0], 1);
        assert_eq!(&undone[1..], &orphan[1..]);
    }

    #[test]
    fn test_truncates_unlogged_pages() {
        let f = fixture();
        let logged = f.store.new_page(&data_page::init_raw()).unwrap();
        f.store.new_page(&data_page::init_raw()).unwrap();
        f.store.new_page(&data_page::init_raw()).unwrap();

        let xid = f.ledger.begin().unwrap();
        f.wal
            .log(&LogRecord::encode_insert(xid, logged, 2, &wrap_raw(b"x")))
            .unwrap();

        let report = recover(&f.ledger, &f.wal, &f.store).unwrap();
        assert_eq!(report.max_page, logged.0);
        assert_eq!(f.store.page_count(), logged.0);
    }

    #[test]
    fn test_recovery_is_idempotent() {
        let f = fixture();
        let page_id = f.store.new_page(&data_page::init_raw()).unwrap();
        let a = f.ledger.begin().unwrap();
        let b = f.ledger.begin().unwrap();
        let raw_a = wrap_raw(b"aaaa");
        let raw_b = wrap_raw(b"bbbb");
        f.wal
            .log(&LogRecord::encode_insert(a, page_id, 2, &raw_a))
            .unwrap();
        f.wal
            .log(&LogRecord::encode_insert(b, page_id, 2 + raw_a.len() as u16, &raw_b))
            .unwrap();
        f.ledger.commit(a).unwrap();

        recover(&f.ledger, &f.wal, &f.store).unwrap();
        let first = page_bytes(&f.store, page_id, 0, 64);
        let report = recover(&f.ledger, &f.wal, &f.store).unwrap();
        let second = page_bytes(&f.store, page_id, 0, 64);

        assert_eq!(first, second);
        assert_eq!((report.redone, report.undone), (1, 1));
    }
}

//! B+Tree tests through the public database API.

use std::sync::Arc;

use emberdb::index::str_to_key;
use emberdb::{BPlusTree, Database, DbOptions, Uid};
use tempfile::tempdir;

fn boot_uid(db: &Database) -> Uid {
    let bytes = db.booter().load().unwrap();
    u64::from_le_bytes(bytes[..8].try_into().unwrap())
}

/// 100 sequential keys split the root exactly once and scan back in order.
#[test]
fn test_hundred_sequential_keys() {
    let dir = tempdir().unwrap();
    let db = Database::create(dir.path().join("db"), DbOptions::default()).unwrap();

    let boot = BPlusTree::create(db.dm()).unwrap();
    let tree = BPlusTree::load(boot, Arc::clone(db.dm())).unwrap();
    assert_eq!(tree.height().unwrap(), 1);

    for key in 0..100u64 {
        tree.insert(key, key + 1000).unwrap();
    }

    assert_eq!(tree.height().unwrap(), 2);
    let uids = tree.search_range(0, 99).unwrap();
    assert_eq!(uids, (1000..1100).collect::<Vec<_>>());
    drop(tree);
    db.close().unwrap();
}

/// The root pointer goes through the boot file and survives a restart.
#[test]
fn test_tree_reachable_from_boot_file() {
    let dir = tempdir().unwrap();
    let prefix = dir.path().join("db");

    {
        let db = Database::create(&prefix, DbOptions::default()).unwrap();
        assert_eq!(boot_uid(&db), 0);

        let boot = BPlusTree::create(db.dm()).unwrap();
        db.booter().update(&boot.to_le_bytes()).unwrap();

        let tree = BPlusTree::load(boot, Arc::clone(db.dm())).unwrap();
        for key in (0..500u64).rev() {
            tree.insert(key * 3, key).unwrap();
        }
        drop(tree);
        db.close().unwrap();
    }

    let db = Database::open(&prefix, DbOptions::default()).unwrap();
    let tree = BPlusTree::load(boot_uid(&db), Arc::clone(db.dm())).unwrap();
    assert_eq!(tree.search(300).unwrap(), vec![100]);
    assert!(tree.search(301).unwrap().is_empty());
    assert_eq!(tree.search_range(3, 12).unwrap(), vec![1, 2, 3, 4]);
    assert_eq!(tree.search_range(0, u64::MAX).unwrap().len(), 500);
    drop(tree);
    db.close().unwrap();
}

/// Tree writes are redone from the log after a crash.
#[test]
fn test_tree_survives_crash() {
    let dir = tempdir().unwrap();
    let prefix = dir.path().join("db");

    {
        let db = Database::create(&prefix, DbOptions::default()).unwrap();
        let boot = BPlusTree::create(db.dm()).unwrap();
        db.booter().update(&boot.to_le_bytes()).unwrap();
        let tree = BPlusTree::load(boot, Arc::clone(db.dm())).unwrap();
        for key in 0..200u64 {
            tree.insert(key, key).unwrap();
        }
        // No close: simulated crash.
    }

    let db = Database::open(&prefix, DbOptions::default()).unwrap();
    let tree = BPlusTree::load(boot_uid(&db), Arc::clone(db.dm())).unwrap();
    assert_eq!(tree.search_range(0, 199).unwrap(), (0..200).collect::<Vec<_>>());
}

/// String columns are indexed through their hashed key.
#[test]
fn test_string_keys() {
    let dir = tempdir().unwrap();
    let db = Database::create(dir.path().join("db"), DbOptions::default()).unwrap();
    let tree = BPlusTree::load(BPlusTree::create(db.dm()).unwrap(), Arc::clone(db.dm())).unwrap();

    let names = ["alice", "bob", "carol", "dave"];
    for (i, name) in names.iter().enumerate() {
        tree.insert(str_to_key(name), i as u64).unwrap();
    }
    assert_eq!(tree.search(str_to_key("carol")).unwrap(), vec![2]);
    assert!(tree.search(str_to_key("erin")).unwrap().is_empty());
}

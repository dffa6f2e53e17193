use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use rd_core::{ChangeSet, ChangeType, NodeKind, PathChange, RevisionInfo, Revnum};
use rd_indexer::{IndexError, Indexer, VecFeed};
use rd_storage::{SqliteStore, StoreError};
use rusqlite::Connection;

const BUSY_TIMEOUT: Duration = Duration::from_millis(25);

fn rev(id: i64, path: &str) -> ChangeSet {
    ChangeSet::new(
        RevisionInfo {
            id: Revnum::new(id),
            author: None,
            date_ms: 1_700_000_000_000 + id * 1000,
            message: String::new(),
        },
        vec![PathChange::new(path, ChangeType::Added, NodeKind::File)],
    )
}

fn open_indexer(dir: &Path, max_retries: u32) -> Indexer {
    let store = SqliteStore::open(dir)
        .expect("open store")
        .with_busy_timeout(BUSY_TIMEOUT)
        .expect("busy timeout");
    Indexer::open(store)
        .expect("open indexer")
        .with_max_retries(max_retries)
}

/// A second connection holding the write lock until dropped.
fn lock_writes(dir: &Path) -> Connection {
    let conn = Connection::open(dir.join("revdex.db")).expect("open blocker");
    conn.execute_batch("BEGIN IMMEDIATE").expect("take write lock");
    conn
}

fn assert_tree_matches_store(indexer: &Indexer) {
    let live = indexer.store().live_nodes().expect("live nodes");
    assert_eq!(indexer.current_tree().len(), live.len());
    for row in &live {
        let node = indexer
            .current_tree()
            .find(&row.path)
            .unwrap_or_else(|| panic!("{} missing from the tree", row.path));
        assert_eq!(node.id(), row.id);
    }
}

#[test]
fn locked_store_gives_up_after_max_retries() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut indexer = open_indexer(dir.path(), 2);
    indexer
        .run(&mut VecFeed::new(vec![rev(1, "/a")]))
        .expect("first revision");

    let blocker = lock_writes(dir.path());
    let started = Instant::now();
    let err = indexer
        .run(&mut VecFeed::new(vec![rev(2, "/b")]))
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(err.is_retryable(), "{err}");
    assert!(matches!(err, IndexError::Store(StoreError::Sql(_))), "{err}");
    // One first attempt plus two retries, each waiting out the busy timeout.
    assert!(elapsed >= BUSY_TIMEOUT * 3, "gave up after {elapsed:?}");

    assert_eq!(indexer.store().last_revision().unwrap(), Some(Revnum::new(1)));
    assert!(indexer.store().path_history("/b").unwrap().is_empty());
    assert!(indexer.current_tree().find("/b").is_none());
    assert_tree_matches_store(&indexer);

    drop(blocker);
    let summary = indexer
        .run(&mut VecFeed::new(vec![rev(2, "/b")]))
        .expect("retry after the lock is released");
    assert_eq!(summary.committed, 1);
    assert_eq!(summary.retries, 0);
    assert!(indexer.current_tree().find("/b").is_some());
    assert_tree_matches_store(&indexer);
}

#[test]
fn locked_store_is_retried_until_the_lock_clears() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut indexer = open_indexer(dir.path(), 200);
    indexer
        .run(&mut VecFeed::new(vec![rev(1, "/a")]))
        .expect("first revision");

    let blocker = lock_writes(dir.path());
    let release = thread::spawn(move || {
        thread::sleep(Duration::from_millis(200));
        blocker.execute_batch("ROLLBACK").expect("release write lock");
    });

    let summary = indexer
        .run(&mut VecFeed::new(vec![rev(2, "/b"), rev(3, "/c")]))
        .expect("run");
    release.join().expect("release thread");

    assert!(summary.retries >= 1, "{summary:?}");
    assert_eq!(summary.committed, 2);
    assert_eq!(summary.nodes_created, 2);
    assert_eq!(summary.last_revision, Some(Revnum::new(3)));

    assert_eq!(indexer.store().last_revision().unwrap(), Some(Revnum::new(3)));
    for (path, revision) in [("/a", 1), ("/b", 2), ("/c", 3)] {
        let id = indexer
            .store()
            .resolve_path(path, Revnum::new(revision))
            .unwrap_or_else(|err| panic!("resolve {path}@{revision}: {err}"));
        assert_eq!(indexer.store().path_history(path).unwrap().len(), 1);
        assert_eq!(indexer.current_tree().find(path).map(|node| node.id()), Some(id));
    }
    assert_tree_matches_store(&indexer);
}

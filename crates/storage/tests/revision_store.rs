use rd_core::{
    NodeId, NodeKind, NodeRecord, Predecessor, PredecessorType, RevisionInfo, Revnum,
};
use rd_storage::{PointInTime, SqliteStore, StoreError};
use rusqlite::Connection;

fn info(id: i64) -> RevisionInfo {
    RevisionInfo {
        id: Revnum::new(id),
        author: Some("alice".to_string()),
        date_ms: 1_700_000_000_000 + id,
        message: format!("r{id}"),
    }
}

fn record(id: i64, rev: i64, parent: i64, path: &str, kind: NodeKind) -> NodeRecord {
    let name = path.rsplit('/').next().unwrap_or_default().to_string();
    NodeRecord {
        id: NodeId::new(id),
        rev_min: Revnum::new(rev),
        rev_max: Revnum::HEAD,
        parent: NodeId::new(parent),
        predecessor: None,
        name,
        path: path.to_string(),
        kind,
    }
}

/// r1: /trunk, /trunk/a.txt; r2: /trunk/a.txt edited, /trunk/b.txt copied from a.txt@1;
/// r3: /trunk/a.txt deleted.
fn seeded_store() -> SqliteStore {
    let mut store = SqliteStore::open_in_memory().expect("open store");

    let tx = store.begin_revision(Revnum::new(1)).expect("begin r1");
    tx.insert_revision(&info(1)).expect("insert r1");
    let mut writers = tx.writers();
    writers
        .insert_node(record(1, 1, 0, "/trunk", NodeKind::Dir))
        .expect("insert trunk");
    writers
        .insert_node(record(2, 1, 1, "/trunk/a.txt", NodeKind::File))
        .expect("insert a.txt");
    writers
        .insert_content(NodeId::new(2), None)
        .expect("insert a.txt content");
    writers.close().expect("close r1 writers");
    tx.commit().expect("commit r1");

    let tx = store.begin_revision(Revnum::new(2)).expect("begin r2");
    tx.insert_revision(&info(2)).expect("insert r2");
    let mut writers = tx.writers();
    writers
        .replace_content(NodeId::new(2), Some("sha:2".to_string()))
        .expect("edit a.txt");
    let mut copy = record(3, 2, 1, "/trunk/b.txt", NodeKind::File);
    copy.predecessor = Some(Predecessor {
        id: NodeId::new(2),
        kind: PredecessorType::Copy,
    });
    writers.insert_node(copy).expect("insert b.txt");
    writers.close().expect("close r2 writers");
    tx.commit().expect("commit r2");

    let tx = store.begin_revision(Revnum::new(3)).expect("begin r3");
    tx.insert_revision(&info(3)).expect("insert r3");
    let mut writers = tx.writers();
    writers
        .outdate_node(NodeId::new(2), true)
        .expect("delete a.txt");
    let counts = writers.close().expect("close r3 writers");
    assert_eq!(counts.node_outdates, 1);
    assert_eq!(counts.content_outdates, 1);
    tx.commit().expect("commit r3");

    store
}

#[test]
fn resolve_path_returns_most_recent_row_at_or_before_revision() {
    let store = seeded_store();
    assert_eq!(
        store.resolve_path("/trunk/a.txt", Revnum::new(1)).unwrap(),
        NodeId::new(2)
    );
    // Historical lookup keeps answering after the delete.
    assert_eq!(
        store.resolve_path("/trunk/a.txt", Revnum::new(3)).unwrap(),
        NodeId::new(2)
    );
    let err = store
        .resolve_path("/trunk/b.txt", Revnum::new(1))
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.code(), "PATH_NOT_FOUND");

    assert!(store.node_at("/trunk/a.txt", Revnum::new(3)).unwrap().is_none());
    assert!(store.node_at("/trunk/a.txt", Revnum::new(2)).unwrap().is_some());
}

#[test]
fn children_respect_validity_windows() {
    let store = seeded_store();
    let names = |rev: i64| -> Vec<String> {
        store
            .children(NodeId::new(1), Revnum::new(rev))
            .unwrap()
            .into_iter()
            .map(|node| node.name)
            .collect()
    };
    assert_eq!(names(1), vec!["a.txt"]);
    assert_eq!(names(2), vec!["a.txt", "b.txt"]);
    assert_eq!(names(3), vec!["b.txt"]);

    let top = store.children(NodeId::ROOT, Revnum::new(3)).unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].path, "/trunk");

    let copy = &store.children(NodeId::new(1), Revnum::new(2)).unwrap()[1];
    assert_eq!(
        copy.predecessor,
        Some(Predecessor {
            id: NodeId::new(2),
            kind: PredecessorType::Copy
        })
    );
}

#[test]
fn lookups_are_repeatable() {
    let store = seeded_store();
    let first = (
        store.children(NodeId::new(1), Revnum::new(2)).unwrap(),
        store.resolve_path("/trunk/b.txt", Revnum::new(2)).unwrap(),
    );
    for _ in 0..3 {
        assert_eq!(
            store.children(NodeId::new(1), Revnum::new(2)).unwrap(),
            first.0
        );
        assert_eq!(
            store.resolve_path("/trunk/b.txt", Revnum::new(2)).unwrap(),
            first.1
        );
    }
}

#[test]
fn outdating_closes_node_and_content_windows() {
    let store = seeded_store();
    let history = store.path_history("/trunk/a.txt").unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].rev_min, Revnum::new(1));
    assert_eq!(history[0].rev_max, Revnum::new(2));

    let content = store.content_history(NodeId::new(2)).unwrap();
    let windows: Vec<(i64, i64, Option<String>)> = content
        .into_iter()
        .map(|c| (c.rev_min.get(), c.rev_max.get(), c.data))
        .collect();
    assert_eq!(
        windows,
        vec![(1, 1, None), (2, 2, Some("sha:2".to_string()))]
    );
}

#[test]
fn live_nodes_and_counters() {
    let store = seeded_store();
    let live: Vec<String> = store
        .live_nodes()
        .unwrap()
        .into_iter()
        .map(|node| node.path)
        .collect();
    assert_eq!(live, vec!["/trunk", "/trunk/b.txt"]);
    assert_eq!(store.last_revision().unwrap(), Some(Revnum::new(3)));
    assert_eq!(store.max_node_id().unwrap(), NodeId::new(3));
    assert_eq!(store.revision(Revnum::new(2)).unwrap(), Some(info(2)));
    assert!(store.revision(Revnum::new(9)).unwrap().is_none());
}

#[test]
fn outdating_a_missing_node_fails() {
    let mut store = seeded_store();
    let tx = store.begin_revision(Revnum::new(4)).expect("begin r4");
    let mut writers = tx.writers();
    writers
        .outdate_node(NodeId::new(2), false)
        .expect("buffer outdate");
    let err = writers.close().unwrap_err();
    assert!(matches!(err, StoreError::NoLiveRow { node } if node == NodeId::new(2)));
}

#[test]
fn dropped_revision_transaction_rolls_back() {
    let mut store = seeded_store();
    {
        let tx = store.begin_revision(Revnum::new(4)).expect("begin r4");
        tx.insert_revision(&info(4)).expect("insert r4");
        let mut writers = tx.writers();
        writers
            .insert_node(record(4, 4, 1, "/trunk/c.txt", NodeKind::File))
            .expect("insert c.txt");
        writers.close().expect("close writers");
        // The open transaction sees its own rows.
        assert_eq!(
            tx.resolve_path("/trunk/c.txt", Revnum::new(4)).unwrap(),
            NodeId::new(4)
        );
    }
    assert_eq!(store.last_revision().unwrap(), Some(Revnum::new(3)));
    assert!(store.path_history("/trunk/c.txt").unwrap().is_empty());
}

#[test]
fn inserts_must_open_at_the_transaction_revision() {
    let mut store = SqliteStore::open_in_memory().expect("open store");
    let tx = store.begin_revision(Revnum::new(2)).expect("begin r2");
    assert!(tx.insert_revision(&info(1)).is_err());
    let mut writers = tx.writers();
    let err = writers
        .insert_node(record(1, 1, 0, "/trunk", NodeKind::Dir))
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_INPUT");
}

#[test]
fn reset_empties_every_table() {
    let mut store = seeded_store();
    store.reset().expect("reset");
    assert_eq!(store.last_revision().unwrap(), None);
    assert_eq!(store.max_node_id().unwrap(), NodeId::ROOT);
    assert!(store.live_nodes().unwrap().is_empty());
    assert!(store.content_history(NodeId::new(2)).unwrap().is_empty());
}

#[test]
fn open_persists_and_reopens() {
    let dir = tempfile::tempdir().expect("temp dir");
    {
        let mut store = SqliteStore::open(dir.path()).expect("open store");
        let tx = store.begin_revision(Revnum::new(1)).expect("begin r1");
        tx.insert_revision(&info(1)).expect("insert r1");
        tx.commit().expect("commit r1");
    }
    let store = SqliteStore::open(dir.path()).expect("reopen store");
    assert_eq!(store.last_revision().unwrap(), Some(Revnum::new(1)));
    assert_eq!(store.storage_dir(), Some(dir.path()));
}

#[test]
fn open_rejects_foreign_schema() {
    let dir = tempfile::tempdir().expect("temp dir");
    let conn = Connection::open(dir.path().join("revdex.db")).expect("open raw db");
    conn.execute("CREATE TABLE legacy_paths(id INTEGER PRIMARY KEY)", [])
        .expect("create legacy table");
    drop(conn);

    let err = SqliteStore::open(dir.path()).expect_err("foreign schema must be rejected");
    assert_eq!(err.code(), "RESET_REQUIRED");
    assert!(matches!(err, StoreError::ResetRequired(_)));
}

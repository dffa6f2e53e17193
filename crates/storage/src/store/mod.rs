#![forbid(unsafe_code)]

mod batch;
mod error;
mod lookup;
mod revision_tx;
mod rows;

pub use batch::{BatchRow, BatchWriter, DEFAULT_BATCH_SIZE};
pub use error::StoreError;
pub use lookup::PointInTime;
pub use revision_tx::{RevisionTx, RevisionWriters, WriteCounts};
pub use rows::{ContentInsert, ContentOutdate, NodeInsert, NodeOutdate, RevisionInsert};

use rd_core::{ContentRecord, NodeId, NodeRecord, RevisionInfo, Revnum};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const DB_FILE_NAME: &str = "revdex.db";
const SCHEMA_VERSION: i64 = 1;
const TABLES: [&str; 4] = ["index_state", "revision", "node", "content"];

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    storage_dir: Option<PathBuf>,
    batch_size: usize,
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let db_path = storage_dir.join(DB_FILE_NAME);
        let conn = Connection::open(&db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        preflight_gate(&conn)?;
        install_schema(&conn)?;
        tracing::debug!(path = %db_path.display(), "store opened");

        Ok(Self {
            conn,
            storage_dir: Some(storage_dir),
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        install_schema(&conn)?;
        Ok(Self {
            conn,
            storage_dir: None,
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// How long a statement waits for another connection's write lock before
    /// failing with `SQLITE_BUSY`.
    pub fn with_busy_timeout(self, timeout: Duration) -> Result<Self, StoreError> {
        self.conn.busy_timeout(timeout)?;
        Ok(self)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn storage_dir(&self) -> Option<&Path> {
        self.storage_dir.as_deref()
    }

    /// Opens the transaction every write of `revision` goes through.
    pub fn begin_revision(&mut self, revision: Revnum) -> Result<RevisionTx<'_>, StoreError> {
        if revision.get() < 1 || revision.is_head() {
            return Err(StoreError::InvalidInput("revision out of range"));
        }
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(RevisionTx::new(tx, revision, self.batch_size))
    }

    /// Destructive: empties revision, node and content and re-seeds index_state.
    pub fn reset(&mut self) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "DELETE FROM content;
             DELETE FROM node;
             DELETE FROM revision;
             DELETE FROM index_state;",
        )?;
        seed_state(&tx)?;
        tx.commit()?;
        tracing::info!("index reset");
        Ok(())
    }

    pub fn resolve_path(&self, path: &str, revision: Revnum) -> Result<NodeId, StoreError> {
        PointInTime::resolve_path(self, path, revision)
    }

    pub fn lookup_path(
        &self,
        path: &str,
        revision: Revnum,
    ) -> Result<Option<NodeRecord>, StoreError> {
        lookup::lookup_path(&self.conn, path, revision)
    }

    pub fn children(&self, parent: NodeId, revision: Revnum) -> Result<Vec<NodeRecord>, StoreError> {
        lookup::children(&self.conn, parent, revision)
    }

    pub fn node_at(&self, path: &str, revision: Revnum) -> Result<Option<NodeRecord>, StoreError> {
        lookup::node_at(&self.conn, path, revision)
    }

    pub fn node(&self, id: NodeId) -> Result<Option<NodeRecord>, StoreError> {
        lookup::node(&self.conn, id)
    }

    pub fn path_history(&self, path: &str) -> Result<Vec<NodeRecord>, StoreError> {
        lookup::path_history(&self.conn, path)
    }

    pub fn content_history(&self, node: NodeId) -> Result<Vec<ContentRecord>, StoreError> {
        lookup::content_history(&self.conn, node)
    }

    pub fn live_nodes(&self) -> Result<Vec<NodeRecord>, StoreError> {
        lookup::live_nodes(&self.conn)
    }

    pub fn revision(&self, id: Revnum) -> Result<Option<RevisionInfo>, StoreError> {
        lookup::revision(&self.conn, id)
    }

    pub fn last_revision(&self) -> Result<Option<Revnum>, StoreError> {
        lookup::last_revision(&self.conn)
    }

    pub fn max_node_id(&self) -> Result<NodeId, StoreError> {
        lookup::max_node_id(&self.conn)
    }
}

impl PointInTime for SqliteStore {
    fn lookup_path(&self, path: &str, revision: Revnum) -> Result<Option<NodeRecord>, StoreError> {
        lookup::lookup_path(&self.conn, path, revision)
    }

    fn children(&self, parent: NodeId, revision: Revnum) -> Result<Vec<NodeRecord>, StoreError> {
        lookup::children(&self.conn, parent, revision)
    }
}

fn preflight_gate(conn: &Connection) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let mut rows = stmt.query([])?;
    let mut tables = BTreeSet::new();
    while let Some(row) = rows.next()? {
        tables.insert(row.get::<_, String>(0)?);
    }

    if tables.is_empty() {
        return Ok(());
    }

    let required: BTreeSet<&str> = TABLES.into_iter().collect();
    if tables
        .iter()
        .any(|table| !required.contains(table.as_str()))
    {
        return Err(StoreError::ResetRequired("unsupported tables detected"));
    }
    for table in required {
        if !tables.contains(table) {
            return Err(StoreError::ResetRequired("required table is missing"));
        }
    }

    let version = conn
        .query_row(
            "SELECT schema_version FROM index_state WHERE singleton=1",
            [],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;

    match version {
        Some(v) if v == SCHEMA_VERSION => Ok(()),
        Some(_) => Err(StoreError::ResetRequired("schema version mismatch")),
        None => Err(StoreError::ResetRequired("schema state row is missing")),
    }
}

fn install_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS index_state (
          singleton INTEGER PRIMARY KEY CHECK(singleton = 1),
          schema_version INTEGER NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS revision (
          id INTEGER PRIMARY KEY,
          author TEXT,
          date_ms INTEGER NOT NULL,
          message TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS node (
          id INTEGER PRIMARY KEY,
          rev_min INTEGER NOT NULL,
          rev_max INTEGER NOT NULL,
          parent INTEGER NOT NULL,
          predecessor INTEGER,
          predecessor_type TEXT,
          name TEXT NOT NULL,
          path TEXT NOT NULL,
          node_type TEXT NOT NULL,
          CHECK(rev_min <= rev_max),
          CHECK((predecessor IS NULL) = (predecessor_type IS NULL))
        );

        CREATE INDEX IF NOT EXISTS idx_node_path_rev
          ON node(path, rev_min);

        CREATE INDEX IF NOT EXISTS idx_node_parent_rev
          ON node(parent, rev_min);

        CREATE INDEX IF NOT EXISTS idx_node_rev_max
          ON node(rev_max);

        CREATE TABLE IF NOT EXISTS content (
          node INTEGER NOT NULL,
          rev_min INTEGER NOT NULL,
          rev_max INTEGER NOT NULL,
          data TEXT,
          PRIMARY KEY(node, rev_min),
          FOREIGN KEY(node) REFERENCES node(id)
            ON DELETE CASCADE DEFERRABLE INITIALLY DEFERRED,
          CHECK(rev_min <= rev_max)
        );

        CREATE INDEX IF NOT EXISTS idx_content_node_rev_max
          ON content(node, rev_max);
        "#,
    )?;

    seed_state(conn)
}

fn seed_state(conn: &Connection) -> Result<(), StoreError> {
    let now_ms = now_ms();
    conn.execute(
        "INSERT INTO index_state(singleton, schema_version, created_at_ms, updated_at_ms) \
         VALUES (1, ?1, ?2, ?2) \
         ON CONFLICT(singleton) DO UPDATE SET schema_version=excluded.schema_version, updated_at_ms=excluded.updated_at_ms",
        params![SCHEMA_VERSION, now_ms],
    )?;
    Ok(())
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis()
        .min(i64::MAX as u128) as i64
}

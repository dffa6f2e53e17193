#![forbid(unsafe_code)]

//! Read-only queries over committed rows.

use rd_core::{
    ContentRecord, NodeId, NodeKind, NodeRecord, Predecessor, PredecessorType, RevisionInfo,
    Revnum,
};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::StoreError;

const NODE_COLUMNS: &str =
    "id, rev_min, rev_max, parent, predecessor, predecessor_type, name, path, node_type";

/// Point-in-time lookups. Implemented by the store for committed state and by
/// an open revision transaction, which sees the same rows until it writes.
pub trait PointInTime {
    /// Most recent row for `path` with `rev_min <= revision`, whether or not it
    /// was still live at `revision`.
    fn lookup_path(&self, path: &str, revision: Revnum) -> Result<Option<NodeRecord>, StoreError>;

    /// Rows under `parent` whose window covers `revision`, ordered by name.
    fn children(&self, parent: NodeId, revision: Revnum) -> Result<Vec<NodeRecord>, StoreError>;

    fn resolve_path(&self, path: &str, revision: Revnum) -> Result<NodeId, StoreError> {
        self.lookup_path(path, revision)?
            .map(|record| record.id)
            .ok_or_else(|| StoreError::PathNotFound {
                path: path.to_string(),
                revision,
            })
    }
}

pub(crate) fn lookup_path(
    conn: &Connection,
    path: &str,
    revision: Revnum,
) -> Result<Option<NodeRecord>, StoreError> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {NODE_COLUMNS} FROM node WHERE path=?1 AND rev_min<=?2 \
         ORDER BY rev_min DESC, id DESC LIMIT 1"
    ))?;
    let mut rows = stmt.query(params![path, revision.get()])?;
    match rows.next()? {
        Some(row) => Ok(Some(read_node(row)?)),
        None => Ok(None),
    }
}

/// Strict variant: the row whose window covers `revision`.
pub(crate) fn node_at(
    conn: &Connection,
    path: &str,
    revision: Revnum,
) -> Result<Option<NodeRecord>, StoreError> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {NODE_COLUMNS} FROM node WHERE path=?1 AND rev_min<=?2 AND ?2<=rev_max \
         ORDER BY rev_min DESC, id DESC LIMIT 1"
    ))?;
    let mut rows = stmt.query(params![path, revision.get()])?;
    match rows.next()? {
        Some(row) => Ok(Some(read_node(row)?)),
        None => Ok(None),
    }
}

pub(crate) fn children(
    conn: &Connection,
    parent: NodeId,
    revision: Revnum,
) -> Result<Vec<NodeRecord>, StoreError> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {NODE_COLUMNS} FROM node WHERE parent=?1 AND rev_min<=?2 AND ?2<=rev_max \
         ORDER BY name ASC, id ASC"
    ))?;
    collect_nodes(stmt.query(params![parent.get(), revision.get()])?)
}

pub(crate) fn node(conn: &Connection, id: NodeId) -> Result<Option<NodeRecord>, StoreError> {
    let mut stmt = conn.prepare_cached(&format!("SELECT {NODE_COLUMNS} FROM node WHERE id=?1"))?;
    let mut rows = stmt.query(params![id.get()])?;
    match rows.next()? {
        Some(row) => Ok(Some(read_node(row)?)),
        None => Ok(None),
    }
}

pub(crate) fn path_history(conn: &Connection, path: &str) -> Result<Vec<NodeRecord>, StoreError> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {NODE_COLUMNS} FROM node WHERE path=?1 ORDER BY rev_min ASC, id ASC"
    ))?;
    collect_nodes(stmt.query(params![path])?)
}

/// Every live row, parents before children.
pub(crate) fn live_nodes(conn: &Connection) -> Result<Vec<NodeRecord>, StoreError> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {NODE_COLUMNS} FROM node WHERE rev_max=?1 ORDER BY path ASC"
    ))?;
    // BINARY collation sorts every path after its own prefixes.
    collect_nodes(stmt.query(params![Revnum::HEAD.get()])?)
}

pub(crate) fn content_history(
    conn: &Connection,
    node: NodeId,
) -> Result<Vec<ContentRecord>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT node, rev_min, rev_max, data FROM content WHERE node=?1 ORDER BY rev_min ASC",
    )?;
    let mut rows = stmt.query(params![node.get()])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(ContentRecord {
            node: NodeId::new(row.get(0)?),
            rev_min: Revnum::new(row.get(1)?),
            rev_max: Revnum::new(row.get(2)?),
            data: row.get(3)?,
        });
    }
    Ok(out)
}

pub(crate) fn revision(conn: &Connection, id: Revnum) -> Result<Option<RevisionInfo>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT id, author, date_ms, message FROM revision WHERE id=?1",
            params![id.get()],
            |row| {
                Ok(RevisionInfo {
                    id: Revnum::new(row.get(0)?),
                    author: row.get(1)?,
                    date_ms: row.get(2)?,
                    message: row.get(3)?,
                })
            },
        )
        .optional()?)
}

pub(crate) fn last_revision(conn: &Connection) -> Result<Option<Revnum>, StoreError> {
    let max = conn.query_row("SELECT MAX(id) FROM revision", [], |row| {
        row.get::<_, Option<i64>>(0)
    })?;
    Ok(max.map(Revnum::new))
}

pub(crate) fn max_node_id(conn: &Connection) -> Result<NodeId, StoreError> {
    let max = conn.query_row("SELECT MAX(id) FROM node", [], |row| {
        row.get::<_, Option<i64>>(0)
    })?;
    Ok(NodeId::new(max.unwrap_or(0)))
}

fn collect_nodes(mut rows: rusqlite::Rows<'_>) -> Result<Vec<NodeRecord>, StoreError> {
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(read_node(row)?);
    }
    Ok(out)
}

fn read_node(row: &Row<'_>) -> Result<NodeRecord, StoreError> {
    let predecessor_id: Option<i64> = row.get(4)?;
    let predecessor_type: Option<String> = row.get(5)?;
    let predecessor = match (predecessor_id, predecessor_type) {
        (Some(id), Some(kind)) => Some(Predecessor {
            id: NodeId::new(id),
            kind: PredecessorType::parse(&kind)?,
        }),
        (None, None) => None,
        _ => return Err(StoreError::InvalidInput("predecessor without type")),
    };
    let node_type: String = row.get(8)?;

    Ok(NodeRecord {
        id: NodeId::new(row.get(0)?),
        rev_min: Revnum::new(row.get(1)?),
        rev_max: Revnum::new(row.get(2)?),
        parent: NodeId::new(row.get(3)?),
        predecessor,
        name: row.get(6)?,
        path: row.get(7)?,
        kind: NodeKind::parse(&node_type)?,
    })
}

#![forbid(unsafe_code)]

use rd_core::{NodeId, NodeRecord, RevisionInfo, Revnum};
use rusqlite::{Statement, params};

use super::StoreError;
use super::batch::BatchRow;

pub struct RevisionInsert(pub RevisionInfo);

impl BatchRow for RevisionInsert {
    const SQL: &'static str =
        "INSERT INTO revision(id, author, date_ms, message) VALUES (?1, ?2, ?3, ?4)";

    fn execute(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<usize> {
        let info = &self.0;
        stmt.execute(params![
            info.id.get(),
            info.author,
            info.date_ms,
            info.message
        ])
    }
}

pub struct NodeInsert(pub NodeRecord);

impl BatchRow for NodeInsert {
    const SQL: &'static str = "INSERT INTO node(id, rev_min, rev_max, parent, predecessor, predecessor_type, name, path, node_type) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";

    fn execute(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<usize> {
        let node = &self.0;
        stmt.execute(params![
            node.id.get(),
            node.rev_min.get(),
            node.rev_max.get(),
            node.parent.get(),
            node.predecessor.map(|p| p.id.get()),
            node.predecessor.map(|p| p.kind.as_str()),
            node.name,
            node.path,
            node.kind.as_str(),
        ])
    }
}

/// Closes a live node window at `rev_max`.
pub struct NodeOutdate {
    pub node: NodeId,
    pub rev_max: Revnum,
}

impl BatchRow for NodeOutdate {
    const SQL: &'static str = "UPDATE node SET rev_max=?2 WHERE id=?1 AND rev_max=?3 AND rev_min<=?2";

    fn execute(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<usize> {
        stmt.execute(params![
            self.node.get(),
            self.rev_max.get(),
            Revnum::HEAD.get()
        ])
    }

    fn verify(&self, changed: usize) -> Result<(), StoreError> {
        if changed == 1 {
            Ok(())
        } else {
            Err(StoreError::NoLiveRow { node: self.node })
        }
    }
}

pub struct ContentInsert {
    pub node: NodeId,
    pub rev_min: Revnum,
    pub data: Option<String>,
}

impl BatchRow for ContentInsert {
    const SQL: &'static str =
        "INSERT INTO content(node, rev_min, rev_max, data) VALUES (?1, ?2, ?3, ?4)";

    fn execute(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<usize> {
        stmt.execute(params![
            self.node.get(),
            self.rev_min.get(),
            Revnum::HEAD.get(),
            self.data
        ])
    }
}

/// Closes the live content window of a node, if it has one. Rows opened after
/// `rev_max` are left alone, so outdates and inserts may flush in any order.
pub struct ContentOutdate {
    pub node: NodeId,
    pub rev_max: Revnum,
}

impl BatchRow for ContentOutdate {
    const SQL: &'static str = "UPDATE content SET rev_max=?2 WHERE node=?1 AND rev_max=?3 AND rev_min<=?2";

    fn execute(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<usize> {
        stmt.execute(params![
            self.node.get(),
            self.rev_max.get(),
            Revnum::HEAD.get()
        ])
    }
}

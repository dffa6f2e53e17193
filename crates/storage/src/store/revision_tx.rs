#![forbid(unsafe_code)]

use rd_core::{NodeId, NodeRecord, RevisionInfo, Revnum};
use rusqlite::Transaction;

use super::StoreError;
use super::batch::BatchWriter;
use super::lookup::{self, PointInTime};
use super::rows::{ContentInsert, ContentOutdate, NodeInsert, NodeOutdate, RevisionInsert};

/// One revision's worth of writes in a single store transaction.
///
/// Dropping it without [`RevisionTx::commit`] rolls every row of the revision back.
pub struct RevisionTx<'s> {
    tx: Transaction<'s>,
    revision: Revnum,
    batch_size: usize,
}

impl<'s> RevisionTx<'s> {
    pub(crate) fn new(tx: Transaction<'s>, revision: Revnum, batch_size: usize) -> Self {
        Self {
            tx,
            revision,
            batch_size,
        }
    }

    pub fn revision(&self) -> Revnum {
        self.revision
    }

    pub fn insert_revision(&self, info: &RevisionInfo) -> Result<(), StoreError> {
        if info.id != self.revision {
            return Err(StoreError::InvalidInput(
                "revision row does not match the open transaction",
            ));
        }
        let mut writer = BatchWriter::new(&self.tx, self.batch_size);
        writer.add(RevisionInsert(info.clone()))?;
        writer.close()?;
        Ok(())
    }

    pub fn writers(&self) -> RevisionWriters<'_> {
        RevisionWriters {
            revision: self.revision,
            content_outdates: BatchWriter::new(&self.tx, self.batch_size),
            node_outdates: BatchWriter::new(&self.tx, self.batch_size),
            node_inserts: BatchWriter::new(&self.tx, self.batch_size),
            content_inserts: BatchWriter::new(&self.tx, self.batch_size),
        }
    }

    pub fn commit(self) -> Result<(), StoreError> {
        self.tx.commit()?;
        Ok(())
    }
}

impl PointInTime for RevisionTx<'_> {
    fn lookup_path(&self, path: &str, revision: Revnum) -> Result<Option<NodeRecord>, StoreError> {
        lookup::lookup_path(&self.tx, path, revision)
    }

    fn children(&self, parent: NodeId, revision: Revnum) -> Result<Vec<NodeRecord>, StoreError> {
        lookup::children(&self.tx, parent, revision)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteCounts {
    pub content_outdates: usize,
    pub node_outdates: usize,
    pub node_inserts: usize,
    pub content_inserts: usize,
}

/// The batched writers a revision drains its schedule into.
pub struct RevisionWriters<'c> {
    revision: Revnum,
    content_outdates: BatchWriter<'c, ContentOutdate>,
    node_outdates: BatchWriter<'c, NodeOutdate>,
    node_inserts: BatchWriter<'c, NodeInsert>,
    content_inserts: BatchWriter<'c, ContentInsert>,
}

impl RevisionWriters<'_> {
    /// Closes the node's window (and its content's, for files) at the previous revision.
    pub fn outdate_node(&mut self, node: NodeId, is_file: bool) -> Result<(), StoreError> {
        let rev_max = self.revision.prev();
        if is_file {
            self.content_outdates.add(ContentOutdate { node, rev_max })?;
        }
        self.node_outdates.add(NodeOutdate { node, rev_max })
    }

    pub fn insert_node(&mut self, record: NodeRecord) -> Result<(), StoreError> {
        if record.rev_min != self.revision || !record.rev_max.is_head() {
            return Err(StoreError::InvalidInput(
                "inserted nodes must open at the current revision",
            ));
        }
        self.node_inserts.add(NodeInsert(record))
    }

    pub fn insert_content(&mut self, node: NodeId, data: Option<String>) -> Result<(), StoreError> {
        self.content_inserts.add(ContentInsert {
            node,
            rev_min: self.revision,
            data,
        })
    }

    /// Replaces the live content row of a file that already existed.
    pub fn replace_content(&mut self, node: NodeId, data: Option<String>) -> Result<(), StoreError> {
        self.content_outdates.add(ContentOutdate {
            node,
            rev_max: self.revision.prev(),
        })?;
        self.insert_content(node, data)
    }

    pub fn close(self) -> Result<WriteCounts, StoreError> {
        Ok(WriteCounts {
            content_outdates: self.content_outdates.close()?,
            node_outdates: self.node_outdates.close()?,
            node_inserts: self.node_inserts.close()?,
            content_inserts: self.content_inserts.close()?,
        })
    }
}

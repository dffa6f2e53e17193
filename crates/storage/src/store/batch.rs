#![forbid(unsafe_code)]

use rusqlite::{Connection, Statement};

use super::StoreError;

pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// A row a [`BatchWriter`] can submit: the statement it runs and how it binds.
pub trait BatchRow {
    const SQL: &'static str;

    fn execute(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<usize>;

    /// Checks the affected-row count reported by `execute`.
    fn verify(&self, _changed: usize) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Buffers rows and executes them in batches of `batch_size`.
///
/// Rows reach the connection in the order they were added. Rows still
/// buffered when the writer is dropped are lost, so callers end with
/// [`BatchWriter::close`].
pub struct BatchWriter<'c, R: BatchRow> {
    conn: &'c Connection,
    batch_size: usize,
    pending: Vec<R>,
    written: usize,
}

impl<'c, R: BatchRow> BatchWriter<'c, R> {
    pub fn new(conn: &'c Connection, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            conn,
            batch_size,
            pending: Vec::with_capacity(batch_size.min(DEFAULT_BATCH_SIZE)),
            written: 0,
        }
    }

    pub fn add(&mut self, row: R) -> Result<(), StoreError> {
        self.pending.push(row);
        if self.pending.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Executes whatever is buffered, returning the number of rows submitted.
    pub fn flush(&mut self) -> Result<usize, StoreError> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        let mut stmt = self.conn.prepare_cached(R::SQL)?;
        let count = self.pending.len();
        for row in self.pending.drain(..) {
            let changed = row.execute(&mut stmt)?;
            row.verify(changed)?;
        }
        self.written += count;
        tracing::debug!(rows = count, sql = R::SQL, "batch flushed");
        Ok(count)
    }

    /// Flushes and releases the writer, returning the total number of rows written.
    pub fn close(mut self) -> Result<usize, StoreError> {
        self.flush()?;
        Ok(self.written)
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

impl<R: BatchRow> Drop for BatchWriter<'_, R> {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            tracing::warn!(
                rows = self.pending.len(),
                sql = R::SQL,
                "batch writer dropped with unflushed rows"
            );
        }
    }
}

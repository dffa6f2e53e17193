#![forbid(unsafe_code)]

use rd_core::{ChangeSet, CurrentTree, NodeId, Revnum};
use rd_storage::{SqliteStore, WriteCounts};

use crate::config::DEFAULT_MAX_RETRIES;
use crate::error::{IndexError, Violation};
use crate::feed::ChangeFeed;
use crate::ingest::{Ingestor, RevisionPlan};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevisionSummary {
    pub revision: Revnum,
    pub events: usize,
    pub nodes_created: usize,
    pub nodes_outdated: usize,
    pub contents_modified: usize,
    pub discarded: usize,
    pub rows: WriteCounts,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RevisionOutcome {
    /// Already committed by an earlier run.
    Skipped,
    Committed(RevisionSummary),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub committed: usize,
    pub skipped: usize,
    pub retries: usize,
    pub nodes_created: usize,
    pub nodes_outdated: usize,
    pub contents_modified: usize,
    pub last_revision: Option<Revnum>,
}

impl RunSummary {
    fn record(&mut self, revision: &RevisionSummary) {
        self.committed += 1;
        self.nodes_created += revision.nodes_created;
        self.nodes_outdated += revision.nodes_outdated;
        self.contents_modified += revision.contents_modified;
        self.last_revision = Some(revision.revision);
    }
}

/// Drives the store and the ingestor one revision at a time.
///
/// Each revision is written in a single store transaction. A revision that
/// fails leaves nothing behind in the store, and the in-memory tree is
/// rebuilt from the store before the next attempt.
pub struct Indexer {
    store: SqliteStore,
    ingestor: Ingestor,
    /// Highest revision committed before this run started.
    resume_after: Option<Revnum>,
    last_revision: Option<Revnum>,
    max_retries: u32,
    diverged: bool,
}

impl Indexer {
    pub fn open(store: SqliteStore) -> Result<Self, IndexError> {
        let resume_after = store.last_revision()?;
        let mut indexer = Self {
            store,
            ingestor: Ingestor::default(),
            resume_after,
            last_revision: resume_after,
            max_retries: DEFAULT_MAX_RETRIES,
            diverged: false,
        };
        indexer.recover()?;
        Ok(indexer)
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn current_tree(&self) -> &CurrentTree {
        self.ingestor.tree()
    }

    pub fn last_revision(&self) -> Option<Revnum> {
        self.last_revision
    }

    /// Rebuilds the current tree from the live rows of the store.
    ///
    /// Id allocation never moves backwards within a run, even past ids that
    /// were handed out to a rolled-back revision.
    pub fn recover(&mut self) -> Result<(), IndexError> {
        let live = self.store.live_nodes()?;
        let tree = CurrentTree::from_records(live)?;
        let last_id = self.store.max_node_id()?.max(self.ingestor.last_id());
        tracing::info!(
            live_nodes = tree.len(),
            last_id = last_id.get(),
            "current tree rebuilt from store"
        );
        self.ingestor = Ingestor::new(tree, last_id);
        self.last_revision = self.store.last_revision()?;
        self.diverged = false;
        Ok(())
    }

    pub fn index_revision(&mut self, change_set: &ChangeSet) -> Result<RevisionOutcome, IndexError> {
        let revision = change_set.id();
        if revision.get() < 1 || revision.is_head() {
            return Err(Violation::InvalidRevision(revision).into());
        }
        if self.diverged {
            self.recover()?;
        }

        if let Some(resume_after) = self.resume_after {
            if revision <= resume_after && self.last_revision == Some(resume_after) {
                tracing::debug!(revision = revision.get(), "already indexed, skipping");
                return Ok(RevisionOutcome::Skipped);
            }
        }
        if let Some(last) = self.last_revision {
            if revision <= last {
                return Err(Violation::OutOfOrder {
                    last,
                    got: revision,
                }
                .into());
            }
        }

        match self.write_revision(change_set) {
            Ok(summary) => {
                self.last_revision = Some(revision);
                tracing::info!(
                    revision = revision.get(),
                    events = summary.events,
                    created = summary.nodes_created,
                    outdated = summary.nodes_outdated,
                    modified = summary.contents_modified,
                    "revision committed"
                );
                Ok(RevisionOutcome::Committed(summary))
            }
            Err(err) => {
                self.diverged = true;
                Err(err)
            }
        }
    }

    fn write_revision(&mut self, change_set: &ChangeSet) -> Result<RevisionSummary, IndexError> {
        let revision = change_set.id();
        let tx = self.store.begin_revision(revision)?;
        tx.insert_revision(&change_set.revision)?;

        self.ingestor.apply(change_set, &tx)?;
        let RevisionPlan {
            outdated,
            created,
            modified,
            discarded,
            ..
        } = self.ingestor.take_plan()?;

        let mut writers = tx.writers();
        for (node, kind) in &outdated {
            writers.outdate_node(*node, kind.is_file())?;
        }
        let nodes_created = created.len();
        for node in created {
            let id: NodeId = node.record.id;
            writers.insert_node(node.record)?;
            if let Some(content) = node.content {
                writers.insert_content(id, content.data)?;
            }
        }
        let contents_modified = modified.len();
        for (node, content) in modified {
            writers.replace_content(node, content.data)?;
        }
        let rows = writers.close()?;
        tx.commit()?;

        Ok(RevisionSummary {
            revision,
            events: change_set.changes.len(),
            nodes_created,
            nodes_outdated: outdated.len(),
            contents_modified,
            discarded,
            rows,
        })
    }

    /// Indexes every change-set of `feed`, retrying revisions that failed on
    /// store I/O up to `max_retries` times. Any other error stops the run.
    pub fn run(&mut self, feed: &mut impl ChangeFeed) -> Result<RunSummary, IndexError> {
        let mut summary = RunSummary {
            last_revision: self.last_revision,
            ..RunSummary::default()
        };

        while let Some(change_set) = feed.next_change_set()? {
            let revision = change_set.id();
            let mut attempt = 0u32;
            loop {
                match self.index_revision(&change_set) {
                    Ok(RevisionOutcome::Skipped) => {
                        summary.skipped += 1;
                        break;
                    }
                    Ok(RevisionOutcome::Committed(committed)) => {
                        summary.record(&committed);
                        break;
                    }
                    Err(err) if err.is_retryable() && attempt < self.max_retries => {
                        attempt += 1;
                        summary.retries += 1;
                        tracing::warn!(
                            revision = revision.get(),
                            attempt,
                            error = %err,
                            "revision rolled back, retrying"
                        );
                        self.recover()?;
                    }
                    Err(err) => {
                        tracing::error!(
                            revision = revision.get(),
                            fatal = err.is_fatal(),
                            error = %err,
                            "indexing stopped"
                        );
                        return Err(err);
                    }
                }
            }
        }

        tracing::info!(
            committed = summary.committed,
            skipped = summary.skipped,
            retries = summary.retries,
            "feed exhausted"
        );
        Ok(summary)
    }
}

#![forbid(unsafe_code)]

//! Applies change-sets to the current tree and schedules the row mutations
//! they imply. Nothing here writes to the store; see [`crate::Indexer`].

use std::collections::{BTreeMap, HashSet};

use rd_core::{
    ChangeSet, ChangeType, CopySource, CurrentTree, NewNode, NodeId, NodeKind, NodeRecord,
    PathChange, Predecessor, PredecessorType, Revnum, TreeError, join_path, normalize_path,
    paths::ROOT_PATH,
};
use rd_storage::PointInTime;

use crate::error::{IndexError, Violation};

/// Body of a content row about to be inserted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentBody {
    pub data: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedNode {
    pub record: NodeRecord,
    /// Initial content row, for files only.
    pub content: Option<ContentBody>,
}

/// Row mutations of one revision, in the order they are written.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RevisionPlan {
    pub revision: Option<Revnum>,
    pub outdated: Vec<(NodeId, NodeKind)>,
    pub created: Vec<CreatedNode>,
    pub modified: Vec<(NodeId, ContentBody)>,
    /// Nodes created and deleted within the revision; they leave no row.
    pub discarded: usize,
}

#[derive(Debug, Default)]
struct Schedule {
    revision: Option<Revnum>,
    outdated: Vec<(NodeId, NodeKind)>,
    created: Vec<NodeId>,
    created_set: HashSet<NodeId>,
    synthesized: HashSet<NodeId>,
    content: BTreeMap<NodeId, ContentBody>,
    discarded: usize,
}

impl Schedule {
    fn create(&mut self, id: NodeId) {
        self.created.push(id);
        self.created_set.insert(id);
    }

    /// Forgets a node created in this revision. Returns false if it predates it.
    fn discard(&mut self, id: NodeId) -> bool {
        if !self.created_set.remove(&id) {
            return false;
        }
        // `created` keeps the id; `take_plan` skips ids no longer in `created_set`.
        self.synthesized.remove(&id);
        self.discarded += 1;
        true
    }

    fn is_empty(&self) -> bool {
        self.outdated.is_empty() && self.created_set.is_empty() && self.content.is_empty()
    }
}

#[derive(Clone, Copy, Debug)]
struct ResolvedSource {
    id: NodeId,
    kind: NodeKind,
}

#[derive(Debug)]
pub struct Ingestor {
    tree: CurrentTree,
    last_id: NodeId,
    schedule: Schedule,
}

impl Default for Ingestor {
    fn default() -> Self {
        Self::new(CurrentTree::new(), NodeId::ROOT)
    }
}

impl Ingestor {
    /// `last_id` is the highest id ever handed out; allocation continues after it.
    pub fn new(tree: CurrentTree, last_id: NodeId) -> Self {
        Self {
            tree,
            last_id,
            schedule: Schedule::default(),
        }
    }

    pub fn tree(&self) -> &CurrentTree {
        &self.tree
    }

    pub fn last_id(&self) -> NodeId {
        self.last_id
    }

    /// Applies every event of `change_set` to the cache. Copy sources not
    /// answerable from the cache are resolved through `lookup`.
    pub fn apply(
        &mut self,
        change_set: &ChangeSet,
        lookup: &impl PointInTime,
    ) -> Result<(), IndexError> {
        let revision = change_set.id();
        if revision.get() < 1 || revision.is_head() {
            return Err(Violation::InvalidRevision(revision).into());
        }
        if !self.schedule.is_empty() {
            return Err(Violation::InvalidEvent {
                path: ROOT_PATH.to_string(),
                reason: "previous revision was never planned",
            }
            .into());
        }
        self.schedule.revision = Some(revision);

        let mut changes = change_set
            .changes
            .iter()
            .map(|change| Ok((normalize_path(&change.path)?, change)))
            .collect::<Result<Vec<_>, IndexError>>()?;
        // Parents sort before their descendants.
        changes.sort_by(|a, b| a.0.cmp(&b.0));

        for (path, change) in changes {
            tracing::debug!(
                revision = revision.get(),
                path = %path,
                change = %change.change.code(),
                "apply"
            );
            self.apply_change(revision, &path, change, lookup)?;
        }
        Ok(())
    }

    fn apply_change(
        &mut self,
        revision: Revnum,
        path: &str,
        change: &PathChange,
        lookup: &impl PointInTime,
    ) -> Result<(), IndexError> {
        if path == ROOT_PATH {
            return match change.change {
                ChangeType::Modified => Ok(()),
                _ => Err(Violation::InvalidEvent {
                    path: path.to_string(),
                    reason: "the repository root can only be modified",
                }
                .into()),
            };
        }

        match change.change {
            ChangeType::Modified => self.modify(path, change),
            ChangeType::Deleted => self.delete(path),
            ChangeType::Added => {
                let synthesized = self
                    .tree
                    .find(path)
                    .is_some_and(|node| self.schedule.synthesized.contains(&node.id()));
                if synthesized {
                    tracing::debug!(path, "re-added path inside a fresh copy, replacing");
                    self.delete(path)?;
                }
                self.add(revision, path, change, lookup)
            }
            ChangeType::Replaced => {
                self.delete(path)?;
                self.add(revision, path, change, lookup)
            }
        }
    }

    fn modify(&mut self, path: &str, change: &PathChange) -> Result<(), IndexError> {
        let node = self.tree.get_current_node(path)?;
        if !node.kind().is_file() {
            // Property-only changes on directories are not indexed.
            return Ok(());
        }
        self.schedule.content.insert(
            node.id(),
            ContentBody {
                data: change.data_ref.clone(),
            },
        );
        Ok(())
    }

    fn delete(&mut self, path: &str) -> Result<(), IndexError> {
        for child in self.tree.child_paths(path)? {
            self.delete(&child)?;
        }

        let node = self.tree.drop_current_node(path)?;
        let id = node.id();
        self.schedule.content.remove(&id);
        if !self.schedule.discard(id) {
            self.schedule.outdated.push((id, node.kind()));
        }
        Ok(())
    }

    fn add(
        &mut self,
        revision: Revnum,
        path: &str,
        change: &PathChange,
        lookup: &impl PointInTime,
    ) -> Result<(), IndexError> {
        let source = match &change.copy_from {
            Some(copy_from) => Some(self.resolve_source(revision, copy_from, lookup)?),
            None => None,
        };
        let kind = match (change.kind, source) {
            (NodeKind::Unknown, Some(source)) => source.kind,
            (kind, _) => kind,
        };

        let id = self.allocate();
        self.tree.create_node(NewNode {
            id,
            rev_min: revision,
            path: path.to_string(),
            kind,
            predecessor: source.map(|source| Predecessor {
                id: source.id,
                kind: PredecessorType::Copy,
            }),
        })?;
        self.schedule.create(id);

        if kind.is_file() && change.data_ref.is_some() {
            self.schedule.content.insert(
                id,
                ContentBody {
                    data: change.data_ref.clone(),
                },
            );
        }

        if let (Some(source), Some(copy_from)) = (source, &change.copy_from) {
            if kind.is_dir() {
                self.deep_copy(revision, path, source.id, copy_from.revision, lookup)?;
            }
        }
        Ok(())
    }

    fn resolve_source(
        &self,
        revision: Revnum,
        copy_from: &CopySource,
        lookup: &impl PointInTime,
    ) -> Result<ResolvedSource, IndexError> {
        let path = normalize_path(&copy_from.path)?;
        if copy_from.revision.get() < 1 || copy_from.revision >= revision {
            return Err(Violation::InvalidEvent {
                path,
                reason: "copy source revision must precede the revision being indexed",
            }
            .into());
        }

        // Live since before the copy revision means it was the node at that revision.
        if let Some(node) = self.tree.find(&path) {
            if node.rev_min() <= copy_from.revision {
                return Ok(ResolvedSource {
                    id: node.id(),
                    kind: node.kind(),
                });
            }
        }

        match lookup.lookup_path(&path, copy_from.revision)? {
            Some(record) if record.covers(copy_from.revision) => Ok(ResolvedSource {
                id: record.id,
                kind: record.kind,
            }),
            _ => Err(Violation::PredecessorUnresolved {
                path,
                revision: copy_from.revision,
            }
            .into()),
        }
    }

    /// Recreates the subtree of `source` as of `copy_revision` under `target_path`.
    fn deep_copy(
        &mut self,
        revision: Revnum,
        target_path: &str,
        source: NodeId,
        copy_revision: Revnum,
        lookup: &impl PointInTime,
    ) -> Result<(), IndexError> {
        for child in lookup.children(source, copy_revision)? {
            let id = self.allocate();
            let path = join_path(target_path, &child.name);
            self.tree.create_node(NewNode {
                id,
                rev_min: revision,
                path: path.clone(),
                kind: child.kind,
                predecessor: Some(Predecessor {
                    id: child.id,
                    kind: PredecessorType::Inherit,
                }),
            })?;
            self.schedule.create(id);
            self.schedule.synthesized.insert(id);

            if child.kind.is_dir() {
                self.deep_copy(revision, &path, child.id, copy_revision, lookup)?;
            }
        }
        Ok(())
    }

    fn allocate(&mut self) -> NodeId {
        self.last_id = self.last_id.next();
        self.last_id
    }

    /// Drains the schedule into the rows the revision must write.
    pub fn take_plan(&mut self) -> Result<RevisionPlan, IndexError> {
        let mut schedule = std::mem::take(&mut self.schedule);

        let mut created = Vec::with_capacity(schedule.created_set.len());
        for id in schedule.created {
            if !schedule.created_set.contains(&id) {
                continue;
            }
            let node = self.tree.node(id).ok_or(TreeError::UnknownNode(id))?;
            let content = if node.kind().is_file() {
                match schedule.content.remove(&id) {
                    Some(body) => Some(body),
                    None if node.predecessor().is_none() => Some(ContentBody { data: None }),
                    None => None,
                }
            } else {
                None
            };
            created.push(CreatedNode {
                record: node.to_record(),
                content,
            });
        }

        Ok(RevisionPlan {
            revision: schedule.revision,
            outdated: schedule.outdated,
            created,
            modified: schedule.content.into_iter().collect(),
            discarded: schedule.discarded,
        })
    }
}

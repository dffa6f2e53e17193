#![forbid(unsafe_code)]

//! Arena of live nodes keyed by id, with a path index over the same nodes.

mod node;

pub use node::Node;

use std::collections::HashMap;

use crate::change::{NodeKind, NodeRecord, Predecessor};
use crate::ids::{NodeId, Revnum};
use crate::paths::{PathError, ROOT_PATH, join_path, split_path};

/// Raised when the cache no longer agrees with the history it was fed.
/// None of these are recoverable.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("no current node at {path}")]
    NodeNotFound { path: String },
    #[error("node {0} is not in the current tree")]
    UnknownNode(NodeId),
    #[error("node id {0} is already allocated")]
    DuplicateId(NodeId),
    #[error("{parent} already has a child named {name:?}")]
    DuplicateChild { parent: String, name: String },
    #[error("{name:?} is not a child of {parent}")]
    NotAChild { parent: String, name: String },
    #[error("{path} still has {count} live children")]
    HasChildren { path: String, count: usize },
    #[error("{path} is not a directory")]
    NotADirectory { path: String },
    #[error("node {id} at {path} names parent {expected} but {actual} is current")]
    ParentMismatch {
        id: NodeId,
        path: String,
        expected: NodeId,
        actual: NodeId,
    },
    #[error("the repository root cannot be replaced or removed")]
    RootImmutable,
    #[error(transparent)]
    Path(#[from] PathError),
}

/// Input to [`CurrentTree::create_node`]; the parent is resolved from `path`.
#[derive(Clone, Debug)]
pub struct NewNode {
    pub id: NodeId,
    pub rev_min: Revnum,
    pub path: String,
    pub kind: NodeKind,
    pub predecessor: Option<Predecessor>,
}

#[derive(Debug)]
pub struct CurrentTree {
    nodes: HashMap<NodeId, Node>,
    by_path: HashMap<String, NodeId>,
}

impl Default for CurrentTree {
    fn default() -> Self {
        Self::new()
    }
}

impl CurrentTree {
    pub fn new() -> Self {
        let root = Node::root();
        let mut nodes = HashMap::new();
        let mut by_path = HashMap::new();
        by_path.insert(ROOT_PATH.to_string(), root.id());
        nodes.insert(root.id(), root);
        Self { nodes, by_path }
    }

    /// Rebuilds a tree from committed live rows. Rows must come parents-first
    /// (ascending path order guarantees it).
    pub fn from_records(records: impl IntoIterator<Item = NodeRecord>) -> Result<Self, TreeError> {
        let mut tree = Self::new();
        for record in records {
            let expected = record.parent;
            let node = tree.create_node(NewNode {
                id: record.id,
                rev_min: record.rev_min,
                path: record.path,
                kind: record.kind,
                predecessor: record.predecessor,
            })?;
            if node.parent() != expected {
                return Err(TreeError::ParentMismatch {
                    id: node.id(),
                    path: node.path().to_string(),
                    expected,
                    actual: node.parent(),
                });
            }
        }
        Ok(tree)
    }

    /// Number of live nodes, the root excluded.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn find(&self, path: &str) -> Option<&Node> {
        self.by_path.get(path).and_then(|id| self.nodes.get(id))
    }

    pub fn get_current_node(&self, path: &str) -> Result<&Node, TreeError> {
        self.find(path).ok_or_else(|| TreeError::NodeNotFound {
            path: path.to_string(),
        })
    }

    /// Live nodes other than the root, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(|node| !node.is_root())
    }

    pub fn child_paths(&self, path: &str) -> Result<Vec<String>, TreeError> {
        let node = self.get_current_node(path)?;
        Ok(node
            .children()
            .map(|(name, _)| join_path(node.path(), name))
            .collect())
    }

    pub fn create_node(&mut self, new: NewNode) -> Result<&Node, TreeError> {
        if self.nodes.contains_key(&new.id) {
            return Err(TreeError::DuplicateId(new.id));
        }
        let (parent_path, name) = split_path(&new.path)?;
        let parent = self.get_current_node(parent_path)?;
        if !parent.kind().is_dir() {
            return Err(TreeError::NotADirectory {
                path: parent.path().to_string(),
            });
        }
        let parent_id = parent.id();
        let name = name.to_string();

        self.add_child(parent_id, &name, new.id)?;
        let node = Node::new(
            new.id,
            new.rev_min,
            parent_id,
            name,
            new.path.clone(),
            new.kind,
            new.predecessor,
        );
        self.by_path.insert(new.path, new.id);
        Ok(self.nodes.entry(new.id).or_insert(node))
    }

    /// Removes a childless live node from the arena, its parent and the path index.
    pub fn drop_current_node(&mut self, path: &str) -> Result<Node, TreeError> {
        let node = self.get_current_node(path)?;
        if node.is_root() {
            return Err(TreeError::RootImmutable);
        }
        if node.child_count() > 0 {
            return Err(TreeError::HasChildren {
                path: path.to_string(),
                count: node.child_count(),
            });
        }
        let (id, parent, name) = (node.id(), node.parent(), node.name().to_string());

        self.remove_child(parent, &name)?;
        self.by_path.remove(path);
        self.nodes.remove(&id).ok_or(TreeError::UnknownNode(id))
    }

    pub fn add_child(&mut self, parent: NodeId, name: &str, child: NodeId) -> Result<(), TreeError> {
        let parent_node = self
            .nodes
            .get_mut(&parent)
            .ok_or(TreeError::UnknownNode(parent))?;
        if parent_node.children.contains_key(name) {
            return Err(TreeError::DuplicateChild {
                parent: parent_node.path().to_string(),
                name: name.to_string(),
            });
        }
        parent_node.children.insert(name.to_string(), child);
        Ok(())
    }

    pub fn remove_child(&mut self, parent: NodeId, name: &str) -> Result<NodeId, TreeError> {
        let parent_node = self
            .nodes
            .get_mut(&parent)
            .ok_or(TreeError::UnknownNode(parent))?;
        parent_node
            .children
            .remove(name)
            .ok_or_else(|| TreeError::NotAChild {
                parent: parent_node.path().to_string(),
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests;

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use crate::change::{NodeKind, NodeRecord, Predecessor};
use crate::ids::{NodeId, Revnum};
use crate::paths::ROOT_PATH;

/// A live entry of the current tree.
///
/// `parent` and `children` are ids resolved through the owning [`super::CurrentTree`];
/// they are only meaningful while the node is live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    id: NodeId,
    rev_min: Revnum,
    parent: NodeId,
    name: String,
    path: String,
    kind: NodeKind,
    predecessor: Option<Predecessor>,
    pub(super) children: BTreeMap<String, NodeId>,
}

impl Node {
    pub(super) fn root() -> Self {
        Self {
            id: NodeId::ROOT,
            rev_min: Revnum::new(0),
            parent: NodeId::ROOT,
            name: String::new(),
            path: ROOT_PATH.to_string(),
            kind: NodeKind::Dir,
            predecessor: None,
            children: BTreeMap::new(),
        }
    }

    pub(super) fn new(
        id: NodeId,
        rev_min: Revnum,
        parent: NodeId,
        name: String,
        path: String,
        kind: NodeKind,
        predecessor: Option<Predecessor>,
    ) -> Self {
        Self {
            id,
            rev_min,
            parent,
            name,
            path,
            kind,
            predecessor,
            children: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn rev_min(&self) -> Revnum {
        self.rev_min
    }

    pub fn parent(&self) -> NodeId {
        self.parent
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn predecessor(&self) -> Option<Predecessor> {
        self.predecessor
    }

    pub fn is_root(&self) -> bool {
        self.id.is_root()
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.children.iter().map(|(name, id)| (name.as_str(), *id))
    }

    pub fn child(&self, name: &str) -> Option<NodeId> {
        self.children.get(name).copied()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// The row this node is inserted as: open-ended at HEAD.
    pub fn to_record(&self) -> NodeRecord {
        NodeRecord {
            id: self.id,
            rev_min: self.rev_min,
            rev_max: Revnum::HEAD,
            parent: self.parent,
            predecessor: self.predecessor,
            name: self.name.clone(),
            path: self.path.clone(),
            kind: self.kind,
        }
    }
}

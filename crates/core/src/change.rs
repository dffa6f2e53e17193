#![forbid(unsafe_code)]

use crate::ids::{NodeId, Revnum};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CodeError {
    #[error("unknown change type code {0:?}")]
    UnknownChangeType(String),
    #[error("unknown node kind {0:?}")]
    UnknownNodeKind(String),
    #[error("unknown predecessor type {0:?}")]
    UnknownPredecessorType(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    File,
    Dir,
    None,
    Unknown,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Dir => "dir",
            Self::None => "none",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CodeError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "dir" | "directory" => Ok(Self::Dir),
            "none" => Ok(Self::None),
            "unknown" => Ok(Self::Unknown),
            _ => Err(CodeError::UnknownNodeKind(value.to_string())),
        }
    }

    pub fn is_file(self) -> bool {
        self == Self::File
    }

    pub fn is_dir(self) -> bool {
        self == Self::Dir
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
    /// Deletion and addition of the same path within one change-set.
    Replaced,
}

impl ChangeType {
    pub fn code(self) -> char {
        match self {
            Self::Added => 'A',
            Self::Modified => 'M',
            Self::Deleted => 'D',
            Self::Replaced => 'R',
        }
    }

    pub fn parse(value: &str) -> Result<Self, CodeError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "a" | "add" | "added" => Ok(Self::Added),
            "m" | "modify" | "modified" => Ok(Self::Modified),
            "d" | "delete" | "deleted" => Ok(Self::Deleted),
            "r" | "replace" | "replaced" => Ok(Self::Replaced),
            _ => Err(CodeError::UnknownChangeType(value.to_string())),
        }
    }
}

/// How a node relates to its predecessor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PredecessorType {
    /// Explicit copy target named by a feed event.
    Copy,
    /// Synthesized while deep-copying the subtree of a copied directory.
    Inherit,
}

impl PredecessorType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Inherit => "inherit",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CodeError> {
        match value {
            "copy" => Ok(Self::Copy),
            "inherit" => Ok(Self::Inherit),
            _ => Err(CodeError::UnknownPredecessorType(value.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Predecessor {
    pub id: NodeId,
    pub kind: PredecessorType,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CopySource {
    pub path: String,
    pub revision: Revnum,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathChange {
    pub path: String,
    pub change: ChangeType,
    pub kind: NodeKind,
    pub copy_from: Option<CopySource>,
    /// Opaque reference to the file body written into the produced content row.
    pub data_ref: Option<String>,
}

impl PathChange {
    pub fn new(path: impl Into<String>, change: ChangeType, kind: NodeKind) -> Self {
        Self {
            path: path.into(),
            change,
            kind,
            copy_from: None,
            data_ref: None,
        }
    }

    pub fn copied_from(mut self, path: impl Into<String>, revision: Revnum) -> Self {
        self.copy_from = Some(CopySource {
            path: path.into(),
            revision,
        });
        self
    }

    pub fn with_data(mut self, data_ref: impl Into<String>) -> Self {
        self.data_ref = Some(data_ref.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevisionInfo {
    pub id: Revnum,
    pub author: Option<String>,
    pub date_ms: i64,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeSet {
    pub revision: RevisionInfo,
    pub changes: Vec<PathChange>,
}

impl ChangeSet {
    pub fn new(revision: RevisionInfo, changes: Vec<PathChange>) -> Self {
        Self { revision, changes }
    }

    pub fn id(&self) -> Revnum {
        self.revision.id
    }
}

/// A committed `node` row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeRecord {
    pub id: NodeId,
    pub rev_min: Revnum,
    pub rev_max: Revnum,
    pub parent: NodeId,
    pub predecessor: Option<Predecessor>,
    pub name: String,
    pub path: String,
    pub kind: NodeKind,
}

impl NodeRecord {
    pub fn is_live(&self) -> bool {
        self.rev_max.is_head()
    }

    pub fn covers(&self, revision: Revnum) -> bool {
        self.rev_min <= revision && revision <= self.rev_max
    }
}

/// A committed `content` row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentRecord {
    pub node: NodeId,
    pub rev_min: Revnum,
    pub rev_max: Revnum,
    pub data: Option<String>,
}

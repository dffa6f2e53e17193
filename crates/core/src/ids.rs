#![forbid(unsafe_code)]

use std::fmt;

/// Engine-assigned node identity. Never reused, even when a path is deleted and recreated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(i64);

impl NodeId {
    /// The implicit repository root. Never persisted; top-level entries use it as their parent.
    pub const ROOT: NodeId = NodeId(0);

    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Repository revision number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Revnum(i64);

impl Revnum {
    /// `rev_max` sentinel for rows that are still live.
    pub const HEAD: Revnum = Revnum(i64::MAX);

    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    pub fn is_head(self) -> bool {
        self == Self::HEAD
    }

    /// The revision a window is closed at when something changes in `self`.
    pub fn prev(self) -> Self {
        Self(self.0 - 1)
    }
}

impl fmt::Display for Revnum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_head() {
            write!(f, "HEAD")
        } else {
            write!(f, "r{}", self.0)
        }
    }
}

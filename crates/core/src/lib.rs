#![forbid(unsafe_code)]

//! Data model of the revision index: ids, paths, change events, committed
//! rows, and the arena holding the live ("current") tree.

pub mod change;
pub mod ids;
pub mod paths;
pub mod tree;

pub use change::*;
pub use ids::{NodeId, Revnum};
pub use paths::{PathError, join_path, normalize_path, split_path};
pub use tree::{CurrentTree, NewNode, Node, TreeError};

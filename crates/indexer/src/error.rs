#![forbid(unsafe_code)]

use rd_core::{PathError, Revnum, TreeError};
use rd_storage::StoreError;

use crate::feed::FeedError;

/// Evidence that the cache and the feed's history have diverged.
#[derive(Debug, thiserror::Error)]
pub enum Violation {
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("copy source {path}@{revision} was not live at that revision")]
    PredecessorUnresolved { path: String, revision: Revnum },
    #[error("revision {got} arrived after {last}")]
    OutOfOrder { last: Revnum, got: Revnum },
    #[error("revision {0} is not a valid revision number")]
    InvalidRevision(Revnum),
    #[error("invalid event for {path}: {reason}")]
    InvalidEvent { path: String, reason: &'static str },
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Never retried: the run must stop.
    #[error("fatal: {0}")]
    Fatal(#[from] Violation),
    #[error("feed: {0}")]
    Feed(#[from] FeedError),
    #[error("store: {0}")]
    Store(#[from] StoreError),
}

impl From<TreeError> for IndexError {
    fn from(value: TreeError) -> Self {
        Self::Fatal(Violation::Tree(value))
    }
}

impl From<PathError> for IndexError {
    fn from(value: PathError) -> Self {
        Self::Fatal(Violation::Path(value))
    }
}

impl IndexError {
    /// Store I/O failures roll the revision back and may be retried from the top.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Store(StoreError::Io(_)) | Self::Store(StoreError::Sql(_))
        )
    }

    pub fn is_fatal(&self) -> bool {
        !self.is_retryable()
    }
}

#![forbid(unsafe_code)]

use rd_core::{CodeError, NodeId, Revnum};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("invalid row: {0}")]
    InvalidRow(#[from] CodeError),
    #[error("no node at {path} as of {revision}")]
    PathNotFound { path: String, revision: Revnum },
    #[error("node {node} has no live row to outdate")]
    NoLiveRow { node: NodeId },
    #[error("RESET_REQUIRED: {0}")]
    ResetRequired(&'static str),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "IO",
            Self::Sql(_) => "SQLITE",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::InvalidRow(_) => "INVALID_ROW",
            Self::PathNotFound { .. } => "PATH_NOT_FOUND",
            Self::NoLiveRow { .. } => "NO_LIVE_ROW",
            Self::ResetRequired(_) => "RESET_REQUIRED",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::PathNotFound { .. })
    }
}

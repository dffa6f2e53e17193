#![forbid(unsafe_code)]

//! Revision indexer: replays an ordered change feed into the temporal store.

pub mod config;
pub mod error;
pub mod feed;
pub mod indexer;
pub mod ingest;
pub mod logging;

pub use config::{ConfigError, IndexerConfig};
pub use error::{IndexError, Violation};
pub use feed::{ChangeFeed, FeedError, JsonLinesFeed, VecFeed};
pub use indexer::{Indexer, RevisionOutcome, RevisionSummary, RunSummary};
pub use ingest::{ContentBody, CreatedNode, Ingestor, RevisionPlan};
pub use logging::{LogFormat, LoggingConfig, init_logging};

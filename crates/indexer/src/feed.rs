#![forbid(unsafe_code)]

//! Change-feed adapters. A feed yields one change-set per revision, in
//! increasing revision order.

use std::collections::VecDeque;
use std::io::BufRead;

use rd_core::{
    ChangeSet, ChangeType, CodeError, CopySource, NodeKind, PathChange, PathError, RevisionInfo,
    Revnum, normalize_path,
};
use serde::Deserialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {source}")]
    Json {
        line: usize,
        source: serde_json::Error,
    },
    #[error("line {line}: {source}")]
    Code { line: usize, source: CodeError },
    #[error("line {line}: {source}")]
    Path { line: usize, source: PathError },
    #[error("line {line}: unparsable date {value:?}")]
    Date { line: usize, value: String },
    #[error("line {line}: {message}")]
    Malformed { line: usize, message: &'static str },
}

pub trait ChangeFeed {
    fn next_change_set(&mut self) -> Result<Option<ChangeSet>, FeedError>;
}

/// In-memory feed over already-built change-sets.
#[derive(Debug, Default)]
pub struct VecFeed {
    pending: VecDeque<ChangeSet>,
}

impl VecFeed {
    pub fn new(change_sets: impl IntoIterator<Item = ChangeSet>) -> Self {
        Self {
            pending: change_sets.into_iter().collect(),
        }
    }
}

impl ChangeFeed for VecFeed {
    fn next_change_set(&mut self) -> Result<Option<ChangeSet>, FeedError> {
        Ok(self.pending.pop_front())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RevisionLine {
    revision: i64,
    #[serde(default)]
    author: Option<String>,
    date: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    changes: Vec<ChangeLine>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChangeLine {
    path: String,
    action: String,
    kind: String,
    #[serde(default)]
    copy_from_path: Option<String>,
    #[serde(default)]
    copy_from_rev: Option<i64>,
    #[serde(default)]
    data: Option<String>,
}

/// Reads one JSON revision object per line; blank lines are skipped.
pub struct JsonLinesFeed<R> {
    reader: R,
    line: usize,
    buf: String,
}

impl<R: BufRead> JsonLinesFeed<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
        }
    }
}

impl<R: BufRead> ChangeFeed for JsonLinesFeed<R> {
    fn next_change_set(&mut self) -> Result<Option<ChangeSet>, FeedError> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line += 1;
            let trimmed = self.buf.trim();
            if trimmed.is_empty() {
                continue;
            }
            let raw: RevisionLine = serde_json::from_str(trimmed).map_err(|source| {
                FeedError::Json {
                    line: self.line,
                    source,
                }
            })?;
            return translate(raw, self.line).map(Some);
        }
    }
}

fn translate(raw: RevisionLine, line: usize) -> Result<ChangeSet, FeedError> {
    if raw.revision < 1 {
        return Err(FeedError::Malformed {
            line,
            message: "revision must be positive",
        });
    }
    let date = OffsetDateTime::parse(&raw.date, &Rfc3339).map_err(|_| FeedError::Date {
        line,
        value: raw.date.clone(),
    })?;
    let date_ms = i64::try_from(date.unix_timestamp_nanos() / 1_000_000).map_err(|_| {
        FeedError::Date {
            line,
            value: raw.date.clone(),
        }
    })?;

    let changes = raw
        .changes
        .into_iter()
        .map(|change| translate_change(change, line))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ChangeSet::new(
        RevisionInfo {
            id: Revnum::new(raw.revision),
            author: raw.author.filter(|author| !author.is_empty()),
            date_ms,
            message: raw.message,
        },
        changes,
    ))
}

fn translate_change(raw: ChangeLine, line: usize) -> Result<PathChange, FeedError> {
    let code = |source| FeedError::Code { line, source };
    let path_err = |source| FeedError::Path { line, source };

    let change = ChangeType::parse(&raw.action).map_err(code)?;
    let kind = NodeKind::parse(&raw.kind).map_err(code)?;
    let path = normalize_path(&raw.path).map_err(path_err)?;

    let copy_from = match (raw.copy_from_path, raw.copy_from_rev) {
        (Some(copy_path), Some(copy_rev)) => {
            if !matches!(change, ChangeType::Added | ChangeType::Replaced) {
                return Err(FeedError::Malformed {
                    line,
                    message: "only added or replaced paths can carry a copy source",
                });
            }
            Some(CopySource {
                path: normalize_path(&copy_path).map_err(path_err)?,
                revision: Revnum::new(copy_rev),
            })
        }
        (None, None) => None,
        (Some(_), None) => {
            return Err(FeedError::Malformed {
                line,
                message: "copy_from_path requires copy_from_rev",
            });
        }
        (None, Some(_)) => {
            return Err(FeedError::Malformed {
                line,
                message: "copy_from_rev requires copy_from_path",
            });
        }
    };

    Ok(PathChange {
        path,
        change,
        kind,
        copy_from,
        data_ref: raw.data,
    })
}

#![forbid(unsafe_code)]

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rd_core::{NodeId, NodeRecord, Revnum, normalize_path};
use rd_indexer::{IndexError, Indexer, IndexerConfig, JsonLinesFeed, init_logging};
use rd_storage::SqliteStore;
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// revdex: temporal index of a versioned tree's revision history
#[derive(Parser)]
#[command(name = "revdex", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding revdex.db
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,

    /// Rows buffered per writer before a flush
    #[arg(long, global = true)]
    batch_size: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Index a JSON-lines change feed ("-" reads stdin)
    Index {
        #[arg(long)]
        feed: PathBuf,
        /// Retries for a revision that failed on store I/O
        #[arg(long)]
        max_retries: Option<u32>,
    },
    /// Delete every indexed row
    Reset {
        #[arg(long)]
        yes: bool,
    },
    /// Print the node a path referred to at a revision
    Resolve { path: String, revision: i64 },
    /// List the children of a node at a revision (0 is the root)
    Children { parent: i64, revision: i64 },
    /// Print every window of a path with the revisions that opened them
    History { path: String },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] rd_indexer::ConfigError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Store(#[from] rd_storage::StoreError),
    #[error(transparent)]
    Path(#[from] rd_core::PathError),
    #[error("open feed {path}: {source}")]
    Feed { path: PathBuf, source: io::Error },
    #[error("{0}")]
    Usage(&'static str),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            Self::Index(err) if err.is_fatal() => ExitCode::from(2),
            _ => ExitCode::from(1),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "revdex failed");
            eprintln!("revdex: {err}");
            err.exit_code()
        }
    }
}

fn load_config(cli: &Cli) -> Result<IndexerConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => IndexerConfig::load(path)?,
        None => IndexerConfig::default(),
    };
    config.apply_env(|key| std::env::var(key).ok())?;
    if let Some(dir) = &cli.storage_dir {
        config.storage_dir = dir.clone();
    }
    if let Some(batch_size) = cli.batch_size {
        config.batch_size = batch_size;
    }
    if let Command::Index {
        max_retries: Some(max_retries),
        ..
    } = &cli.command
    {
        config.max_retries = *max_retries;
    }
    config.validate()?;
    Ok(config)
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(&cli)?;
    init_logging(&config.logging)?;

    let mut store = SqliteStore::open(&config.storage_dir)?.with_batch_size(config.batch_size);

    match cli.command {
        Command::Index { feed, .. } => {
            let mut indexer = Indexer::open(store)?.with_max_retries(config.max_retries);
            let summary = if feed.as_os_str() == "-" {
                indexer.run(&mut JsonLinesFeed::new(io::stdin().lock()))?
            } else {
                let file = File::open(&feed).map_err(|source| CliError::Feed {
                    path: feed.clone(),
                    source,
                })?;
                indexer.run(&mut JsonLinesFeed::new(BufReader::new(file)))?
            };
            print_json(&json!({
                "committed": summary.committed,
                "skipped": summary.skipped,
                "retries": summary.retries,
                "nodes_created": summary.nodes_created,
                "nodes_outdated": summary.nodes_outdated,
                "contents_modified": summary.contents_modified,
                "last_revision": summary.last_revision.map(Revnum::get),
            }));
        }
        Command::Reset { yes } => {
            if !yes {
                return Err(CliError::Usage("reset deletes the whole index; pass --yes"));
            }
            store.reset()?;
        }
        Command::Resolve { path, revision } => {
            let path = normalize_path(&path)?;
            let revision = parse_revision(revision)?;
            let id = store.resolve_path(&path, revision)?;
            let record = store.node(id)?;
            print_json(&json!({
                "path": path,
                "revision": revision.get(),
                "node": record.as_ref().map(node_json),
            }));
        }
        Command::Children { parent, revision } => {
            if parent < 0 {
                return Err(CliError::Usage("node ids are non-negative"));
            }
            let revision = parse_revision(revision)?;
            for child in store.children(NodeId::new(parent), revision)? {
                print_json(&node_json(&child));
            }
        }
        Command::History { path } => {
            let path = normalize_path(&path)?;
            for record in store.path_history(&path)? {
                let date = store
                    .revision(record.rev_min)?
                    .and_then(|info| format_date_ms(info.date_ms));
                let mut value = node_json(&record);
                value["opened_at"] = json!(date);
                print_json(&value);
            }
        }
    }
    Ok(())
}

fn parse_revision(raw: i64) -> Result<Revnum, CliError> {
    if raw < 1 {
        return Err(CliError::Usage("revision must be at least 1"));
    }
    Ok(Revnum::new(raw))
}

fn node_json(record: &NodeRecord) -> Value {
    json!({
        "id": record.id.get(),
        "path": record.path,
        "kind": record.kind.as_str(),
        "rev_min": record.rev_min.get(),
        "rev_max": (!record.is_live()).then_some(record.rev_max.get()),
        "parent": record.parent.get(),
        "predecessor": record.predecessor.map(|p| json!({
            "id": p.id.get(),
            "type": p.kind.as_str(),
        })),
    })
}

fn format_date_ms(date_ms: i64) -> Option<String> {
    let nanos = i128::from(date_ms) * 1_000_000;
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()?
        .format(&Rfc3339)
        .ok()
}

fn print_json(value: &Value) {
    println!("{value}");
}

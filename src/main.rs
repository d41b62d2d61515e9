//! Nexus indexer - streaming code ingestion
//!
//! Entry point for the command line tool.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use nexus_indexer::config::{
    DEFAULT_BATCH_SIZE, DEFAULT_DEBOUNCE_MS, DEFAULT_MAX_DEPTH, DEFAULT_MAX_FILES,
    DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_LINES,
};
use nexus_indexer::observability::{config_from_env, init_tracing};
use nexus_indexer::storage::{clear_index, index_stats, init_storage, Database, SqliteChunkSink};
use nexus_indexer::{
    dry_run, index_tree, ChunkerConfig, Config, IndexPipeline, ScanConfig, WatcherRegistry,
};

/// Nexus indexer - streaming, memory-bounded code ingestion
#[derive(Parser, Debug)]
#[command(name = "nexus-indexer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Data directory for `SQLite` database
    #[arg(short, long, env = "NEXUS_DATA_DIR", default_value = "./data", global = true)]
    data_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error); falls back to `NEXUS_LOG_LEVEL`
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable JSON logging output; also enabled by `NEXUS_LOG_JSON`
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index a tree once and print the run summary
    Index(ScanArgs),
    /// Estimate an index run without writing anything
    DryRun(ScanArgs),
    /// Watch a tree and index changes until interrupted
    Watch {
        #[command(flatten)]
        scan: ScanArgs,

        /// Quiet period before a changed file is processed
        #[arg(long, env = "NEXUS_DEBOUNCE_MS", default_value_t = DEFAULT_DEBOUNCE_MS)]
        debounce_ms: u64,

        /// Index the whole tree before watching
        #[arg(long)]
        initial_scan: bool,
    },
    /// Print index statistics
    Status,
    /// Delete every file record and chunk
    Clear,
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// Root directory to index
    #[arg(default_value = ".")]
    root: PathBuf,

    /// Stop after this many eligible files
    #[arg(long, env = "NEXUS_MAX_FILES", default_value_t = DEFAULT_MAX_FILES)]
    max_files: usize,

    /// Skip files larger than this many bytes
    #[arg(long, env = "NEXUS_MAX_FILE_SIZE", default_value_t = DEFAULT_MAX_FILE_SIZE)]
    max_file_size: u64,

    /// Do not enter directories deeper than this
    #[arg(long, env = "NEXUS_MAX_DEPTH", default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Extra gitignore-style patterns
    #[arg(short, long, env = "NEXUS_IGNORE", value_delimiter = ',')]
    ignore: Vec<String>,

    /// Lines per chunk
    #[arg(long, env = "NEXUS_MAX_LINES", default_value_t = DEFAULT_MAX_LINES)]
    max_lines: usize,

    /// Chunk documents per sink submission
    #[arg(long, env = "NEXUS_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,
}

impl ScanArgs {
    fn into_config(self, data_dir: PathBuf, log_level: String, debounce_ms: u64) -> Config {
        Config {
            data_dir,
            log_level,
            scan: ScanConfig {
                root_path: self.root,
                max_file_size: self.max_file_size,
                max_files: self.max_files,
                max_depth: self.max_depth,
                ignore_patterns: self.ignore,
            },
            chunker: ChunkerConfig::new(self.max_lines),
            batch_size: self.batch_size,
            debounce_ms,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_tracing = config_from_env();
    let log_level = cli.log_level.unwrap_or(env_tracing.level);
    init_tracing(&log_level, cli.log_json || env_tracing.json);

    tracing::info!("Nexus indexer v{} starting...", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Index(scan) => {
            let config = scan.into_config(cli.data_dir, log_level, DEFAULT_DEBOUNCE_MS);
            run_index(config).await
        }
        Command::DryRun(scan) => {
            let config = scan.into_config(cli.data_dir, log_level, DEFAULT_DEBOUNCE_MS);
            config.validate()?;
            let result = dry_run(&config.scan, config.chunker)?;
            print_json(&result)
        }
        Command::Watch {
            scan,
            debounce_ms,
            initial_scan,
        } => {
            let config = scan.into_config(cli.data_dir, log_level, debounce_ms);
            run_watch(config, initial_scan).await
        }
        Command::Status => {
            let db = open_database(&database_path(cli.data_dir))?;
            let stats = db.with_conn(index_stats)?;
            print_json(&stats)
        }
        Command::Clear => {
            let db = open_database(&database_path(cli.data_dir))?;
            db.with_conn(clear_index)?;
            tracing::info!(path = %db.path(), "Index cleared");
            Ok(())
        }
    }
}

async fn run_index(config: Config) -> anyhow::Result<()> {
    config.validate()?;
    tracing::debug!(?config, "Configuration loaded");

    let pipeline = build_pipeline(&config)?;
    let summary = index_tree(&config.scan, pipeline, |progress| {
        tracing::debug!(
            path = %progress.current_path,
            files = progress.files_seen,
            memory_bytes = progress.estimated_memory_bytes,
            "Indexing"
        );
        Ok(())
    })
    .await?;

    print_json(&summary)
}

async fn run_watch(config: Config, initial_scan: bool) -> anyhow::Result<()> {
    config.validate()?;
    tracing::debug!(?config, "Configuration loaded");

    let pipeline = build_pipeline(&config)?;

    if initial_scan {
        let summary = index_tree(&config.scan, Arc::clone(&pipeline), |_| Ok(())).await?;
        tracing::info!(
            indexed = summary.files_indexed,
            errors = summary.error_count,
            "Initial scan complete"
        );
    }

    let registry = WatcherRegistry::new();
    let watcher = registry
        .start(config.watcher_config(), pipeline)
        .await
        .context("failed to start watcher")?;
    tracing::info!(paths = ?watcher.get_status().watched_paths, "Watching for changes, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    tracing::info!("Shutting down watcher");
    let report = registry.stop().await?;
    print_json(&report)
}

fn database_path(data_dir: PathBuf) -> PathBuf {
    Config {
        data_dir,
        ..Config::default()
    }
    .database_path()
}

fn open_database(path: &std::path::Path) -> anyhow::Result<Database> {
    let db = Database::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;
    init_storage(&db)?;
    Ok(db)
}

fn build_pipeline(config: &Config) -> anyhow::Result<Arc<IndexPipeline>> {
    let db = open_database(&config.database_path())?;
    let sink = SqliteChunkSink::new(db.clone());

    Ok(Arc::new(IndexPipeline::new(
        Arc::new(db),
        Arc::new(sink),
        config.chunker,
        config.batch_size,
    )))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

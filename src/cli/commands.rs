//! CLI command implementations

use std::path::Path;

use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::config::WalConfig;
use crate::wal::{GcReport, SnapshotFile, Subscriber, Wal, WalCursor, WalStatus};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::write_json;

/// One line of `dump` output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub lsn: u64,
    pub size: u32,
    pub count: u32,
}

/// Main entry point for CLI
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.log_json);
    run_command(cli.command)
}

/// Logs to stderr, filtered by `RUST_LOG` (default `info`).
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Status { config } => write_json(&status(&load(&config)?)?),
        Command::Snapshot { config } => write_json(&snapshot(&load(&config)?)?),
        Command::Dump { config, from, limit } => {
            write_json(&dump(&load(&config)?, from, limit)?)
        }
        Command::Gc { config, checkpoint } => write_json(&gc(&load(&config)?, checkpoint)?),
    }
}

fn load(path: &Path) -> CliResult<WalConfig> {
    Ok(WalConfig::load(path)?)
}

/// Opens an existing log; never creates `wals/` or a first segment.
///
/// Opening still cuts a torn final batch off the newest segment.
fn open_existing(config: &WalConfig) -> CliResult<Wal> {
    let wal_dir = config.wal_dir();
    if !wal_dir.is_dir() {
        return Err(CliError::MissingLog(wal_dir));
    }
    Ok(Wal::open(config.clone())?)
}

/// Status report of the log at `config.data_dir`
pub fn status(config: &WalConfig) -> CliResult<WalStatus> {
    let wal = open_existing(config)?;
    Ok(wal.status())
}

/// Retained segment list
pub fn snapshot(config: &WalConfig) -> CliResult<Vec<SnapshotFile>> {
    let wal = open_existing(config)?;
    let subscriber = Subscriber::new();
    let files = wal.snapshot(&subscriber)?;
    wal.del(&subscriber);
    Ok(files)
}

/// Headers of up to `limit` batches starting at `from`
pub fn dump(config: &WalConfig, from: Option<u64>, limit: usize) -> CliResult<Vec<BatchSummary>> {
    let wal = open_existing(config)?;
    let from = from.unwrap_or_else(|| wal.status().lsn_min);

    let mut cursor = WalCursor::open(&wal, from, None)?;
    let mut last = 0;
    cursor.collect(limit, &mut last)?;

    Ok(cursor
        .batches()
        .map(|batch| BatchSummary {
            lsn: batch.lsn(),
            size: batch.header().size,
            count: batch.header().count,
        })
        .collect())
}

/// Removes segments no longer needed below `checkpoint`
pub fn gc(config: &WalConfig, checkpoint: u64) -> CliResult<GcReport> {
    let wal = open_existing(config)?;
    wal.state().set_checkpoint(checkpoint);
    Ok(wal.gc_checkpoint()?)
}

//! CLI argument definitions using clap
//!
//! Commands:
//! - aerolog status --config <path>
//! - aerolog snapshot --config <path>
//! - aerolog dump --config <path> [--from <lsn>] [--limit <n>]
//! - aerolog gc --config <path> --checkpoint <lsn>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// aerolog - segmented write-ahead log tooling
#[derive(Parser, Debug)]
#[command(name = "aerolog")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the log status report (trims a torn final batch)
    Status {
        /// Path to configuration file
        #[arg(long, default_value = "./aerolog.json")]
        config: PathBuf,
    },

    /// List every retained segment with its size (trims a torn final batch)
    Snapshot {
        /// Path to configuration file
        #[arg(long, default_value = "./aerolog.json")]
        config: PathBuf,
    },

    /// Print batch headers starting at an LSN (trims a torn final batch)
    Dump {
        /// Path to configuration file
        #[arg(long, default_value = "./aerolog.json")]
        config: PathBuf,

        /// First LSN to print (default: oldest retained)
        #[arg(long)]
        from: Option<u64>,

        /// Maximum number of batches
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },

    /// Remove segments no longer needed below a checkpoint LSN
    Gc {
        /// Path to configuration file
        #[arg(long, default_value = "./aerolog.json")]
        config: PathBuf,

        /// Checkpoint watermark
        #[arg(long)]
        checkpoint: u64,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

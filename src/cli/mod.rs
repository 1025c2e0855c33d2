//! CLI module for aerolog
//!
//! Offline inspection of a log directory:
//! - status: status report
//! - snapshot: retained segment list
//! - dump: batch headers from an LSN onward
//! - gc: remove segments below a checkpoint
//!
//! These commands open the log themselves and must not run against a data
//! directory that a live engine has open. They refuse a data directory
//! without `wals/`. Opening is not strictly read-only: a torn final batch
//! in the newest segment is cut off, as at engine startup.

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{dump, gc, run, run_command, snapshot, status, BatchSummary};
pub use errors::{CliError, CliResult};
pub use io::write_json;

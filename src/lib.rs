//! aerolog - segmented write-ahead log for a strict OLTP storage engine
//!
//! Committed write batches are appended in a single global order, split
//! across segment files, read back by any number of independent consumers,
//! and reclaimed once no consumer or checkpoint needs them.

pub mod cli;
pub mod config;
pub mod wal;

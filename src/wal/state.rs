//! Log-wide watermarks and write counters
//!
//! Owned by a [`super::Wal`] instance and shared with collaborators through
//! an `Arc`; nothing here is process-global.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global LSN and checkpoint watermarks.
///
/// The LSN is published by the writer only after a batch is fully
/// appended. The checkpoint LSN is supplied by the checkpoint subsystem.
#[derive(Debug, Default)]
pub struct WalState {
    lsn: AtomicU64,
    checkpoint: AtomicU64,
}

impl WalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// LSN of the last committed batch, 0 for an empty log
    pub fn lsn(&self) -> u64 {
        self.lsn.load(Ordering::Acquire)
    }

    pub fn set_lsn(&self, lsn: u64) {
        self.lsn.store(lsn, Ordering::Release);
    }

    /// Lowest LSN the last checkpoint still needs from the log
    pub fn checkpoint(&self) -> u64 {
        self.checkpoint.load(Ordering::Acquire)
    }

    pub fn set_checkpoint(&self, lsn: u64) {
        self.checkpoint.store(lsn, Ordering::Release);
    }
}

/// Cumulative write counters.
///
/// Counters only; monotonic; reset on process start.
/// Relaxed ordering, values are reporting-only.
#[derive(Debug, Default)]
pub struct WalStats {
    /// Batches submitted to `write()`
    writes: AtomicU64,
    /// Encoded batch bytes submitted
    writes_bytes: AtomicU64,
    /// Operations across all batches
    ops: AtomicU64,
}

impl WalStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one batch
    pub fn record_write(&self, bytes: u64, ops: u64) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.writes_bytes.fetch_add(bytes, Ordering::Relaxed);
        self.ops.fetch_add(ops, Ordering::Relaxed);
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn writes_bytes(&self) -> u64 {
        self.writes_bytes.load(Ordering::Relaxed)
    }

    pub fn ops(&self) -> u64 {
        self.ops.load(Ordering::Relaxed)
    }
}

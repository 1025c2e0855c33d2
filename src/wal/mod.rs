//! Write-Ahead Log (WAL) subsystem for aerolog
//!
//! A durable, strictly ordered log of committed write batches, split into
//! segment files under `<data_dir>/wals/`, each named by the LSN of its
//! first batch.
//!
//! # Components
//!
//! - [`SegmentIndex`]: sorted set of retained segment ids
//! - [`Segment`]: one append-only file
//! - [`Subscriber`]: a consumer position plus a wake channel
//! - [`Wal`]: the writer; assigns LSNs, rotates, collects garbage,
//!   produces snapshots and status reports
//! - [`WalCursor`]: a per-consumer sequential reader
//! - [`WalBatch`]: the unit a writer appends
//!
//! # Guarantees
//!
//! - LSNs increase by exactly one per successful write, assigned under
//!   the writer lock
//! - A segment is never removed while a registered subscriber or the
//!   checkpoint still needs it
//! - A short record at the end of a segment is a boundary, not an error
//!
//! Batches carry no checksum and `write()` does not fsync, so a reader
//! cannot tell a torn final write from the end of the log.

mod cursor;
mod errors;
mod index;
mod record;
mod segment;
mod state;
mod subscriber;
mod writer;

pub use cursor::WalCursor;
pub use errors::{Severity, WalError, WalErrorCode, WalResult};
pub use index::SegmentIndex;
pub use record::{BatchHeader, BatchView, WalBatch, BATCH_HEADER_SIZE};
pub use segment::{segment_id_of, segment_path, Segment};
pub use state::{WalState, WalStats};
pub use subscriber::Subscriber;
pub use writer::{GcReport, SnapshotFile, Wal, WalStatus};

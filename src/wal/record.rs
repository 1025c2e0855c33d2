//! WAL batch layout
//!
//! Each segment is a packed sequence of batches:
//!
//! ```text
//! [BatchHeader][operation metadata][row payload]
//! ```
//!
//! BatchHeader (16 bytes, little endian):
//! - LSN (u64)
//! - Size (u32): total encoded bytes of the batch, header included
//! - Count (u32): number of operations
//!
//! Metadata and rows are opaque to the log.

use std::io::IoSlice;

use super::errors::{WalError, WalResult};

/// Encoded size of [`BatchHeader`]
pub const BATCH_HEADER_SIZE: usize = 16;

/// Fixed header in front of every batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchHeader {
    /// Log sequence number, assigned by the writer
    pub lsn: u64,
    /// Total bytes including this header
    pub size: u32,
    /// Number of operations in the batch
    pub count: u32,
}

impl BatchHeader {
    /// Serialize to bytes
    pub fn encode(&self) -> [u8; BATCH_HEADER_SIZE] {
        let mut out = [0u8; BATCH_HEADER_SIZE];
        out[0..8].copy_from_slice(&self.lsn.to_le_bytes());
        out[8..12].copy_from_slice(&self.size.to_le_bytes());
        out[12..16].copy_from_slice(&self.count.to_le_bytes());
        out
    }

    /// Deserialize from bytes, None if the slice is too short
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < BATCH_HEADER_SIZE {
            return None;
        }
        let lsn = u64::from_le_bytes(data[0..8].try_into().ok()?);
        let size = u32::from_le_bytes(data[8..12].try_into().ok()?);
        let count = u32::from_le_bytes(data[12..16].try_into().ok()?);
        Some(Self { lsn, size, count })
    }
}

/// A batch under construction.
///
/// Built by the transaction layer, handed to [`super::Wal::write`] once and
/// dropped afterwards. Size and count are accumulated in 64 bits and only
/// narrowed to the header's 32-bit fields when the writer stamps the LSN.
#[derive(Debug)]
pub struct WalBatch {
    header: BatchHeader,
    header_bytes: [u8; BATCH_HEADER_SIZE],
    size: u64,
    count: u64,
    meta: Vec<u8>,
    rows: Vec<Vec<u8>>,
}

impl Default for WalBatch {
    fn default() -> Self {
        Self::new()
    }
}

impl WalBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self {
            header: BatchHeader::default(),
            header_bytes: [0u8; BATCH_HEADER_SIZE],
            size: BATCH_HEADER_SIZE as u64,
            count: 0,
            meta: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Add one operation: its metadata and its row bytes.
    pub fn add(&mut self, meta: &[u8], row: impl Into<Vec<u8>>) {
        let row = row.into();
        self.size += (meta.len() + row.len()) as u64;
        self.count += 1;
        self.meta.extend_from_slice(meta);
        self.rows.push(row);
    }

    /// Header as stamped by the last write; zeroed before that
    pub fn header(&self) -> &BatchHeader {
        &self.header
    }

    /// Total encoded size, header included
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Number of operations
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Returns true when no operation was added
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Fills in the header for `lsn`.
    ///
    /// Fails without touching the header when size or count do not fit
    /// in 32 bits.
    pub(crate) fn set_lsn(&mut self, lsn: u64) -> WalResult<()> {
        let too_large = || WalError::batch_too_large(self.size, self.count);
        let size = u32::try_from(self.size).map_err(|_| too_large())?;
        let count = u32::try_from(self.count).map_err(|_| too_large())?;

        self.header = BatchHeader { lsn, size, count };
        self.header_bytes = self.header.encode();
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn inflate_for_test(&mut self, bytes: u64) {
        self.size += bytes;
    }

    /// Buffers in on-disk order: header, metadata, rows.
    pub(crate) fn io_slices(&self) -> Vec<IoSlice<'_>> {
        let mut iov = Vec::with_capacity(2 + self.rows.len());
        iov.push(IoSlice::new(&self.header_bytes));
        if !self.meta.is_empty() {
            iov.push(IoSlice::new(&self.meta));
        }
        for row in &self.rows {
            if !row.is_empty() {
                iov.push(IoSlice::new(row));
            }
        }
        iov
    }
}

/// Read-only view of one batch inside a cursor buffer.
#[derive(Debug, Clone, Copy)]
pub struct BatchView<'a> {
    header: BatchHeader,
    data: &'a [u8],
}

impl<'a> BatchView<'a> {
    /// Wrap an encoded batch, None if the header does not fit
    pub fn new(data: &'a [u8]) -> Option<Self> {
        let header = BatchHeader::decode(data)?;
        let end = (header.size as usize).min(data.len());
        Some(Self {
            header,
            data: &data[..end],
        })
    }

    pub fn header(&self) -> &BatchHeader {
        &self.header
    }

    pub fn lsn(&self) -> u64 {
        self.header.lsn
    }

    /// Metadata and rows, exactly as appended
    pub fn payload(&self) -> &'a [u8] {
        &self.data[BATCH_HEADER_SIZE..]
    }

    /// The whole batch, header included
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }
}

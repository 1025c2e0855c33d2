//! Sequential reader over the segment chain
//!
//! A cursor belongs to one consumer. It opens its own read-only handles,
//! so reading never takes the writer lock. Positioning is by linear scan
//! inside the segment that holds the start LSN.

use std::io;
use std::time::Duration;

use super::errors::{WalError, WalResult};
use super::record::{BatchHeader, BatchView};
use super::segment::Segment;
use super::subscriber::Subscriber;
use super::writer::Wal;

#[derive(Debug, Clone, Copy)]
enum Wait {
    No,
    Block,
    For(Duration),
}

/// Per-consumer reader.
///
/// With a follow subscriber the cursor keeps going past the live tail,
/// sleeping on the subscriber's wake channel; without one it goes
/// inactive at the end of the log.
#[derive(Debug)]
pub struct WalCursor<'a> {
    wal: &'a Wal,
    segment: Option<Segment>,
    offset: u64,
    follow: Option<Subscriber>,
    buf: Vec<u8>,
    last: usize,
    /// LSN the stream continues with
    expected: u64,
    active: bool,
}

impl<'a> WalCursor<'a> {
    /// Opens a cursor whose first `next()` returns the batch at
    /// `start_lsn` (or the first one after it).
    ///
    /// For follow mode, pass a subscriber that is registered and attached;
    /// its position is not touched by the cursor.
    ///
    /// # Errors
    ///
    /// `AERO_WAL_OUT_OF_RANGE` when `start_lsn` is older than every
    /// retained segment.
    pub fn open(wal: &'a Wal, start_lsn: u64, follow: Option<Subscriber>) -> WalResult<Self> {
        if !wal.in_range(start_lsn) {
            return Err(WalError::out_of_range(start_lsn));
        }
        let id = wal
            .index()
            .floor(start_lsn)
            .ok_or_else(|| WalError::out_of_range(start_lsn))?;
        let segment = Self::open_segment(wal, id, start_lsn)?;

        let mut cursor = Self {
            wal,
            segment: Some(segment),
            offset: 0,
            follow,
            buf: Vec::new(),
            last: 0,
            expected: start_lsn,
            active: true,
        };
        cursor.seek(start_lsn)?;
        Ok(cursor)
    }

    fn open_segment(wal: &Wal, id: u64, lsn: u64) -> WalResult<Segment> {
        Segment::open_read(wal.wal_dir(), id).map_err(|e| match e.kind() {
            // removed by GC after the index lookup
            io::ErrorKind::NotFound => WalError::out_of_range(lsn),
            _ => WalError::read_failed(format!("Failed to open WAL segment {}", id), e),
        })
    }

    fn seek(&mut self, lsn: u64) -> WalResult<()> {
        let segment = match self.segment.as_ref() {
            Some(segment) => segment,
            None => return Ok(()),
        };
        loop {
            let header = segment
                .read_header(self.offset)
                .map_err(|e| WalError::read_failed_at(segment.id(), self.offset, e))?;
            match header {
                Some(header) if header.lsn < lsn => self.offset += header.size as u64,
                _ => return Ok(()),
            }
        }
    }

    /// Whether more data may still be read.
    ///
    /// False only for a non-follow cursor that reached the end of the log.
    pub fn active(&self) -> bool {
        self.active
    }

    /// Reads the next batch; see [`at`](Self::at) for its contents.
    ///
    /// At the end of the log a non-follow cursor becomes inactive and
    /// returns false. A follow cursor blocks on its subscriber until the
    /// writer appends, and returns false only when the subscriber has been
    /// detached or unregistered.
    ///
    /// # Errors
    ///
    /// `AERO_WAL_OUT_OF_RANGE` when the segments holding the next LSNs were
    /// collected while the cursor was still reading an older one.
    pub fn next(&mut self) -> WalResult<bool> {
        self.buf.clear();
        self.last = 0;
        self.read(Wait::Block)
    }

    /// Like [`next`](Self::next), but a follow cursor waits at most
    /// `timeout` for new data.
    pub fn next_timeout(&mut self, timeout: Duration) -> WalResult<bool> {
        self.buf.clear();
        self.last = 0;
        self.read(Wait::For(timeout))
    }

    /// Reads up to `max_count` batches into the cursor buffer without
    /// waiting, and stores the LSN of the last one in `last_lsn`.
    ///
    /// Returns how many batches were read; iterate them with
    /// [`batches`](Self::batches).
    pub fn collect(&mut self, max_count: usize, last_lsn: &mut u64) -> WalResult<usize> {
        self.buf.clear();
        self.last = 0;

        let mut count = 0;
        while count < max_count && self.read(Wait::No)? {
            if let Some(view) = self.at() {
                *last_lsn = view.lsn();
            }
            count += 1;
        }
        Ok(count)
    }

    /// The most recently read batch; valid until the next read.
    pub fn at(&self) -> Option<BatchView<'_>> {
        if self.buf.is_empty() {
            return None;
        }
        BatchView::new(&self.buf[self.last..])
    }

    /// Every batch held in the buffer, in log order.
    pub fn batches(&self) -> impl Iterator<Item = BatchView<'_>> + '_ {
        let mut rest: &[u8] = &self.buf;
        std::iter::from_fn(move || {
            let view = BatchView::new(rest)?;
            rest = &rest[view.as_bytes().len()..];
            Some(view)
        })
    }

    /// Releases the cursor's file handle and buffer.
    ///
    /// The follow subscriber stays registered; it belongs to the consumer.
    pub fn close(self) {}

    fn read(&mut self, wait: Wait) -> WalResult<bool> {
        if !self.active {
            return Ok(false);
        }
        loop {
            if self.read_current()? {
                return Ok(true);
            }

            let id = match self.segment.as_ref() {
                Some(segment) => segment.id(),
                None => return Ok(false),
            };
            if let Some(next) = self.wal.index().next_after(id) {
                // A newer segment means this one is sealed; look once more
                // for a batch appended just before the rotation.
                if self.read_current()? {
                    return Ok(true);
                }
                // GC removes from the bottom, so a collected gap shows up
                // as the expected LSN falling out of range
                if next > self.expected && !self.wal.in_range(self.expected) {
                    return Err(WalError::out_of_range(self.expected));
                }
                self.segment = Some(Self::open_segment(self.wal, next, self.expected)?);
                self.offset = 0;
                continue;
            }

            let subscriber = match self.follow.as_ref() {
                Some(subscriber) => subscriber,
                None => {
                    self.active = false;
                    return Ok(false);
                }
            };
            if !subscriber.is_added() || !subscriber.is_attached() {
                return Ok(false);
            }
            match wait {
                Wait::No => return Ok(false),
                Wait::Block => subscriber.wait(),
                Wait::For(timeout) => {
                    if !subscriber.wait_timeout(timeout) {
                        return Ok(false);
                    }
                }
            }
        }
    }

    /// One batch from the current segment, re-checking the file size when
    /// the tracked end is reached.
    fn read_current(&mut self) -> WalResult<bool> {
        let segment = match self.segment.as_mut() {
            Some(segment) => segment,
            None => return Ok(false),
        };
        let start = self.buf.len();

        let mut found = segment
            .pread(self.offset, &mut self.buf)
            .map_err(|e| WalError::read_failed_at(segment.id(), self.offset, e))?;
        if !found {
            segment
                .refresh_size()
                .map_err(|e| WalError::read_failed_at(segment.id(), self.offset, e))?;
            found = segment
                .pread(self.offset, &mut self.buf)
                .map_err(|e| WalError::read_failed_at(segment.id(), self.offset, e))?;
        }

        if found {
            self.offset += (self.buf.len() - start) as u64;
            self.last = start;
            if let Some(header) = BatchHeader::decode(&self.buf[start..]) {
                self.expected = header.lsn + 1;
            }
        }
        Ok(found)
    }
}

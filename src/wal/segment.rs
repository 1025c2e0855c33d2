//! WAL segment files
//!
//! A segment is one append-only file under `<data_dir>/wals/`, named by the
//! decimal LSN of the first batch ever written into it. Only the writer's
//! current segment is appended to; superseded segments are immutable until
//! garbage collection removes them.

use std::fs::{self, File, OpenOptions};
use std::io::{self, IoSlice, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::record::{BatchHeader, BATCH_HEADER_SIZE};

/// Returns `<wal_dir>/<id>`
pub fn segment_path(wal_dir: &Path, id: u64) -> PathBuf {
    wal_dir.join(id.to_string())
}

/// Parses a directory entry name as a segment id.
///
/// Only plain base-10 digits are accepted; anything else (hidden files,
/// signs, overflow) is not a segment.
pub fn segment_id_of(name: &str) -> Option<u64> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse::<u64>().ok()
}

/// One physical log file.
#[derive(Debug)]
pub struct Segment {
    id: u64,
    file: File,
    size: u64,
    #[cfg(test)]
    faults: FaultPlan,
}

/// Injected I/O failures for exercising the writer's error paths.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct FaultPlan {
    /// The next append writes this many bytes, then fails
    pub(crate) write_after: Option<usize>,
    /// The next truncate fails
    pub(crate) fail_truncate: bool,
}

impl Segment {
    /// Creates a new empty segment. Fails if the file already exists.
    pub fn create(wal_dir: &Path, id: u64) -> io::Result<Self> {
        let path = segment_path(wal_dir, id);
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create_new(true)
            .open(&path)?;
        Ok(Self {
            id,
            file,
            size: 0,
            #[cfg(test)]
            faults: FaultPlan::default(),
        })
    }

    /// Opens an existing segment for appending.
    ///
    /// The file is opened in append mode so writes continue at end-of-file.
    pub fn open(wal_dir: &Path, id: u64) -> io::Result<Self> {
        let path = segment_path(wal_dir, id);
        let file = OpenOptions::new().read(true).append(true).open(&path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            id,
            file,
            size,
            #[cfg(test)]
            faults: FaultPlan::default(),
        })
    }

    /// Opens an existing segment read-only, for cursors.
    pub fn open_read(wal_dir: &Path, id: u64) -> io::Result<Self> {
        let path = segment_path(wal_dir, id);
        let file = File::open(&path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            id,
            file,
            size,
            #[cfg(test)]
            faults: FaultPlan::default(),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Size as tracked by this handle
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Re-reads the file length; readers call this when they reach the
    /// tracked end while the segment may still be growing.
    pub fn refresh_size(&mut self) -> io::Result<u64> {
        self.size = self.file.metadata()?.len();
        Ok(self.size)
    }

    /// Vectored append of one batch.
    ///
    /// No fsync is performed here.
    pub fn write(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<()> {
        #[cfg(test)]
        if let Some(limit) = self.faults.write_after.take() {
            return self.write_partial(bufs, limit);
        }

        let mut iov: Vec<IoSlice<'_>> = bufs.to_vec();
        let mut slices = &mut iov[..];
        while !slices.is_empty() {
            match self.file.write_vectored(&slices[..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to write whole batch",
                    ))
                }
                Ok(n) => {
                    self.size += n as u64;
                    IoSlice::advance_slices(&mut slices, n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Reads one batch at `offset`, appending its bytes to `out`.
    ///
    /// Returns `Ok(false)` when the header or the body would run past the
    /// tracked size. That covers both a clean end-of-log and a crash-torn
    /// final write; the two are not told apart. On a short body the partial
    /// header is removed from `out` again.
    pub fn pread(&self, offset: u64, out: &mut Vec<u8>) -> io::Result<bool> {
        if offset + BATCH_HEADER_SIZE as u64 > self.size {
            return Ok(false);
        }

        let start = out.len();
        out.resize(start + BATCH_HEADER_SIZE, 0);
        if let Err(e) = self.read_exact_at(&mut out[start..], offset) {
            out.truncate(start);
            return Err(e);
        }

        let size = match BatchHeader::decode(&out[start..]) {
            Some(header) if header.size as usize >= BATCH_HEADER_SIZE => header.size as u64,
            _ => {
                out.truncate(start);
                return Ok(false);
            }
        };
        if offset + size > self.size {
            out.truncate(start);
            return Ok(false);
        }

        let body = start + BATCH_HEADER_SIZE;
        out.resize(start + size as usize, 0);
        if let Err(e) = self.read_exact_at(&mut out[body..], offset + BATCH_HEADER_SIZE as u64) {
            out.truncate(start);
            return Err(e);
        }

        // TODO: verify a per-batch checksum once the header carries one
        Ok(true)
    }

    /// Reads only the header at `offset`, when the whole batch fits.
    pub fn read_header(&self, offset: u64) -> io::Result<Option<BatchHeader>> {
        if offset + BATCH_HEADER_SIZE as u64 > self.size {
            return Ok(None);
        }
        let mut buf = [0u8; BATCH_HEADER_SIZE];
        self.read_exact_at(&mut buf, offset)?;
        match BatchHeader::decode(&buf) {
            Some(header)
                if header.size as usize >= BATCH_HEADER_SIZE
                    && offset + header.size as u64 <= self.size =>
            {
                Ok(Some(header))
            }
            _ => Ok(None),
        }
    }

    /// Walks every complete batch and returns the last header found and the
    /// byte offset right after it.
    pub fn scan(&self) -> io::Result<(Option<BatchHeader>, u64)> {
        let mut offset = 0u64;
        let mut last = None;
        while let Some(header) = self.read_header(offset)? {
            offset += header.size as u64;
            last = Some(header);
        }
        Ok((last, offset))
    }

    /// Cuts the file back to `len` bytes.
    pub fn truncate(&mut self, len: u64) -> io::Result<()> {
        #[cfg(test)]
        if std::mem::take(&mut self.faults.fail_truncate) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected truncate failure"));
        }

        self.file.set_len(len)?;
        self.size = len;
        Ok(())
    }

    /// Flushes file data to disk.
    pub fn sync(&self) -> io::Result<()> {
        self.file.sync_all()
    }

    /// Removes the segment file, returning its on-disk size.
    pub fn delete(wal_dir: &Path, id: u64) -> io::Result<u64> {
        let path = segment_path(wal_dir, id);
        let size = fs::metadata(&path)?.len();
        fs::remove_file(&path)?;
        Ok(size)
    }

    #[cfg(test)]
    pub(crate) fn faults(&mut self) -> &mut FaultPlan {
        &mut self.faults
    }

    #[cfg(test)]
    fn write_partial(&mut self, bufs: &[IoSlice<'_>], limit: usize) -> io::Result<()> {
        let bytes: Vec<u8> = bufs.iter().flat_map(|b| b.iter().copied()).collect();
        let limit = limit.min(bytes.len());
        self.file.write_all(&bytes[..limit])?;
        self.size += limit as u64;
        Err(io::Error::new(io::ErrorKind::Other, "injected write failure"))
    }

    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)
    }
}

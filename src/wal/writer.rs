//! Segmented log writer
//!
//! One `Wal` owns the single writable segment. Every append, rotation,
//! registry change, GC pass and snapshot runs under one writer lock, so LSNs
//! are assigned strictly in order with no gaps and each multi-buffer batch
//! lands contiguously.
//!
//! Lock order: writer lock, then the segment index lock.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::WalConfig;

use super::errors::{WalError, WalResult};
use super::index::SegmentIndex;
use super::record::WalBatch;
use super::segment::{segment_id_of, segment_path, Segment};
use super::state::{WalState, WalStats};
use super::subscriber::Subscriber;

/// Status report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalStatus {
    /// Global LSN watermark
    pub lsn: u64,
    /// Id of the oldest retained segment
    pub lsn_min: u64,
    /// Retained segment count
    pub files: usize,
    /// Registered subscriber count
    pub slots: usize,
    /// Oldest subscriber position, None without subscribers
    pub slots_min: Option<u64>,
    pub writes: u64,
    pub writes_bytes: u64,
    pub ops: u64,
    /// Externally supplied checkpoint watermark
    pub checkpoint: u64,
}

/// One retained segment listed by [`Wal::snapshot`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotFile {
    /// Path relative to the data directory, `wals/<id>`
    pub path: String,
    pub size: u64,
}

/// Outcome of one GC pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GcReport {
    pub files: usize,
    pub bytes: u64,
}

#[derive(Debug)]
struct WalInner {
    current: Segment,
    subscribers: Vec<Subscriber>,
    /// A failed append could not be undone; the next write must start a
    /// fresh segment
    torn_tail: bool,
}

/// The write-ahead log.
#[derive(Debug)]
pub struct Wal {
    config: WalConfig,
    wal_dir: PathBuf,
    state: Arc<WalState>,
    stats: WalStats,
    inner: Mutex<WalInner>,
    index: SegmentIndex,
}

impl Wal {
    /// Opens the log under `config.data_dir` with fresh state.
    pub fn open(config: WalConfig) -> WalResult<Self> {
        Self::open_with_state(config, Arc::new(WalState::new()))
    }

    /// Opens the log, sharing `state` with the rest of the engine.
    ///
    /// Creates `<data_dir>/wals` if missing, rebuilds the segment index
    /// from the directory listing, then reopens the newest segment for
    /// appending or, for an empty log, creates the first one. The global
    /// LSN is raised to the last complete batch found in the newest
    /// segment. Bytes after that batch (a torn append) are cut off.
    ///
    /// # Errors
    ///
    /// Directory failures are FATAL: the engine cannot run without a
    /// recoverable log.
    pub fn open_with_state(config: WalConfig, state: Arc<WalState>) -> WalResult<Self> {
        let wal_dir = config.wal_dir();
        if !wal_dir.exists() {
            fs::create_dir_all(&wal_dir).map_err(|e| {
                WalError::directory(
                    format!("Failed to create WAL directory: {}", wal_dir.display()),
                    e,
                )
            })?;
        }

        let index = SegmentIndex::new();
        Self::recover(&wal_dir, &index)?;

        let current = match index.max() {
            Some(last) => Self::reopen_tail(&wal_dir, last, &state)?,
            None => {
                let id = state.lsn() + 1;
                let segment =
                    Segment::create(&wal_dir, id).map_err(|e| WalError::rotate_failed(id, e))?;
                index.add(id);
                segment
            }
        };

        let (files, lsn_min) = index.stats();
        info!(
            dir = %wal_dir.display(),
            files,
            lsn_min = lsn_min.unwrap_or(0),
            lsn = state.lsn(),
            "wal: opened"
        );

        Ok(Self {
            config,
            wal_dir,
            state,
            stats: WalStats::new(),
            inner: Mutex::new(WalInner {
                current,
                subscribers: Vec::new(),
                torn_tail: false,
            }),
            index,
        })
    }

    /// Lists the log directory into `index`, skipping anything that is not
    /// a plain numeric file name.
    fn recover(wal_dir: &Path, index: &SegmentIndex) -> WalResult<()> {
        let entries = fs::read_dir(wal_dir).map_err(|e| {
            WalError::directory(
                format!("WAL directory '{}' open error", wal_dir.display()),
                e,
            )
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| {
                WalError::directory(
                    format!("WAL directory '{}' read error", wal_dir.display()),
                    e,
                )
            })?;
            let name = entry.file_name();
            let id = match name.to_str().and_then(segment_id_of) {
                Some(id) => id,
                None => {
                    debug!(entry = ?name, "wal: skipping foreign directory entry");
                    continue;
                }
            };
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                index.add(id);
            }
        }
        Ok(())
    }

    fn reopen_tail(wal_dir: &Path, id: u64, state: &WalState) -> WalResult<Segment> {
        let mut segment = Segment::open(wal_dir, id).map_err(|e| {
            WalError::directory(format!("Failed to open WAL segment {}", id), e)
        })?;

        let (last, end) = segment
            .scan()
            .map_err(|e| WalError::read_failed("Failed to scan WAL tail", e))?;
        if end < segment.size() {
            warn!(
                segment = id,
                valid = end,
                size = segment.size(),
                "wal: trimming incomplete batch at tail"
            );
            segment
                .truncate(end)
                .map_err(|e| WalError::append_failed("Failed to trim WAL tail", e))?;
        }

        let lsn = last.map(|h| h.lsn).unwrap_or(id.saturating_sub(1));
        if lsn > state.lsn() {
            state.set_lsn(lsn);
        }
        Ok(segment)
    }

    /// Appends `batch` and returns its LSN.
    ///
    /// Under the writer lock: assign `lsn + 1`, rotate if the current
    /// segment reached the threshold, append header, metadata and rows,
    /// publish the LSN, wake subscribers. If rotation or the append fails,
    /// the global LSN is unchanged and the error is returned.
    ///
    /// A failed append is cut back off the segment. If that cut fails too,
    /// the next write rotates so that no batch lands behind torn bytes.
    ///
    /// No fsync is issued.
    ///
    /// # Errors
    ///
    /// `AERO_WAL_BATCH_TOO_LARGE` when the batch does not fit the header;
    /// nothing is written or counted.
    pub fn write(&self, batch: &mut WalBatch) -> WalResult<u64> {
        let mut inner = self.inner.lock();

        let lsn = self.state.lsn() + 1;
        batch.set_lsn(lsn)?;

        self.stats.record_write(batch.size(), batch.count());

        if inner.torn_tail || inner.current.size() >= self.config.rotation_size_threshold() {
            self.rotate(&mut inner, lsn)?;
        }

        // [header][rows meta][rows]
        let before = inner.current.size();
        if let Err(e) = inner.current.write(&batch.io_slices()) {
            if let Err(te) = inner.current.truncate(before) {
                warn!(
                    segment = inner.current.id(),
                    error = %te,
                    "wal: failed to undo partial append, next write rotates"
                );
                inner.torn_tail = true;
            }
            return Err(WalError::append_failed(
                format!("Failed to append WAL batch at lsn {}", lsn),
                e,
            ));
        }

        self.state.set_lsn(lsn);

        for subscriber in &inner.subscribers {
            subscriber.signal();
        }
        Ok(lsn)
    }

    fn rotate(&self, inner: &mut WalInner, id: u64) -> WalResult<()> {
        if inner.current.id() == id {
            // nothing but the torn first append lives in the current file
            match Segment::delete(&self.wal_dir, id) {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(WalError::rotate_failed(id, e)),
            }
        }
        let segment =
            Segment::create(&self.wal_dir, id).map_err(|e| WalError::rotate_failed(id, e))?;

        let prev = std::mem::replace(&mut inner.current, segment);
        inner.torn_tail = false;
        self.index.add(id);

        if self.config.wal_sync_on_rotate {
            if let Err(e) = prev.sync() {
                warn!(segment = prev.id(), error = %e, "wal: sync of closed segment failed");
            }
        }
        debug!(segment = id, prev = prev.id(), size = prev.size(), "wal: rotated");
        Ok(())
    }

    /// Registers a subscriber for retention accounting and wakes.
    ///
    /// # Panics
    ///
    /// If the subscriber is already registered.
    pub fn add(&self, subscriber: &Subscriber) {
        let mut inner = self.inner.lock();
        Self::register(&mut inner, subscriber);
    }

    fn register(inner: &mut WalInner, subscriber: &Subscriber) {
        assert!(!subscriber.is_added(), "wal: subscriber is already registered");
        inner.subscribers.push(subscriber.clone());
        subscriber.set_added(true);
    }

    /// Unregisters a subscriber. A no-op when it is not registered.
    ///
    /// A cursor blocked on the subscriber is woken and stops following.
    pub fn del(&self, subscriber: &Subscriber) {
        if !subscriber.is_added() {
            return;
        }
        let mut inner = self.inner.lock();
        inner.subscribers.retain(|s| !s.same(subscriber));
        subscriber.set_added(false);
        subscriber.wake();
    }

    /// Enables write wakes for the subscriber.
    pub fn attach(&self, subscriber: &Subscriber) {
        let _inner = self.inner.lock();
        subscriber.set_attached(true);
    }

    /// Disables write wakes. Retention is unaffected.
    pub fn detach(&self, subscriber: &Subscriber) {
        let _inner = self.inner.lock();
        subscriber.set_attached(false);
        subscriber.wake();
    }

    /// Removes every segment no longer needed.
    ///
    /// The floor is the smaller of `checkpoint` and every registered
    /// subscriber position. Segments below the floor are deleted, except
    /// the one straddling it.
    pub fn gc(&self, checkpoint: u64) -> WalResult<GcReport> {
        let inner = self.inner.lock();

        let floor = inner
            .subscribers
            .iter()
            .map(Subscriber::position)
            .fold(checkpoint, u64::min);

        let mut report = GcReport::default();
        let mut failure = None;
        for id in self.index.gc_between(floor) {
            match Segment::delete(&self.wal_dir, id) {
                Ok(size) => {
                    report.files += 1;
                    report.bytes += size;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(segment = id, "wal: segment already removed");
                }
                Err(e) => {
                    warn!(segment = id, error = %e, "wal: failed to remove segment");
                    failure.get_or_insert(WalError::gc_failed(id, e));
                }
            }
        }
        drop(inner);

        if report.files > 0 {
            info!(
                files = report.files,
                mib = report.bytes as f64 / 1024.0 / 1024.0,
                floor,
                "wal: files removed"
            );
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// GC using the checkpoint watermark held in [`WalState`].
    pub fn gc_checkpoint(&self) -> WalResult<GcReport> {
        self.gc(self.state.checkpoint())
    }

    /// Registers `subscriber` at position 0 and lists every retained
    /// segment with its size.
    ///
    /// Both locks are held throughout, and registration happens before the
    /// listing, so no GC can remove a listed segment before the caller has
    /// advanced the subscriber past it.
    ///
    /// # Panics
    ///
    /// If the subscriber is already registered.
    pub fn snapshot(&self, subscriber: &Subscriber) -> WalResult<Vec<SnapshotFile>> {
        let mut inner = self.inner.lock();
        let ids = self.index.lock();

        Self::register(&mut inner, subscriber);
        subscriber.set(0);

        let mut files = Vec::with_capacity(ids.len());
        for &id in ids.iter() {
            let size = if id == inner.current.id() {
                inner.current.size()
            } else {
                match fs::metadata(segment_path(&self.wal_dir, id)) {
                    Ok(meta) => meta.len(),
                    Err(e) => {
                        inner.subscribers.retain(|s| !s.same(subscriber));
                        subscriber.set_added(false);
                        return Err(WalError::read_failed(
                            format!("Failed to stat WAL segment {}", id),
                            e,
                        ));
                    }
                }
            };
            files.push(SnapshotFile {
                path: format!("wals/{}", id),
                size,
            });
        }
        Ok(files)
    }

    /// Whether `lsn` is at or above the oldest retained segment.
    pub fn in_range(&self, lsn: u64) -> bool {
        match self.index.stats() {
            (_, Some(min)) => lsn >= min,
            (_, None) => false,
        }
    }

    pub fn status(&self) -> WalStatus {
        let (files, lsn_min) = self.index.stats();
        let (slots, slots_min) = {
            let inner = self.inner.lock();
            (
                inner.subscribers.len(),
                inner.subscribers.iter().map(Subscriber::position).min(),
            )
        };

        WalStatus {
            lsn: self.state.lsn(),
            lsn_min: lsn_min.unwrap_or(0),
            files,
            slots,
            slots_min,
            writes: self.stats.writes(),
            writes_bytes: self.stats.writes_bytes(),
            ops: self.stats.ops(),
            checkpoint: self.state.checkpoint(),
        }
    }

    /// Explicit fsync of the current segment.
    pub fn sync(&self) -> WalResult<()> {
        let inner = self.inner.lock();
        inner
            .current
            .sync()
            .map_err(|e| WalError::append_failed("Explicit WAL fsync failed", e))
    }

    /// Last committed LSN
    pub fn lsn(&self) -> u64 {
        self.state.lsn()
    }

    /// Id of the segment currently appended to
    pub fn current_id(&self) -> u64 {
        self.inner.lock().current.id()
    }

    pub fn state(&self) -> &Arc<WalState> {
        &self.state
    }

    /// `<data_dir>/wals`
    pub fn wal_dir(&self) -> &Path {
        &self.wal_dir
    }

    pub(crate) fn index(&self) -> &SegmentIndex {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::{WalCursor, WalErrorCode};
    use tempfile::TempDir;

    fn batch(row: &[u8]) -> WalBatch {
        let mut batch = WalBatch::new();
        batch.add(b"op", row.to_vec());
        batch
    }

    fn open(dir: &Path, wal_size: u64) -> Wal {
        Wal::open(WalConfig::new(dir).with_wal_size(wal_size)).unwrap()
    }

    #[test]
    fn test_open_creates_first_segment() {
        let temp_dir = TempDir::new().unwrap();
        let wal = open(temp_dir.path(), 1024);

        assert!(temp_dir.path().join("wals").join("1").exists());
        assert_eq!(wal.current_id(), 1);
        assert_eq!(wal.lsn(), 0);
        assert!(wal.in_range(1));
        assert!(!wal.in_range(0));
    }

    #[test]
    fn test_lsns_increment() {
        let temp_dir = TempDir::new().unwrap();
        let wal = open(temp_dir.path(), 1024 * 1024);

        let lsns: Vec<u64> = (0..5).map(|_| wal.write(&mut batch(b"r")).unwrap()).collect();
        assert_eq!(lsns, vec![1, 2, 3, 4, 5]);
        assert_eq!(wal.lsn(), 5);
        assert_eq!(wal.current_id(), 1);
    }

    #[test]
    fn test_write_fills_header_lsn() {
        let temp_dir = TempDir::new().unwrap();
        let wal = open(temp_dir.path(), 1024);

        let mut b = batch(b"x");
        let lsn = wal.write(&mut b).unwrap();
        assert_eq!(b.header().lsn, lsn);
    }

    #[test]
    fn test_oversized_batch_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let wal = open(temp_dir.path(), 1024);
        wal.write(&mut batch(b"a")).unwrap();
        let on_disk = fs::metadata(temp_dir.path().join("wals/1")).unwrap().len();

        let mut big = batch(b"b");
        big.inflate_for_test(u32::MAX as u64);
        let err = wal.write(&mut big).unwrap_err();
        assert_eq!(err.code(), WalErrorCode::AeroWalBatchTooLarge);

        assert_eq!(wal.lsn(), 1);
        assert_eq!(wal.status().writes, 1);
        assert_eq!(
            fs::metadata(temp_dir.path().join("wals/1")).unwrap().len(),
            on_disk
        );
        assert_eq!(wal.write(&mut batch(b"c")).unwrap(), 2);
    }

    #[test]
    fn test_failed_append_is_cut_back() {
        let temp_dir = TempDir::new().unwrap();
        let wal = open(temp_dir.path(), 1024);
        wal.write(&mut batch(b"first")).unwrap();
        let path = temp_dir.path().join("wals/1");
        let before = fs::metadata(&path).unwrap().len();

        wal.inner.lock().current.faults().write_after = Some(7);
        let err = wal.write(&mut batch(b"second")).unwrap_err();
        assert_eq!(err.code(), WalErrorCode::AeroWalAppendFailed);

        assert_eq!(fs::metadata(&path).unwrap().len(), before);
        assert_eq!(wal.lsn(), 1);
        assert_eq!(wal.write(&mut batch(b"second")).unwrap(), 2);
        assert_eq!(wal.current_id(), 1);

        let mut cursor = WalCursor::open(&wal, 1, None).unwrap();
        let mut lsns = Vec::new();
        while cursor.next().unwrap() {
            lsns.push(cursor.at().unwrap().lsn());
        }
        assert_eq!(lsns, vec![1, 2]);
    }

    #[test]
    fn test_failed_undo_forces_rotation() {
        let temp_dir = TempDir::new().unwrap();
        let wal = open(temp_dir.path(), 1024 * 1024);
        wal.write(&mut batch(b"first")).unwrap();

        {
            let mut inner = wal.inner.lock();
            let faults = inner.current.faults();
            faults.write_after = Some(5);
            faults.fail_truncate = true;
        }
        assert!(wal.write(&mut batch(b"second")).is_err());
        assert_eq!(wal.lsn(), 1);

        // far below the threshold, but the torn bytes must stay behind
        assert_eq!(wal.write(&mut batch(b"second")).unwrap(), 2);
        assert_eq!(wal.current_id(), 2);
        assert_eq!(wal.index().ids(), vec![1, 2]);

        let mut cursor = WalCursor::open(&wal, 1, None).unwrap();
        let mut lsns = Vec::new();
        while cursor.next().unwrap() {
            lsns.push(cursor.at().unwrap().lsn());
        }
        assert_eq!(lsns, vec![1, 2]);
    }

    #[test]
    fn test_failed_undo_in_fresh_segment_recreates_it() {
        let temp_dir = TempDir::new().unwrap();
        let wal = open(temp_dir.path(), 1024);

        {
            let mut inner = wal.inner.lock();
            let faults = inner.current.faults();
            faults.write_after = Some(3);
            faults.fail_truncate = true;
        }
        assert!(wal.write(&mut batch(b"lost")).is_err());
        assert_eq!(wal.lsn(), 0);

        assert_eq!(wal.write(&mut batch(b"kept")).unwrap(), 1);
        assert_eq!(wal.current_id(), 1);
        assert_eq!(wal.index().ids(), vec![1]);

        let mut cursor = WalCursor::open(&wal, 1, None).unwrap();
        assert!(cursor.next().unwrap());
        assert_eq!(cursor.at().unwrap().payload(), b"opkept");
        assert!(!cursor.next().unwrap());
    }

    #[test]
    fn test_rotation_on_threshold() {
        let temp_dir = TempDir::new().unwrap();
        let wal = open(temp_dir.path(), 64);

        wal.write(&mut batch(&[0u8; 10])).unwrap();
        assert_eq!(wal.current_id(), 1);
        wal.write(&mut batch(&[0u8; 60])).unwrap();
        assert_eq!(wal.current_id(), 1);

        // segment 1 is now past 64 bytes
        let lsn = wal.write(&mut batch(b"z")).unwrap();
        assert_eq!(lsn, 3);
        assert_eq!(wal.current_id(), 3);
        assert_eq!(wal.index().ids(), vec![1, 3]);
    }

    #[test]
    fn test_rotation_failure_keeps_previous_segment() {
        let temp_dir = TempDir::new().unwrap();
        let wal = open(temp_dir.path(), 1);

        wal.write(&mut batch(b"a")).unwrap();
        let segment_one = fs::metadata(temp_dir.path().join("wals/1")).unwrap().len();

        // occupy the next segment name
        let blocker = temp_dir.path().join("wals/2");
        fs::create_dir(&blocker).unwrap();

        let err = wal.write(&mut batch(b"b")).unwrap_err();
        assert_eq!(err.code(), WalErrorCode::AeroWalRotateFailed);
        assert_eq!(wal.lsn(), 1);
        assert_eq!(wal.current_id(), 1);
        assert_eq!(
            fs::metadata(temp_dir.path().join("wals/1")).unwrap().len(),
            segment_one
        );

        fs::remove_dir(&blocker).unwrap();
        assert_eq!(wal.write(&mut batch(b"b")).unwrap(), 2);
        assert_eq!(wal.current_id(), 2);
    }

    #[test]
    fn test_recovery_skips_foreign_entries() {
        let temp_dir = TempDir::new().unwrap();
        let wals = temp_dir.path().join("wals");
        fs::create_dir_all(&wals).unwrap();
        fs::write(wals.join("notes.txt"), b"x").unwrap();
        fs::write(wals.join(".lock"), b"").unwrap();
        fs::write(wals.join("12abc"), b"").unwrap();

        let wal = open(temp_dir.path(), 1024);
        assert_eq!(wal.index().ids(), vec![1]);
    }

    #[test]
    fn test_reopen_resumes_lsn() {
        let temp_dir = TempDir::new().unwrap();
        {
            let wal = open(temp_dir.path(), 40);
            for _ in 0..4 {
                wal.write(&mut batch(b"payload-bytes")).unwrap();
            }
        }

        let wal = open(temp_dir.path(), 40);
        assert_eq!(wal.lsn(), 4);
        assert_eq!(wal.write(&mut batch(b"next")).unwrap(), 5);
    }

    #[test]
    fn test_reopen_trims_torn_tail() {
        let temp_dir = TempDir::new().unwrap();
        let full;
        {
            let wal = open(temp_dir.path(), 1024);
            wal.write(&mut batch(b"one")).unwrap();
            full = fs::metadata(temp_dir.path().join("wals/1")).unwrap().len();
            wal.write(&mut batch(b"two")).unwrap();
        }
        let path = temp_dir.path().join("wals/1");
        let torn = fs::metadata(&path).unwrap().len() - 2;
        fs::OpenOptions::new().write(true).open(&path).unwrap().set_len(torn).unwrap();

        let wal = open(temp_dir.path(), 1024);
        assert_eq!(wal.lsn(), 1);
        assert_eq!(fs::metadata(&path).unwrap().len(), full);
        assert_eq!(wal.write(&mut batch(b"two again")).unwrap(), 2);
    }

    #[test]
    fn test_shared_state_lsn_wins_when_ahead() {
        let temp_dir = TempDir::new().unwrap();
        let state = Arc::new(WalState::new());
        state.set_lsn(99);

        let wal = Wal::open_with_state(WalConfig::new(temp_dir.path()), state.clone()).unwrap();
        assert_eq!(wal.current_id(), 100);
        assert_eq!(wal.write(&mut batch(b"x")).unwrap(), 100);
        assert_eq!(state.lsn(), 100);
    }

    #[test]
    fn test_gc_respects_subscribers() {
        let temp_dir = TempDir::new().unwrap();
        let wal = open(temp_dir.path(), 1);
        for _ in 0..3 {
            wal.write(&mut batch(b"r")).unwrap();
        }
        assert_eq!(wal.index().ids(), vec![1, 2, 3]);

        let slow = Subscriber::at(1);
        wal.add(&slow);
        let report = wal.gc(3).unwrap();
        assert_eq!(report.files, 0);
        assert_eq!(wal.index().ids(), vec![1, 2, 3]);

        slow.set(3);
        let report = wal.gc(3).unwrap();
        assert_eq!(report.files, 2);
        assert!(report.bytes > 0);
        assert_eq!(wal.index().ids(), vec![3]);
        assert!(!temp_dir.path().join("wals/1").exists());
        assert!(wal.in_range(slow.position()));
    }

    #[test]
    fn test_gc_without_subscribers_uses_checkpoint() {
        let temp_dir = TempDir::new().unwrap();
        let wal = open(temp_dir.path(), 1);
        for _ in 0..4 {
            wal.write(&mut batch(b"r")).unwrap();
        }
        wal.state().set_checkpoint(3);
        let report = wal.gc_checkpoint().unwrap();
        assert_eq!(report.files, 2);
        assert_eq!(wal.index().ids(), vec![3, 4]);
    }

    #[test]
    fn test_gc_never_removes_current() {
        let temp_dir = TempDir::new().unwrap();
        let wal = open(temp_dir.path(), 1);
        wal.write(&mut batch(b"r")).unwrap();
        wal.write(&mut batch(b"r")).unwrap();
        wal.gc(u64::MAX).unwrap();
        assert_eq!(wal.index().ids(), vec![wal.current_id()]);
        assert_eq!(wal.write(&mut batch(b"r")).unwrap(), 3);
    }

    #[test]
    fn test_snapshot_of_registered_subscriber_keeps_position() {
        let temp_dir = TempDir::new().unwrap();
        let wal = open(temp_dir.path(), 1024);
        let s = Subscriber::at(9);
        wal.add(&s);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| wal.snapshot(&s)));
        assert!(result.is_err());
        assert_eq!(s.position(), 9);
        assert_eq!(wal.status().slots, 1);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_duplicate_add_panics() {
        let temp_dir = TempDir::new().unwrap();
        let wal = open(temp_dir.path(), 1024);
        let s = Subscriber::new();
        wal.add(&s);
        wal.add(&s);
    }

    #[test]
    fn test_del_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let wal = open(temp_dir.path(), 1024);
        let s = Subscriber::new();
        wal.del(&s);
        wal.add(&s);
        assert_eq!(wal.status().slots, 1);
        wal.del(&s);
        wal.del(&s);
        assert_eq!(wal.status().slots, 0);
        assert!(!s.is_added());
        // can be registered again after removal
        wal.add(&s);
        assert_eq!(wal.status().slots, 1);
    }

    #[test]
    fn test_snapshot_registers_then_lists() {
        let temp_dir = TempDir::new().unwrap();
        let wal = open(temp_dir.path(), 1);
        wal.write(&mut batch(b"aaaa")).unwrap();
        wal.write(&mut batch(b"bb")).unwrap();

        let s = Subscriber::at(77);
        let files = wal.snapshot(&s).unwrap();
        assert!(s.is_added());
        assert_eq!(s.position(), 0);
        assert_eq!(
            files.iter().map(|f| f.path.as_str()).collect::<Vec<_>>(),
            vec!["wals/1", "wals/2"]
        );
        for f in &files {
            let on_disk = fs::metadata(temp_dir.path().join(&f.path)).unwrap().len();
            assert_eq!(f.size, on_disk);
        }

        // the snapshot subscriber pins everything
        assert_eq!(wal.gc(u64::MAX).unwrap().files, 0);
    }

    #[test]
    fn test_status_fields() {
        let temp_dir = TempDir::new().unwrap();
        let wal = open(temp_dir.path(), 1024);

        let mut b = WalBatch::new();
        b.add(b"m1", b"r1".to_vec());
        b.add(b"m2", b"r2".to_vec());
        let size = b.size();
        wal.write(&mut b).unwrap();
        wal.add(&Subscriber::at(1));
        wal.state().set_checkpoint(1);

        let status = wal.status();
        assert_eq!(status.lsn, 1);
        assert_eq!(status.lsn_min, 1);
        assert_eq!(status.files, 1);
        assert_eq!(status.slots, 1);
        assert_eq!(status.slots_min, Some(1));
        assert_eq!(status.writes, 1);
        assert_eq!(status.writes_bytes, size);
        assert_eq!(status.ops, 2);
        assert_eq!(status.checkpoint, 1);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["lsn"], 1);
        assert_eq!(json["slots_min"], 1);
    }

    #[test]
    fn test_status_without_subscribers() {
        let temp_dir = TempDir::new().unwrap();
        let wal = open(temp_dir.path(), 1024);
        let status = wal.status();
        assert_eq!(status.slots, 0);
        assert_eq!(status.slots_min, None);
    }

    #[test]
    fn test_explicit_sync() {
        let temp_dir = TempDir::new().unwrap();
        let wal = open(temp_dir.path(), 1024);
        wal.write(&mut batch(b"x")).unwrap();
        assert!(wal.sync().is_ok());
    }
}

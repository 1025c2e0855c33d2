//! Registered log consumers
//!
//! A subscriber is a consumer position (an LSN watermark) plus a wake
//! channel. The position holds back garbage collection; the wake channel
//! lets a follow-mode cursor sleep until the writer appends.
//!
//! Positions are written by the owning consumer and read by the writer
//! with single atomic loads. The wake channel is edge-triggered and carries
//! no payload: any number of writes between two waits collapse into one
//! wake, and a wake may be spurious, so consumers always re-read after
//! waking.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct WakeChannel {
    attached: AtomicBool,
    pending: Mutex<bool>,
    cond: Condvar,
}

#[derive(Debug, Default)]
struct SubscriberInner {
    position: AtomicU64,
    added: AtomicBool,
    wake: WakeChannel,
}

/// Handle to a consumer position.
///
/// Cloning yields another handle to the same subscriber; the log keeps one
/// in its registry between `add` and `del`.
#[derive(Debug, Clone, Default)]
pub struct Subscriber {
    inner: Arc<SubscriberInner>,
}

impl Subscriber {
    /// New detached, unregistered subscriber at position 0
    pub fn new() -> Self {
        Self::default()
    }

    /// New subscriber starting at `lsn`
    pub fn at(lsn: u64) -> Self {
        let subscriber = Self::new();
        subscriber.set(lsn);
        subscriber
    }

    /// Oldest LSN this consumer still needs.
    pub fn position(&self) -> u64 {
        self.inner.position.load(Ordering::Acquire)
    }

    /// Advances (or resets) the consumer position.
    pub fn set(&self, lsn: u64) {
        self.inner.position.store(lsn, Ordering::Release);
    }

    /// Whether the subscriber is in a log's registry
    pub fn is_added(&self) -> bool {
        self.inner.added.load(Ordering::Acquire)
    }

    /// Whether writes currently wake this subscriber
    pub fn is_attached(&self) -> bool {
        self.inner.wake.attached.load(Ordering::Acquire)
    }

    pub fn same(&self, other: &Subscriber) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn set_added(&self, added: bool) {
        self.inner.added.store(added, Ordering::Release);
    }

    pub(crate) fn set_attached(&self, attached: bool) {
        self.inner.wake.attached.store(attached, Ordering::Release);
    }

    /// Wakes the consumer if its channel is attached.
    pub(crate) fn signal(&self) {
        if self.is_attached() {
            self.wake();
        }
    }

    /// Wakes the consumer unconditionally. Used on detach and removal so
    /// that a blocked cursor can observe it was cancelled.
    pub(crate) fn wake(&self) {
        let mut pending = self.inner.wake.pending.lock();
        *pending = true;
        self.inner.wake.cond.notify_all();
    }

    fn waitable(&self) -> bool {
        self.is_added() && self.is_attached()
    }

    /// Blocks until the next wake.
    ///
    /// Returns immediately when a wake is already pending or when the
    /// subscriber is detached or unregistered.
    pub fn wait(&self) {
        let mut pending = self.inner.wake.pending.lock();
        while !*pending && self.waitable() {
            self.inner.wake.cond.wait(&mut pending);
        }
        *pending = false;
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`.
    ///
    /// Returns false on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut pending = self.inner.wake.pending.lock();
        while !*pending && self.waitable() {
            if self.inner.wake.cond.wait_for(&mut pending, timeout).timed_out() {
                break;
            }
        }
        let woken = *pending || !self.waitable();
        *pending = false;
        woken
    }
}

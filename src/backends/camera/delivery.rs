// SPDX-License-Identifier: GPL-3.0-only

//! Frame delivery channel
//!
//! The platform scheduler calls [`FrameTrampoline::on_buffer`] on its own
//! thread for every complete buffer. The trampoline only holds a weak
//! reference to its target, so a session that is gone can never be reached
//! from a late callback. Nothing on this path allocates once the latest-frame
//! slot has grown to the stream's frame size, and nothing logs per frame.

use super::types::FrameBuffer;
use crate::errors::{CaptureError, CaptureResult, ErrorKind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError, TryLockError, Weak};
use std::time::{Duration, Instant};

/// Receiver of frames on the scheduler thread
pub trait FrameSink: Send + Sync {
    /// Called synchronously per frame. `frame` is invalid after return.
    fn deliver(&self, frame: FrameBuffer<'_>);
}

/// Minimal callback object installed on the grabber
pub struct FrameTrampoline {
    target: Weak<dyn FrameSink>,
}

impl FrameTrampoline {
    pub fn new(target: &Arc<dyn FrameSink>) -> Self {
        Self {
            target: Arc::downgrade(target),
        }
    }

    /// Forward one raw buffer. Empty buffers are ignored.
    pub fn on_buffer(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        if let Some(target) = self.target.upgrade() {
            target.deliver(FrameBuffer::new(data));
        }
    }

    /// Whether the target is still alive
    pub fn is_connected(&self) -> bool {
        self.target.strong_count() > 0
    }
}

impl std::fmt::Debug for FrameTrampoline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameTrampoline")
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Host-provided per-frame function
pub type HostSink = Box<dyn Fn(FrameBuffer<'_>) + Send + Sync>;

/// Owned copy of a frame handed out by a pull
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub data: Vec<u8>,
    /// Per-session delivery counter, starting at 1
    pub sequence: u64,
}

struct Slot {
    data: Vec<u8>,
    sequence: u64,
    served: u64,
}

/// Single-slot store of the most recent frame
///
/// A writer that finds the slot busy drops its frame instead of waiting, so
/// a slow reader loses frames rather than stalling the scheduler.
pub struct LatestFrame {
    slot: Mutex<Slot>,
    updated: Condvar,
    dropped: AtomicU64,
}

impl Default for LatestFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl LatestFrame {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                data: Vec::new(),
                sequence: 0,
                served: 0,
            }),
            updated: Condvar::new(),
            dropped: AtomicU64::new(0),
        }
    }

    /// Store a frame, replacing the previous one
    pub fn store(&self, frame: &[u8]) {
        let mut slot = match self.slot.try_lock() {
            Ok(slot) => slot,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };
        slot.data.clear();
        slot.data.extend_from_slice(frame);
        slot.sequence += 1;
        drop(slot);
        self.updated.notify_all();
    }

    /// Forget everything from the previous session. Capacity is kept.
    pub fn reset(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.data.clear();
        slot.sequence = 0;
        slot.served = 0;
        self.dropped.store(0, Ordering::Relaxed);
    }

    /// Wait up to `timeout` for a frame newer than the last one taken.
    ///
    /// Fails with [`ErrorKind::FrameEmpty`] when nothing was ever stored and
    /// [`ErrorKind::FrameNotUpdated`] when nothing new arrived in time.
    pub fn take(&self, timeout: Duration) -> CaptureResult<Frame> {
        // A timeout past the end of the clock waits without a deadline
        let deadline = Instant::now().checked_add(timeout);
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);

        while slot.sequence == slot.served {
            slot = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    self.updated
                        .wait_timeout(slot, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .updated
                    .wait(slot)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }

        if slot.sequence == 0 {
            return Err(CaptureError::from(ErrorKind::FrameEmpty));
        }
        if slot.sequence == slot.served {
            return Err(CaptureError::new(
                ErrorKind::FrameNotUpdated,
                format!("no frame after #{} within {:?}", slot.sequence, timeout),
            ));
        }

        slot.served = slot.sequence;
        Ok(Frame {
            data: slot.data.clone(),
            sequence: slot.sequence,
        })
    }

    /// Number of frames stored since the last reset
    pub fn sequence(&self) -> u64 {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sequence
    }

    /// Frames dropped because a reader held the slot
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Per-session delivery target: host sink first, then the latest-frame slot
pub struct DeliveryTarget {
    host: Option<HostSink>,
    latest: Arc<LatestFrame>,
}

impl DeliveryTarget {
    pub fn new(latest: Arc<LatestFrame>, host: Option<HostSink>) -> Self {
        Self { host, latest }
    }
}

impl FrameSink for DeliveryTarget {
    fn deliver(&self, frame: FrameBuffer<'_>) {
        if let Some(host) = &self.host {
            host(frame);
        }
        self.latest.store(frame.as_slice());
    }
}

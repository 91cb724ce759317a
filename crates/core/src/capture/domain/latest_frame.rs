use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::shared::frame::Frame;

struct Slot {
    frame: Option<Frame>,
    closed: bool,
}

/// The shared latest-frame cell between the capture producer and the
/// detection cycle.
///
/// Holds at most one frame, "the most recently captured". Writes replace
/// the previous frame wholesale under the lock, so a reader can never
/// observe a torn frame; it may observe a stale one, which is tolerated.
///
/// The cell doubles as the producer's startup signal: the consumer waits on
/// `wait_for_frame` instead of sleeping a fixed warm-up interval.
pub struct LatestFrame {
    slot: Mutex<Slot>,
    ready: Condvar,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                frame: None,
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    /// Replaces the held frame with a newer one.
    pub fn publish(&self, frame: Frame) {
        let mut slot = self.slot.lock().expect("latest-frame lock poisoned");
        slot.frame = Some(frame);
        self.ready.notify_all();
    }

    /// Deep copy of the held frame, `None` if nothing was published yet.
    pub fn snapshot(&self) -> Option<Frame> {
        let slot = self.slot.lock().expect("latest-frame lock poisoned");
        slot.frame.clone()
    }

    /// Marks the producer as finished and wakes any waiter.
    ///
    /// The last published frame stays readable; only freshness ends.
    pub fn close(&self) {
        let mut slot = self.slot.lock().expect("latest-frame lock poisoned");
        slot.closed = true;
        self.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.slot.lock().expect("latest-frame lock poisoned").closed
    }

    /// Blocks until a frame has been published, the cell closes, or the
    /// timeout lapses. Returns `true` when a frame is available.
    pub fn wait_for_frame(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock().expect("latest-frame lock poisoned");
        while slot.frame.is_none() && !slot.closed {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let (guard, result) = self
                .ready
                .wait_timeout(slot, remaining)
                .expect("latest-frame lock poisoned");
            slot = guard;
            if result.timed_out() {
                break;
            }
        }
        slot.frame.is_some()
    }
}

impl Default for LatestFrame {
    fn default() -> Self {
        Self::new()
    }
}

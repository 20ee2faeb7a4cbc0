//! Debounced pass scheduler
//!
//! A `Pass` coalesces bursts of triggers into a single deferred invocation:
//! `schedule()` arms one pending deadline, repeated calls before it fires
//! re-arm it (classic trailing-edge debounce), and `cancel()` clears it.
//! Used to avoid redundant animation restarts during resize storms and to
//! coalesce document re-scans.
//!
//! Passes are driven by the [`FrameScheduler`] clock: the scheduler polls
//! registered passes after each tick's mutate phase, so a pass fires on the
//! first tick whose clock is at or past the deadline. At most one firing is
//! ever pending; the callback is invoked with no arguments.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::vsync::FrameScheduler;

type PassCallback = Arc<dyn Fn() + Send + Sync>;

pub(crate) struct PassInner {
    deadline: Option<Instant>,
    default_delay: Duration,
    callback: PassCallback,
}

impl PassInner {
    pub(crate) fn take_if_due(&mut self, now: Instant) -> Option<PassCallback> {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                Some(Arc::clone(&self.callback))
            }
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct Pass {
    inner: Arc<Mutex<PassInner>>,
    scheduler: FrameScheduler,
}

impl Pass {
    /// Create a pass bound to `callback`. The pass stays registered with the
    /// scheduler until every `Pass` handle is dropped.
    pub fn new(
        scheduler: &FrameScheduler,
        default_delay: Duration,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        let inner = Arc::new(Mutex::new(PassInner {
            deadline: None,
            default_delay,
            callback: Arc::new(callback),
        }));
        scheduler.register_timer(Arc::downgrade(&inner));
        Self {
            inner,
            scheduler: scheduler.clone(),
        }
    }

    /// Arm (or re-arm) the pass with its default delay.
    pub fn schedule(&self) {
        let delay = self.inner.lock().unwrap().default_delay;
        self.schedule_after(delay);
    }

    /// Arm (or re-arm) the pass to fire `delay` after the scheduler's
    /// current clock. A pending deadline is replaced, never added to.
    pub fn schedule_after(&self, delay: Duration) {
        let now = self.scheduler.now();
        let mut inner = self.inner.lock().unwrap();
        inner.deadline = Some(now + delay);
    }

    /// Clear any pending firing. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner.deadline.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.inner.lock().unwrap().deadline.is_some()
    }
}

//! Measure/mutate frame scheduler
//!
//! The single pump that all per-frame work goes through. Each tick runs two
//! disjoint phases: **measure** (read-only layout queries) and then
//! **mutate** (DOM writes), so reads never observe a mid-mutation document
//! and no forced synchronous reflow occurs.
//!
//! Tasks scheduled during the measure phase of a tick land in that same
//! tick's mutate phase; everything else lands in the next tick. The host
//! drives the pump by calling [`FrameScheduler::tick`] once per frame (or
//! [`FrameScheduler::tick_at`] with an explicit clock, which tests use).
//!
//! Debounced [`Pass`](crate::pass::Pass) timers register here and are polled
//! after the mutate phase with the same clock.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};
use std::time::Instant;

use crate::pass::PassInner;

type Task = Box<dyn FnOnce() + Send>;

/// The phase a tick is currently executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Measure,
    Mutate,
}

/// A combined measure+mutate job sharing one state value, mirroring the
/// classic `run({measure, mutate}, state)` contract.
pub struct FrameTask<S> {
    measure: Option<Box<dyn FnOnce(&mut S) + Send>>,
    mutate: Option<Box<dyn FnOnce(&mut S) + Send>>,
}

impl<S> FrameTask<S> {
    pub fn new() -> Self {
        Self {
            measure: None,
            mutate: None,
        }
    }

    pub fn measure(mut self, f: impl FnOnce(&mut S) + Send + 'static) -> Self {
        self.measure = Some(Box::new(f));
        self
    }

    pub fn mutate(mut self, f: impl FnOnce(&mut S) + Send + 'static) -> Self {
        self.mutate = Some(Box::new(f));
        self
    }
}

impl<S> Default for FrameTask<S> {
    fn default() -> Self {
        Self::new()
    }
}

struct FrameInner {
    measure_queue: VecDeque<Task>,
    mutate_queue: VecDeque<Task>,
    timers: Vec<Weak<Mutex<PassInner>>>,
    phase: Phase,
    frame: u64,
    now: Instant,
}

/// Cheap-to-clone handle to the per-document frame pump.
#[derive(Clone)]
pub struct FrameScheduler {
    inner: Arc<Mutex<FrameInner>>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FrameInner {
                measure_queue: VecDeque::new(),
                mutate_queue: VecDeque::new(),
                timers: Vec::new(),
                phase: Phase::Idle,
                frame: 0,
                now: Instant::now(),
            })),
        }
    }

    /// Queue a layout read for the next measure phase.
    pub fn measure(&self, f: impl FnOnce() + Send + 'static) {
        self.inner.lock().unwrap().measure_queue.push_back(Box::new(f));
    }

    /// Queue a write for the next mutate phase. A mutate queued from inside
    /// a measure task runs in the same tick.
    pub fn mutate(&self, f: impl FnOnce() + Send + 'static) {
        self.inner.lock().unwrap().mutate_queue.push_back(Box::new(f));
    }

    /// Queue a measure+mutate pair sharing `state`. The mutate half never
    /// runs before the measure half.
    pub fn run<S: Send + 'static>(&self, state: S, task: FrameTask<S>) {
        let FrameTask { measure, mutate } = task;
        match (measure, mutate) {
            (None, None) => {}
            (Some(m), None) => self.measure(move || {
                let mut state = state;
                m(&mut state);
            }),
            (None, Some(mu)) => self.mutate(move || {
                let mut state = state;
                mu(&mut state);
            }),
            (Some(m), Some(mu)) => {
                let scheduler = self.clone();
                self.measure(move || {
                    let mut state = state;
                    m(&mut state);
                    scheduler.mutate(move || {
                        mu(&mut state);
                    });
                });
            }
        }
    }

    /// Run one frame: measure phase, mutate phase, then due debounce timers.
    ///
    /// `now` drives the virtual clock used by [`Pass`](crate::pass::Pass)
    /// deadlines; hosts normally call [`tick`](Self::tick) instead.
    pub fn tick_at(&self, now: Instant) {
        let measures = {
            let mut inner = self.inner.lock().unwrap();
            inner.now = now;
            inner.frame += 1;
            inner.phase = Phase::Measure;
            std::mem::take(&mut inner.measure_queue)
        };
        for task in measures {
            run_isolated(task, "measure");
        }

        let mutates = {
            let mut inner = self.inner.lock().unwrap();
            inner.phase = Phase::Mutate;
            std::mem::take(&mut inner.mutate_queue)
        };
        for task in mutates {
            run_isolated(task, "mutate");
        }

        let timers: Vec<Arc<Mutex<PassInner>>> = {
            let mut inner = self.inner.lock().unwrap();
            inner.phase = Phase::Idle;
            inner.timers.retain(|t| t.strong_count() > 0);
            inner.timers.iter().filter_map(Weak::upgrade).collect()
        };
        for timer in timers {
            let due = {
                let mut pass = timer.lock().unwrap();
                pass.take_if_due(now)
            };
            if let Some(callback) = due {
                callback();
            }
        }
    }

    /// Run one frame at the real wall clock.
    pub fn tick(&self) {
        self.tick_at(Instant::now());
    }

    /// The clock of the most recent tick. Pass deadlines are computed
    /// against this, which keeps debounce behavior deterministic under
    /// test-driven ticking.
    pub fn now(&self) -> Instant {
        self.inner.lock().unwrap().now
    }

    pub fn frame(&self) -> u64 {
        self.inner.lock().unwrap().frame
    }

    pub fn phase(&self) -> Phase {
        self.inner.lock().unwrap().phase
    }

    pub fn pending_measures(&self) -> usize {
        self.inner.lock().unwrap().measure_queue.len()
    }

    pub fn pending_mutates(&self) -> usize {
        self.inner.lock().unwrap().mutate_queue.len()
    }

    pub(crate) fn register_timer(&self, timer: Weak<Mutex<PassInner>>) {
        self.inner.lock().unwrap().timers.push(timer);
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}

fn run_isolated(task: Task, phase: &'static str) {
    if catch_unwind(AssertUnwindSafe(task)).is_err() {
        tracing::error!(phase, "frame task panicked; continuing with the remaining tasks");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::time::Duration;

    #[test]
    fn test_measure_runs_before_mutate() {
        let scheduler = FrameScheduler::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let log_m = Arc::clone(&log);
        scheduler.mutate(move || log_m.lock().unwrap().push("mutate"));
        let log_r = Arc::clone(&log);
        scheduler.measure(move || log_r.lock().unwrap().push("measure"));

        scheduler.tick();
        assert_eq!(log.lock().unwrap().as_slice(), ["measure", "mutate"]);
    }

    #[test]
    fn test_mutate_from_measure_runs_same_tick() {
        let scheduler = FrameScheduler::new();
        let calls = Arc::new(AtomicI32::new(0));

        let calls_clone = Arc::clone(&calls);
        let inner_scheduler = scheduler.clone();
        scheduler.measure(move || {
            inner_scheduler.mutate(move || {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            });
        });

        scheduler.tick();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_measure_from_measure_runs_next_tick() {
        let scheduler = FrameScheduler::new();
        let calls = Arc::new(AtomicI32::new(0));

        let calls_clone = Arc::clone(&calls);
        let inner_scheduler = scheduler.clone();
        scheduler.measure(move || {
            inner_scheduler.measure(move || {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            });
        });

        scheduler.tick();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        scheduler.tick();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_run_shares_state_between_phases() {
        let scheduler = FrameScheduler::new();
        let result = Arc::new(AtomicI32::new(0));

        let result_clone = Arc::clone(&result);
        scheduler.run(
            0i32,
            FrameTask::new()
                .measure(|state: &mut i32| *state = 21)
                .mutate(move |state: &mut i32| {
                    result_clone.store(*state * 2, Ordering::SeqCst);
                }),
        );

        scheduler.tick();
        assert_eq!(result.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn test_panicking_task_does_not_abort_tick() {
        let scheduler = FrameScheduler::new();
        let calls = Arc::new(AtomicI32::new(0));

        scheduler.measure(|| panic!("boom"));
        let calls_clone = Arc::clone(&calls);
        scheduler.measure(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        scheduler.tick();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_virtual_clock_advances_with_ticks() {
        let scheduler = FrameScheduler::new();
        let t0 = Instant::now();
        scheduler.tick_at(t0);
        assert_eq!(scheduler.now(), t0);
        scheduler.tick_at(t0 + Duration::from_millis(16));
        assert_eq!(scheduler.now(), t0 + Duration::from_millis(16));
        assert_eq!(scheduler.frame(), 2);
    }
}

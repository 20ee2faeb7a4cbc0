//! Playback gating
//!
//! Couples a visibility stream to an abstract animation runner. The gate
//! tracks two booleans — `triggered` (the consumer was activated) and
//! `visible` (the policy engine's output) — and only lets playback proceed
//! while both hold. A resize cancels the current runner and re-creates it
//! through a debounced pass, so resize storms cause one restart, not one
//! per event.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use sightline_core::pass::Pass;
use sightline_core::vsync::FrameScheduler;

use crate::visibility::VisibilityEvent;

/// Delay for coalescing restart requests after resizes.
pub const RESTART_DELAY: Duration = Duration::from_millis(50);

/// An animation runner the gate drives. Implementations must not call back
/// into the gate from these methods.
pub trait Playback: Send {
    fn start(&mut self);
    fn pause(&mut self);
    fn resume(&mut self);
    fn cancel(&mut self);
    fn finish(&mut self);
    fn seek_to(&mut self, time_ms: f64);
    fn reverse(&mut self);
    fn is_paused(&self) -> bool;
}

type PlaybackFactory = Box<dyn FnMut() -> Box<dyn Playback> + Send>;

struct GateInner {
    runner: Option<Box<dyn Playback>>,
    factory: PlaybackFactory,
    triggered: bool,
    visible: bool,
}

#[derive(Clone)]
pub struct PlaybackGate {
    inner: Arc<Mutex<GateInner>>,
    restart_pass: Pass,
}

impl PlaybackGate {
    /// `factory` creates a fresh runner whenever playback (re)starts with no
    /// live runner — after the first start or after a cancel.
    pub fn new(
        scheduler: &FrameScheduler,
        factory: impl FnMut() -> Box<dyn Playback> + Send + 'static,
    ) -> Self {
        let inner = Arc::new(Mutex::new(GateInner {
            runner: None,
            factory: Box::new(factory),
            triggered: false,
            visible: false,
        }));
        let weak = Arc::downgrade(&inner);
        let restart_pass = Pass::new(scheduler, RESTART_DELAY, move || {
            start_or_resume(&weak);
        });
        Self {
            inner,
            restart_pass,
        }
    }

    /// Apply a visibility engine event: enter resumes, exit pauses.
    pub fn apply(&self, event: &VisibilityEvent) {
        match event {
            VisibilityEvent::Enter => self.set_visible(true),
            VisibilityEvent::Exit { .. } => self.set_visible(false),
            VisibilityEvent::Progress { .. } => {}
        }
    }

    pub fn set_visible(&self, visible: bool) {
        {
            let mut gate = self.inner.lock().unwrap();
            if gate.visible == visible {
                return;
            }
            gate.visible = visible;
            if !visible {
                if let Some(runner) = gate.runner.as_mut() {
                    runner.pause();
                }
                return;
            }
        }
        start_or_resume(&Arc::downgrade(&self.inner));
    }

    /// Activate playback. The runner actually starts only once visible.
    pub fn start(&self) {
        self.inner.lock().unwrap().triggered = true;
        start_or_resume(&Arc::downgrade(&self.inner));
    }

    /// Cancel the current runner and activate from scratch.
    pub fn restart(&self) {
        {
            let mut gate = self.inner.lock().unwrap();
            if let Some(mut runner) = gate.runner.take() {
                runner.cancel();
            }
            gate.triggered = true;
        }
        start_or_resume(&Arc::downgrade(&self.inner));
    }

    pub fn pause(&self) {
        let mut gate = self.inner.lock().unwrap();
        if let Some(runner) = gate.runner.as_mut() {
            runner.pause();
        }
    }

    pub fn resume(&self) {
        let mut gate = self.inner.lock().unwrap();
        if gate.triggered && gate.visible {
            if let Some(runner) = gate.runner.as_mut() {
                runner.resume();
            }
        }
    }

    pub fn toggle_pause(&self) {
        let mut gate = self.inner.lock().unwrap();
        if !(gate.triggered && gate.visible) {
            return;
        }
        let Some(runner) = gate.runner.as_mut() else {
            return;
        };
        if runner.is_paused() {
            runner.resume();
        } else {
            runner.pause();
        }
    }

    pub fn seek_to(&self, time_ms: f64) {
        let mut gate = self.inner.lock().unwrap();
        if gate.triggered && gate.visible {
            if let Some(runner) = gate.runner.as_mut() {
                runner.seek_to(time_ms);
            }
        }
    }

    pub fn reverse(&self) {
        let mut gate = self.inner.lock().unwrap();
        if gate.triggered && gate.visible {
            if let Some(runner) = gate.runner.as_mut() {
                runner.reverse();
            }
        }
    }

    /// Finish playback and deactivate.
    pub fn finish(&self) {
        let mut gate = self.inner.lock().unwrap();
        gate.triggered = false;
        if let Some(mut runner) = gate.runner.take() {
            runner.finish();
        }
    }

    /// Cancel playback and deactivate.
    pub fn cancel(&self) {
        let mut gate = self.inner.lock().unwrap();
        gate.triggered = false;
        if let Some(mut runner) = gate.runner.take() {
            runner.cancel();
        }
    }

    /// A resize invalidated the runner's measurements: cancel it now,
    /// restart once the storm quiets down.
    pub fn handle_resize(&self) {
        let schedule = {
            let mut gate = self.inner.lock().unwrap();
            if let Some(mut runner) = gate.runner.take() {
                runner.cancel();
            }
            gate.triggered && gate.visible
        };
        if schedule {
            tracing::debug!("restart coalesced behind resize debounce");
            self.restart_pass.schedule();
        }
    }

    pub fn has_runner(&self) -> bool {
        self.inner.lock().unwrap().runner.is_some()
    }

    pub fn is_restart_pending(&self) -> bool {
        self.restart_pass.is_pending()
    }
}

fn start_or_resume(weak: &Weak<Mutex<GateInner>>) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    let mut gate = inner.lock().unwrap();
    if !(gate.triggered && gate.visible) {
        return;
    }
    if let Some(runner) = gate.runner.as_mut() {
        runner.resume();
        return;
    }
    let mut runner = (gate.factory)();
    runner.start();
    gate.runner = Some(runner);
}

//! Scroll-bound scene adapter
//!
//! Maps the scroll position of one "scene" element onto a normalized
//! timeline so scroll-driven (not time-driven) animations can be scrubbed
//! deterministically. Holds a single `High`-fidelity subscription on the
//! scene and emits:
//!
//! - **duration-changed**: `viewport_height − element_height` (never below
//!   zero), only when the value differs from the cached one — the scrollable
//!   span while the scene is fully visible;
//! - **scroll ticks**: while fully visible, `viewport_height − bottom`;
//!   leaving the fully-visible band emits one settling boundary tick
//!   (`scroll_duration` past the bottom edge, `0` past the top) so the
//!   dependent timeline lands on a boundary value instead of freezing
//!   mid-scroll, then stays silent until re-entry.

use std::sync::{Arc, Mutex};

use sightline_core::host::ElementId;
use sightline_core::observable::{HandlerId, Observable};

use crate::position::{Fidelity, PositionEntry, PositionObserver, SubscriptionId};

struct SceneInner {
    scroll_duration: Option<f32>,
    was_fully_visible: bool,
}

pub struct ScrollboundScene {
    inner: Arc<Mutex<SceneInner>>,
    ticks: Arc<Observable<f32>>,
    durations: Arc<Observable<f32>>,
    positions: Arc<Observable<PositionEntry>>,
    observer: PositionObserver,
    subscription: SubscriptionId,
}

impl ScrollboundScene {
    /// Start tracking `scene`. The subscription is released on drop.
    pub fn new(observer: &PositionObserver, scene: ElementId) -> Self {
        let inner = Arc::new(Mutex::new(SceneInner {
            scroll_duration: None,
            was_fully_visible: false,
        }));
        let ticks = Arc::new(Observable::new());
        let durations = Arc::new(Observable::new());
        let positions = Arc::new(Observable::new());

        let inner_for_handler = Arc::clone(&inner);
        let ticks_for_handler = Arc::clone(&ticks);
        let durations_for_handler = Arc::clone(&durations);
        let positions_for_handler = Arc::clone(&positions);
        let subscription = observer.observe(scene, Fidelity::High, move |entry| {
            positions_for_handler.fire(entry);
            on_position(
                &inner_for_handler,
                &ticks_for_handler,
                &durations_for_handler,
                entry,
            );
        });

        Self {
            inner,
            ticks,
            durations,
            positions,
            observer: observer.clone(),
            subscription,
        }
    }

    /// Subscribe to normalized scroll ticks.
    pub fn on_scroll_tick(&self, handler: impl Fn(&f32) + Send + Sync + 'static) -> HandlerId {
        self.ticks.add(handler)
    }

    pub fn remove_scroll_tick(&self, id: HandlerId) {
        self.ticks.remove(id);
    }

    /// Subscribe to scroll-duration changes.
    pub fn on_duration_changed(
        &self,
        handler: impl Fn(&f32) + Send + Sync + 'static,
    ) -> HandlerId {
        self.durations.add(handler)
    }

    pub fn remove_duration_changed(&self, id: HandlerId) {
        self.durations.remove(id);
    }

    /// Subscribe to the raw position entries of the scene.
    pub fn on_position_changed(
        &self,
        handler: impl Fn(&PositionEntry) + Send + Sync + 'static,
    ) -> HandlerId {
        self.positions.add(handler)
    }

    pub fn remove_position_changed(&self, id: HandlerId) {
        self.positions.remove(id);
    }

    /// The cached scrollable span, once a resolvable entry arrived.
    pub fn scroll_duration(&self) -> Option<f32> {
        self.inner.lock().unwrap().scroll_duration
    }
}

impl Drop for ScrollboundScene {
    fn drop(&mut self) {
        self.observer.unobserve(self.subscription);
    }
}

fn on_position(
    inner: &Arc<Mutex<SceneInner>>,
    ticks: &Arc<Observable<f32>>,
    durations: &Arc<Observable<f32>>,
    entry: &PositionEntry,
) {
    // An unresolvable scene keeps the last state; the next resolvable entry
    // self-corrects.
    let Some(position) = &entry.position_rect else {
        return;
    };
    let viewport_height = entry.viewport_rect.height;

    let duration = (viewport_height - position.height).max(0.0);
    let duration_changed = {
        let mut scene = inner.lock().unwrap();
        if scene.scroll_duration != Some(duration) {
            scene.scroll_duration = Some(duration);
            true
        } else {
            false
        }
    };
    if duration_changed {
        durations.fire(&duration);
    }

    let fully_visible = position.bottom() <= viewport_height && position.top >= 0.0;
    if fully_visible {
        inner.lock().unwrap().was_fully_visible = true;
        ticks.fire(&(viewport_height - position.bottom()));
    } else {
        let leaving = {
            let mut scene = inner.lock().unwrap();
            if scene.was_fully_visible {
                scene.was_fully_visible = false;
                true
            } else {
                false
            }
        };
        if leaving {
            let boundary = if position.bottom() > viewport_height {
                duration
            } else {
                0.0
            };
            ticks.fire(&boundary);
        }
    }
}

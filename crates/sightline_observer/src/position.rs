//! Position observer core
//!
//! Maintains the registry of observed elements and runs a single measurement
//! pass per frame in the scheduler's measure phase. Each pass reads every
//! registered element's layout rect, converts it to viewport coordinates,
//! and invokes the subscriber's handler only when the delivered rectangles
//! actually changed — the core optimization that keeps downstream consumers
//! (animation restarts, action dispatch) from doing redundant work.
//!
//! The observer is installed per document through
//! [`PositionObserver::install`] and never lives in module-level state.
//! The measurement loop starts with the first subscriber, upgrades its
//! sampling cadence to the highest fidelity any live subscriber requests,
//! and tears itself down when the last subscriber is removed.

use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};

use sightline_core::geometry::{relative_position, Rect, RelativePosition};
use sightline_core::host::{ElementId, ViewportService};
use sightline_core::services::DocumentContext;
use sightline_core::vsync::FrameScheduler;

new_key_type! {
    /// Handle to one observation, returned from [`PositionObserver::observe`].
    pub struct SubscriptionId;
}

/// Requested sampling cadence for one subscription.
///
/// The observer samples at the maximum fidelity across live subscriptions:
/// `High` measures every frame, `Low` is a best-effort idle cadence
/// (every [`LOW_FIDELITY_INTERVAL`]th frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Fidelity {
    Low,
    High,
}

/// Frames between passes when only `Low` subscribers remain.
pub const LOW_FIDELITY_INTERVAL: u64 = 5;

/// One delivered position sample.
///
/// `viewport_rect` has its origin at `(0, 0)`; `position_rect` is the
/// element box in the same viewport coordinates, `None` when the element is
/// not resolvable. `relative_position` classifies the box against the raw
/// (margin-free) viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionEntry {
    pub viewport_rect: Rect,
    pub position_rect: Option<Rect>,
    pub relative_position: RelativePosition,
}

type PositionHandler = Arc<dyn Fn(&PositionEntry) + Send + Sync>;

struct ObservedEntry {
    element: ElementId,
    fidelity: Fidelity,
    handler: PositionHandler,
    last_position: Option<Rect>,
    last_viewport: Option<Rect>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObserverState {
    Idle,
    Running,
}

struct ObserverInner {
    entries: SlotMap<SubscriptionId, ObservedEntry>,
    // Dispatch order is registration order, which slotmap iteration does not
    // guarantee after removals.
    order: SmallVec<[SubscriptionId; 8]>,
    effective_fidelity: Fidelity,
    state: ObserverState,
    frames_until_pass: u64,
}

/// Cheap-to-clone handle to the per-document position observer.
#[derive(Clone)]
pub struct PositionObserver {
    inner: Arc<Mutex<ObserverInner>>,
    vsync: FrameScheduler,
    viewport: Arc<dyn ViewportService>,
}

impl PositionObserver {
    pub fn new(vsync: FrameScheduler, viewport: Arc<dyn ViewportService>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ObserverInner {
                entries: SlotMap::with_key(),
                order: SmallVec::new(),
                effective_fidelity: Fidelity::Low,
                state: ObserverState::Idle,
                frames_until_pass: 1,
            })),
            vsync,
            viewport,
        }
    }

    /// The per-document observer instance, installed on first use.
    pub fn install(ctx: &DocumentContext) -> Arc<Self> {
        ctx.service(|ctx| {
            Arc::new(PositionObserver::new(
                ctx.vsync().clone(),
                Arc::clone(ctx.viewport()),
            ))
        })
    }

    /// Register `handler` for position changes of `element`.
    ///
    /// The handler is invoked from the measurement pass whenever the
    /// delivered rectangles differ from the previously delivered ones; a
    /// steady element produces zero calls. Safe to call from inside another
    /// subscription's handler; the new entry is measured starting with the
    /// next pass.
    pub fn observe(
        &self,
        element: ElementId,
        fidelity: Fidelity,
        handler: impl Fn(&PositionEntry) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.entries.insert(ObservedEntry {
            element,
            fidelity,
            handler: Arc::new(handler),
            last_position: None,
            last_viewport: None,
        });
        inner.order.push(id);

        if fidelity > inner.effective_fidelity {
            inner.effective_fidelity = fidelity;
            // Upgrades take effect on the very next frame.
            inner.frames_until_pass = 1;
            tracing::debug!("position observer fidelity upgraded to High");
        }

        let start = inner.state == ObserverState::Idle;
        if start {
            inner.state = ObserverState::Running;
            inner.frames_until_pass = 1;
        }
        drop(inner);

        if start {
            tracing::debug!("position observer running");
            schedule_pass(&self.vsync, &self.viewport, &Arc::downgrade(&self.inner));
        }
        id
    }

    /// Remove a subscription. When the last one goes, the measurement loop
    /// stops rescheduling and the observer returns to idle; when the last
    /// `High` subscriber goes, the cadence downgrades to `Low`.
    pub fn unobserve(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.entries.remove(id).is_none() {
            return false;
        }
        inner.order.retain(|entry| *entry != id);

        let remaining_max = inner
            .entries
            .values()
            .map(|entry| entry.fidelity)
            .max()
            .unwrap_or(Fidelity::Low);
        if remaining_max < inner.effective_fidelity {
            inner.effective_fidelity = remaining_max;
            tracing::debug!("position observer fidelity downgraded to Low");
        }
        true
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().unwrap().state == ObserverState::Running
    }

    pub fn effective_fidelity(&self) -> Fidelity {
        self.inner.lock().unwrap().effective_fidelity
    }
}

fn interval_for(fidelity: Fidelity) -> u64 {
    match fidelity {
        Fidelity::High => 1,
        Fidelity::Low => LOW_FIDELITY_INTERVAL,
    }
}

fn schedule_pass(
    vsync: &FrameScheduler,
    viewport: &Arc<dyn ViewportService>,
    inner: &Weak<Mutex<ObserverInner>>,
) {
    let vsync_next = vsync.clone();
    let viewport_next = Arc::clone(viewport);
    let inner_next = Weak::clone(inner);
    vsync.measure(move || {
        run_pass(vsync_next, viewport_next, inner_next);
    });
}

fn run_pass(
    vsync: FrameScheduler,
    viewport: Arc<dyn ViewportService>,
    weak: Weak<Mutex<ObserverInner>>,
) {
    let Some(inner) = weak.upgrade() else {
        return;
    };

    {
        let mut guard = inner.lock().unwrap();
        if guard.entries.is_empty() {
            // Last subscriber left since the previous pass: tear down.
            guard.state = ObserverState::Idle;
            tracing::debug!("position observer idle");
            return;
        }
        if guard.frames_until_pass > 1 {
            guard.frames_until_pass -= 1;
            drop(guard);
            schedule_pass(&vsync, &viewport, &weak);
            return;
        }
        guard.frames_until_pass = interval_for(guard.effective_fidelity);
    }

    let document_viewport = viewport.rect();
    let viewport_rect = Rect::new(0.0, 0.0, document_viewport.width, document_viewport.height);

    // Snapshot the dispatch order so handlers can observe/unobserve freely;
    // liveness is re-checked per entry before dispatch.
    let ids: Vec<SubscriptionId> = {
        let guard = inner.lock().unwrap();
        guard.order.iter().copied().collect()
    };

    for id in ids {
        let dispatch = {
            let mut guard = inner.lock().unwrap();
            let Some(entry) = guard.entries.get_mut(id) else {
                continue;
            };
            let position_rect = viewport
                .layout_rect(entry.element)
                .map(|rect| rect.translate(-document_viewport.left, -document_viewport.top));

            let changed = entry.last_position != position_rect
                || entry.last_viewport != Some(viewport_rect);
            if !changed {
                None
            } else {
                entry.last_position = position_rect;
                entry.last_viewport = Some(viewport_rect);
                let relative = match &position_rect {
                    Some(rect) => relative_position(rect, &viewport_rect),
                    None => RelativePosition::Outside,
                };
                Some((
                    Arc::clone(&entry.handler),
                    PositionEntry {
                        viewport_rect,
                        position_rect,
                        relative_position: relative,
                    },
                ))
            }
        };

        if let Some((handler, entry)) = dispatch {
            // Handlers run outside the registry lock; a panic is isolated to
            // this handler and the subscriber stays registered.
            if catch_unwind(AssertUnwindSafe(|| handler(&entry))).is_err() {
                tracing::error!("position handler panicked; subscriber retained");
            }
        }
    }

    schedule_pass(&vsync, &viewport, &weak);
}

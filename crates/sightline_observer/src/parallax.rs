//! Scroll-driven parallax effect
//!
//! Translates marked elements by a per-element factor of the scroll offset.
//! Each scroll event schedules one measure/mutate job: the scroll offset is
//! read in the measure phase and the translations are applied in the mutate
//! phase through a host-provided sink, so the effect never forces a
//! synchronous reflow.
//!
//! Elements opt in with a `parallax` attribute whose value is the factor
//! (`0.5` when empty or unparsable). Factors live in a side table owned by
//! the controller, never on the elements themselves.

use std::sync::Arc;

use sightline_core::host::{ElementId, ViewportService};
use sightline_core::observable::HandlerId;
use sightline_core::services::DocumentContext;
use sightline_core::vsync::{FrameScheduler, FrameTask};

pub const PARALLAX_ATTRIBUTE: &str = "parallax";
pub const DEFAULT_FACTOR: f32 = 0.5;

/// Applies a vertical translation to an element. Called in the mutate phase.
pub type TranslationSink = Arc<dyn Fn(ElementId, f32) + Send + Sync>;

struct ParallaxInner {
    factors: Vec<(ElementId, f32)>,
    sink: TranslationSink,
    vsync: FrameScheduler,
    viewport: Arc<dyn ViewportService>,
}

pub struct ParallaxController {
    inner: Arc<ParallaxInner>,
    scroll_handler: HandlerId,
}

impl ParallaxController {
    /// Scan the document for parallax-marked elements and start following
    /// the scroll stream.
    pub fn install(ctx: &DocumentContext, sink: TranslationSink) -> Self {
        let factors: Vec<(ElementId, f32)> = ctx
            .document()
            .elements_with_attribute(PARALLAX_ATTRIBUTE)
            .into_iter()
            .map(|hit| {
                let factor = hit.value.parse().unwrap_or(DEFAULT_FACTOR);
                (hit.element, factor)
            })
            .collect();
        tracing::debug!(elements = factors.len(), "parallax installed");

        let inner = Arc::new(ParallaxInner {
            factors,
            sink,
            vsync: ctx.vsync().clone(),
            viewport: Arc::clone(ctx.viewport()),
        });

        let inner_for_scroll = Arc::clone(&inner);
        let scroll_handler = ctx
            .viewport()
            .on_scroll(Box::new(move || schedule(&inner_for_scroll)));

        Self {
            inner,
            scroll_handler,
        }
    }

    /// Schedule one update outside the scroll stream (e.g. after install).
    pub fn refresh(&self) {
        schedule(&self.inner);
    }

    pub fn element_count(&self) -> usize {
        self.inner.factors.len()
    }
}

impl Drop for ParallaxController {
    fn drop(&mut self) {
        self.inner.viewport.unsubscribe_scroll(self.scroll_handler);
    }
}

#[derive(Default)]
struct ScrollSample {
    scroll_top: f32,
}

fn schedule(inner: &Arc<ParallaxInner>) {
    let measure_inner = Arc::clone(inner);
    let mutate_inner = Arc::clone(inner);
    inner.vsync.run(
        ScrollSample::default(),
        FrameTask::new()
            .measure(move |sample: &mut ScrollSample| {
                sample.scroll_top = measure_inner.viewport.scroll_top();
            })
            .mutate(move |sample: &mut ScrollSample| {
                for &(element, factor) in &mutate_inner.factors {
                    let offset = sample.scroll_top * factor;
                    if offset < 0.0 {
                        continue;
                    }
                    (mutate_inner.sink)(element, offset);
                }
            }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use sightline_core::geometry::Rect;
    use sightline_core::testing::{RecordingActions, TestHost};
    use std::sync::Mutex;

    fn recording_sink() -> (TranslationSink, Arc<Mutex<Vec<(ElementId, f32)>>>) {
        let applied = Arc::new(Mutex::new(Vec::new()));
        let applied_clone = Arc::clone(&applied);
        let sink: TranslationSink = Arc::new(move |element, offset| {
            applied_clone.lock().unwrap().push((element, offset));
        });
        (sink, applied)
    }

    #[test]
    fn test_scroll_applies_factored_offsets() {
        let host = TestHost::new(Rect::new(0.0, 0.0, 800.0, 500.0));
        let slow = host.insert_element(Some(Rect::new(0.0, 0.0, 800.0, 100.0)));
        host.set_attribute(slow, PARALLAX_ATTRIBUTE, "0.25");
        let default = host.insert_element(Some(Rect::new(0.0, 200.0, 800.0, 100.0)));
        host.set_attribute(default, PARALLAX_ATTRIBUTE, "");

        let ctx = TestHost::context(&host, RecordingActions::new());
        let (sink, applied) = recording_sink();
        let controller = ParallaxController::install(&ctx, sink);
        assert_eq!(controller.element_count(), 2);

        host.set_scroll_top(100.0);
        // Nothing applies until the scheduled measure/mutate job runs.
        assert!(applied.lock().unwrap().is_empty());
        ctx.vsync().tick();

        assert_eq!(
            applied.lock().unwrap().as_slice(),
            [(slow, 25.0), (default, 50.0)]
        );
    }

    #[test]
    fn test_dropped_controller_stops_following_scroll() {
        let host = TestHost::new(Rect::new(0.0, 0.0, 800.0, 500.0));
        let element = host.insert_element(Some(Rect::new(0.0, 0.0, 800.0, 100.0)));
        host.set_attribute(element, PARALLAX_ATTRIBUTE, "1.0");

        let ctx = TestHost::context(&host, RecordingActions::new());
        let (sink, applied) = recording_sink();
        let controller = ParallaxController::install(&ctx, sink);

        host.set_scroll_top(10.0);
        ctx.vsync().tick();
        assert_eq!(applied.lock().unwrap().len(), 1);

        drop(controller);
        host.set_scroll_top(20.0);
        ctx.vsync().tick();
        assert_eq!(applied.lock().unwrap().len(), 1);
    }
}

//! Visibility watcher component
//!
//! The attribute-configured component that reports scene visibility as
//! user-visible actions. At build time it parses its thresholds, resolves
//! its scene (the host element's parent), and waits for the host to become
//! visible; once activated it holds a `High`-fidelity subscription on the
//! scene and forwards policy-engine events as `enter`/`exit`/`progress`
//! actions at low trust.
//!
//! Attributes:
//!
//! - `intersection-ratios="<bottom> [top]"` — enter thresholds
//! - `exit-ratios="<bottom> [top]"` — exit thresholds, defaulting to the
//!   enter thresholds
//! - `viewport-margins="<bottom> [top]"` — px/vh margins shrinking the
//!   viewport band
//! - `trigger` — optional; the only accepted value is `"visibility"`

use std::sync::{Arc, Mutex};

use sightline_core::component::Component;
use sightline_core::config::{parse_margin_pair, parse_ratio_pair, parse_trigger, RatioPair};
use sightline_core::error::ConfigError;
use sightline_core::geometry::Margins;
use sightline_core::host::{ActionEvent, ActionTrust, ElementId, ViewerService};
use sightline_core::observable::HandlerId;
use sightline_core::services::DocumentContext;

use crate::position::{Fidelity, PositionObserver, SubscriptionId};
use crate::visibility::{VisibilityConfig, VisibilityEngine, VisibilityEvent};

pub const INTERSECTION_RATIOS_ATTRIBUTE: &str = "intersection-ratios";
pub const EXIT_RATIOS_ATTRIBUTE: &str = "exit-ratios";
pub const VIEWPORT_MARGINS_ATTRIBUTE: &str = "viewport-margins";
pub const TRIGGER_ATTRIBUTE: &str = "trigger";

const ENTER_EVENT: &str = "visibility-watcher.enter";
const EXIT_EVENT: &str = "visibility-watcher.exit";
const PROGRESS_EVENT: &str = "visibility-watcher.progress";

struct WatcherState {
    engine: VisibilityEngine,
    observer: PositionObserver,
    scene: ElementId,
    scene_is_root: bool,
    subscription: Option<SubscriptionId>,
    activated: bool,
}

pub struct VisibilityWatcher {
    element: ElementId,
    state: Option<Arc<Mutex<WatcherState>>>,
    viewer: Option<Arc<dyn ViewerService>>,
    visibility_handler: Option<HandlerId>,
}

impl VisibilityWatcher {
    pub fn new(element: ElementId) -> Self {
        Self {
            element,
            state: None,
            viewer: None,
            visibility_handler: None,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.state
            .as_ref()
            .map(|state| state.lock().unwrap().engine.is_visible())
            .unwrap_or(false)
    }

    fn parse_config(&self, ctx: &DocumentContext) -> Result<VisibilityConfig, ConfigError> {
        let document = ctx.document();
        let start = match document.attribute(self.element, INTERSECTION_RATIOS_ATTRIBUTE) {
            Some(value) => parse_ratio_pair(INTERSECTION_RATIOS_ATTRIBUTE, &value)?,
            None => RatioPair::ZERO,
        };
        let end = match document.attribute(self.element, EXIT_RATIOS_ATTRIBUTE) {
            Some(value) => parse_ratio_pair(EXIT_RATIOS_ATTRIBUTE, &value)?,
            None => start,
        };
        let margins = match document.attribute(self.element, VIEWPORT_MARGINS_ATTRIBUTE) {
            Some(value) => parse_margin_pair(VIEWPORT_MARGINS_ATTRIBUTE, &value)?,
            None => Margins::default(),
        };
        let trigger = document.attribute(self.element, TRIGGER_ATTRIBUTE);
        parse_trigger(trigger.as_deref())?;

        Ok(VisibilityConfig {
            start,
            end,
            margins,
        })
    }
}

impl Component for VisibilityWatcher {
    fn build(&mut self, ctx: &DocumentContext) -> Result<(), ConfigError> {
        let config = self.parse_config(ctx)?;

        let scene = ctx
            .document()
            .parent(self.element)
            .ok_or(ConfigError::SceneNotFound)?;
        let scene_is_root = scene == ctx.document().root_element();

        let actions = Arc::clone(ctx.actions());
        let element = self.element;
        let engine = VisibilityEngine::new(config, scene_is_root, move |event| match event {
            VisibilityEvent::Enter => {
                actions.trigger(
                    element,
                    "enter",
                    ActionEvent::named(ENTER_EVENT),
                    ActionTrust::Low,
                );
            }
            VisibilityEvent::Exit { final_progress } => {
                actions.trigger(
                    element,
                    "progress",
                    ActionEvent::with_percent(PROGRESS_EVENT, final_progress),
                    ActionTrust::Low,
                );
                actions.trigger(
                    element,
                    "exit",
                    ActionEvent::named(EXIT_EVENT),
                    ActionTrust::Low,
                );
            }
            VisibilityEvent::Progress { progress } => {
                actions.trigger(
                    element,
                    "progress",
                    ActionEvent::with_percent(PROGRESS_EVENT, progress),
                    ActionTrust::Low,
                );
            }
        });

        let observer = PositionObserver::install(ctx);
        let state = Arc::new(Mutex::new(WatcherState {
            engine,
            observer: (*observer).clone(),
            scene,
            scene_is_root,
            subscription: None,
            activated: false,
        }));

        let viewer = Arc::clone(ctx.viewer());
        let state_for_changes = Arc::clone(&state);
        let handler = viewer.on_visibility_changed(Box::new(move |visible| {
            on_host_visibility(&state_for_changes, visible);
        }));
        // Seed with the current host visibility; activates immediately when
        // the host is already visible.
        on_host_visibility(&state, viewer.is_visible());

        self.state = Some(state);
        self.viewer = Some(viewer);
        self.visibility_handler = Some(handler);
        Ok(())
    }
}

/// Activation happens on the first host-visible edge; afterwards every host
/// visibility change feeds the engine.
fn on_host_visibility(state: &Arc<Mutex<WatcherState>>, visible: bool) {
    let mut watcher = state.lock().unwrap();
    if visible && !watcher.activated {
        watcher.activated = true;
        watcher.engine.set_triggered(true);
        if !watcher.scene_is_root && watcher.subscription.is_none() {
            let observer = watcher.observer.clone();
            let scene = watcher.scene;
            let state_for_entries = Arc::clone(state);
            let subscription = observer.observe(scene, Fidelity::High, move |entry| {
                state_for_entries
                    .lock()
                    .unwrap()
                    .engine
                    .position_changed(entry);
            });
            watcher.subscription = Some(subscription);
        }
    }
    watcher.engine.host_visibility_changed(visible);
}

impl Drop for VisibilityWatcher {
    fn drop(&mut self) {
        if let (Some(viewer), Some(handler)) = (&self.viewer, self.visibility_handler.take()) {
            viewer.unsubscribe_visibility(handler);
        }
        if let Some(state) = &self.state {
            let subscription = {
                let mut watcher = state.lock().unwrap();
                watcher
                    .subscription
                    .take()
                    .map(|id| (watcher.observer.clone(), id))
            };
            if let Some((observer, id)) = subscription {
                observer.unobserve(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sightline_core::component::ComponentRegistry;
    use sightline_core::geometry::Rect;
    use sightline_core::testing::{RecordingActions, TestHost};

    struct Fixture {
        host: Arc<TestHost>,
        actions: Arc<RecordingActions>,
        ctx: DocumentContext,
        watcher_element: ElementId,
        scene: ElementId,
    }

    /// Viewport 500 tall; scene 300 tall at document offset 1000, with the
    /// watcher element as its child.
    fn fixture() -> Fixture {
        let host = TestHost::new(Rect::new(0.0, 0.0, 800.0, 500.0));
        let scene = host.insert_element(Some(Rect::new(0.0, 1000.0, 800.0, 300.0)));
        let watcher_element = host.insert_child(scene, None);
        let actions = RecordingActions::new();
        let ctx = TestHost::context(&host, Arc::clone(&actions) as Arc<dyn sightline_core::host::ActionService>);
        Fixture {
            host,
            actions,
            ctx,
            watcher_element,
            scene,
        }
    }

    #[test]
    fn test_malformed_ratio_attribute_fails_build() {
        let f = fixture();
        f.host
            .set_attribute(f.watcher_element, INTERSECTION_RATIOS_ATTRIBUTE, "lots");

        let mut registry = ComponentRegistry::new();
        let err = registry
            .register(
                f.watcher_element,
                Box::new(VisibilityWatcher::new(f.watcher_element)),
                &f.ctx,
            )
            .unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { .. }));
    }

    #[test]
    fn test_unsupported_trigger_fails_build() {
        let f = fixture();
        f.host
            .set_attribute(f.watcher_element, TRIGGER_ATTRIBUTE, "timer");

        let mut watcher = VisibilityWatcher::new(f.watcher_element);
        let err = watcher.build(&f.ctx).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedTrigger { .. }));
    }

    #[test]
    fn test_element_without_parent_has_no_scene() {
        let f = fixture();
        let mut watcher = VisibilityWatcher::new(f.host.root());
        let err = watcher.build(&f.ctx).unwrap_err();
        assert_eq!(err, ConfigError::SceneNotFound);
    }

    #[test]
    fn test_enter_progress_exit_action_flow() {
        let f = fixture();
        f.host
            .set_attribute(f.watcher_element, INTERSECTION_RATIOS_ATTRIBUTE, "0.5");

        let mut watcher = VisibilityWatcher::new(f.watcher_element);
        watcher.build(&f.ctx).unwrap();

        // Scene fully below the viewport: nothing fires.
        f.ctx.vsync().tick();
        assert!(f.actions.is_empty());

        // Scroll until the scene top sits at 100: enter, then progress
        // 1 - 100/500 = 0.8.
        f.host.set_scroll_top(900.0);
        f.ctx.vsync().tick();
        let recorded = f.actions.take();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].action, "enter");
        assert_eq!(recorded[0].trust, ActionTrust::Low);
        assert_eq!(recorded[1].action, "progress");
        assert_eq!(recorded[1].event.percent, Some(0.8));

        // Steady frames fire nothing further.
        f.ctx.vsync().tick();
        f.ctx.vsync().tick();
        assert!(f.actions.is_empty());

        // Host hidden: final progress snapshot, then exit.
        f.host.set_visible(false);
        let recorded = f.actions.take();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].action, "progress");
        assert_eq!(recorded[0].event.percent, Some(1.0));
        assert_eq!(recorded[1].action, "exit");
    }

    #[test]
    fn test_activation_waits_for_first_host_visibility() {
        let f = fixture();
        f.host.set_visible(false);
        let mut watcher = VisibilityWatcher::new(f.watcher_element);
        watcher.build(&f.ctx).unwrap();

        // Hidden host: no subscription yet, nothing observed.
        f.host.set_scroll_top(900.0);
        f.ctx.vsync().tick();
        assert!(f.actions.is_empty());

        // First visible edge activates and subscribes the scene.
        f.host.set_visible(true);
        f.ctx.vsync().tick();
        let names = f.actions.names();
        assert_eq!(names, ["enter", "progress"]);
        assert!(watcher.is_visible());
    }

    #[test]
    fn test_drop_releases_the_scene_subscription() {
        let f = fixture();
        let observer = PositionObserver::install(&f.ctx);

        let mut watcher = VisibilityWatcher::new(f.watcher_element);
        watcher.build(&f.ctx).unwrap();
        assert_eq!(observer.subscriber_count(), 1);

        drop(watcher);
        assert_eq!(observer.subscriber_count(), 0);
        let _ = f.scene;
    }
}

//! Component capability interface
//!
//! Components implement the [`Component`] trait — `build`, `layout`,
//! `pause`, `attribute_changed` — and a host-owned [`ComponentRegistry`]
//! dispatches lifecycle calls to them by element. Variant behaviors are
//! independent types behind the trait; there is no shared base class.
//!
//! A `build` failure is a configuration error: it is logged, the component
//! is not registered, and no other component is affected.

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};

use crate::error::ConfigError;
use crate::host::ElementId;
use crate::services::DocumentContext;

new_key_type! {
    pub struct ComponentId;
}

/// Lifecycle capability implemented by each component variant.
pub trait Component: Send {
    /// Parse configuration and wire subscriptions. Runs once, before any
    /// other lifecycle call.
    fn build(&mut self, ctx: &DocumentContext) -> Result<(), ConfigError>;

    /// The element has been laid out.
    fn layout(&mut self, ctx: &DocumentContext) {
        let _ = ctx;
    }

    /// The document is being backgrounded; stop ongoing activity.
    fn pause(&mut self) {}

    /// A host attribute changed; `value` is `None` on removal.
    fn attribute_changed(&mut self, ctx: &DocumentContext, name: &str, value: Option<&str>) {
        let _ = (ctx, name, value);
    }
}

/// Host-owned registry dispatching lifecycle calls by element.
pub struct ComponentRegistry {
    components: SlotMap<ComponentId, Box<dyn Component>>,
    by_element: FxHashMap<ElementId, ComponentId>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self {
            components: SlotMap::with_key(),
            by_element: FxHashMap::default(),
        }
    }

    /// Build and register `component` for `element`.
    ///
    /// On a build failure the component is dropped and the error returned;
    /// other registered components are unaffected.
    pub fn register(
        &mut self,
        element: ElementId,
        mut component: Box<dyn Component>,
        ctx: &DocumentContext,
    ) -> Result<ComponentId, ConfigError> {
        if self.by_element.contains_key(&element) {
            return Err(ConfigError::DuplicateComponent);
        }
        if let Err(err) = component.build(ctx) {
            tracing::error!(%err, "component build failed; instance discarded");
            return Err(err);
        }
        let id = self.components.insert(component);
        self.by_element.insert(element, id);
        Ok(id)
    }

    pub fn layout(&mut self, element: ElementId, ctx: &DocumentContext) {
        if let Some(component) = self.component_mut(element) {
            component.layout(ctx);
        }
    }

    pub fn pause(&mut self, element: ElementId) {
        if let Some(component) = self.component_mut(element) {
            component.pause();
        }
    }

    /// Pause every registered component (document backgrounded).
    pub fn pause_all(&mut self) {
        for (_, component) in self.components.iter_mut() {
            component.pause();
        }
    }

    pub fn attribute_changed(
        &mut self,
        element: ElementId,
        ctx: &DocumentContext,
        name: &str,
        value: Option<&str>,
    ) {
        if let Some(component) = self.component_mut(element) {
            component.attribute_changed(ctx, name, value);
        }
    }

    /// Drop the component registered for `element`, if any.
    pub fn unregister(&mut self, element: ElementId) -> bool {
        match self.by_element.remove(&element) {
            Some(id) => self.components.remove(id).is_some(),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    fn component_mut(&mut self, element: ElementId) -> Option<&mut Box<dyn Component>> {
        let id = *self.by_element.get(&element)?;
        self.components.get_mut(id)
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingActions, TestHost};
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    struct ProbeComponent {
        fail_build: bool,
        pauses: Arc<AtomicI32>,
    }

    impl Component for ProbeComponent {
        fn build(&mut self, _ctx: &DocumentContext) -> Result<(), ConfigError> {
            if self.fail_build {
                Err(ConfigError::EmptyAttribute { attribute: "probe" })
            } else {
                Ok(())
            }
        }

        fn pause(&mut self) {
            self.pauses.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_register_and_pause() {
        let host = TestHost::new(crate::geometry::Rect::new(0.0, 0.0, 800.0, 500.0));
        let ctx = TestHost::context(&host, RecordingActions::new());
        let element = host.insert_element(None);

        let pauses = Arc::new(AtomicI32::new(0));
        let mut registry = ComponentRegistry::new();
        registry
            .register(
                element,
                Box::new(ProbeComponent {
                    fail_build: false,
                    pauses: Arc::clone(&pauses),
                }),
                &ctx,
            )
            .unwrap();

        registry.pause(element);
        registry.pause_all();
        assert_eq!(pauses.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failed_build_is_fatal_to_that_instance_only() {
        let host = TestHost::new(crate::geometry::Rect::new(0.0, 0.0, 800.0, 500.0));
        let ctx = TestHost::context(&host, RecordingActions::new());
        let bad = host.insert_element(None);
        let good = host.insert_element(None);

        let pauses = Arc::new(AtomicI32::new(0));
        let mut registry = ComponentRegistry::new();

        let err = registry
            .register(
                bad,
                Box::new(ProbeComponent {
                    fail_build: true,
                    pauses: Arc::clone(&pauses),
                }),
                &ctx,
            )
            .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyAttribute { .. }));
        assert!(registry.is_empty());

        registry
            .register(
                good,
                Box::new(ProbeComponent {
                    fail_build: false,
                    pauses: Arc::clone(&pauses),
                }),
                &ctx,
            )
            .unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let host = TestHost::new(crate::geometry::Rect::new(0.0, 0.0, 800.0, 500.0));
        let ctx = TestHost::context(&host, RecordingActions::new());
        let element = host.insert_element(None);

        let pauses = Arc::new(AtomicI32::new(0));
        let mut registry = ComponentRegistry::new();
        registry
            .register(
                element,
                Box::new(ProbeComponent {
                    fail_build: false,
                    pauses: Arc::clone(&pauses),
                }),
                &ctx,
            )
            .unwrap();

        let err = registry
            .register(
                element,
                Box::new(ProbeComponent {
                    fail_build: false,
                    pauses: Arc::clone(&pauses),
                }),
                &ctx,
            )
            .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateComponent);

        assert!(registry.unregister(element));
        assert!(!registry.unregister(element));
    }
}

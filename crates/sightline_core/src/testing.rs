//! Fake host services for tests
//!
//! `TestHost` owns a small element tree and plays the viewport, viewer, and
//! document root for a test; `RecordingActions` captures dispatched actions.
//! Downstream crates enable these through the `testing` cargo feature in
//! their dev-dependencies.

use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use std::sync::{Arc, Mutex};

use crate::geometry::Rect;
use crate::host::{
    ActionEvent, ActionService, ActionTrust, AttributeHit, DocumentRoot, ElementId,
    ViewerService, ViewportService,
};
use crate::observable::{HandlerId, Observable};
use crate::services::DocumentContext;
use crate::vsync::FrameScheduler;

#[derive(Default)]
struct TestElement {
    rect: Option<Rect>,
    parent: Option<ElementId>,
    attributes: FxHashMap<String, String>,
}

struct TestHostState {
    elements: SlotMap<ElementId, TestElement>,
    order: Vec<ElementId>,
    root: ElementId,
    viewport: Rect,
    visible: bool,
    ready: bool,
    ready_waiters: Vec<Box<dyn FnOnce() + Send>>,
}

/// A fake document/viewport/viewer rolled into one.
///
/// The viewport rect is kept in document coordinates, so scrolling moves
/// `viewport.top` while element layout rects stay put.
pub struct TestHost {
    state: Mutex<TestHostState>,
    scroll: Observable<()>,
    visibility: Observable<bool>,
}

impl TestHost {
    pub fn new(viewport: Rect) -> Arc<Self> {
        let mut elements = SlotMap::with_key();
        let root = elements.insert(TestElement::default());
        Arc::new(Self {
            state: Mutex::new(TestHostState {
                elements,
                order: Vec::new(),
                root,
                viewport,
                visible: true,
                ready: false,
                ready_waiters: Vec::new(),
            }),
            scroll: Observable::new(),
            visibility: Observable::new(),
        })
    }

    /// Build a [`DocumentContext`] around `host` with a fresh scheduler.
    pub fn context(host: &Arc<Self>, actions: Arc<dyn ActionService>) -> DocumentContext {
        DocumentContext::new(
            FrameScheduler::new(),
            Arc::clone(host) as Arc<dyn ViewportService>,
            Arc::clone(host) as Arc<dyn ViewerService>,
            actions,
            Arc::clone(host) as Arc<dyn DocumentRoot>,
        )
    }

    pub fn root(&self) -> ElementId {
        self.state.lock().unwrap().root
    }

    /// Add an element under the root, appended in document order.
    pub fn insert_element(&self, rect: Option<Rect>) -> ElementId {
        let mut state = self.state.lock().unwrap();
        let root = state.root;
        let id = state.elements.insert(TestElement {
            rect,
            parent: Some(root),
            ..TestElement::default()
        });
        state.order.push(id);
        id
    }

    pub fn insert_child(&self, parent: ElementId, rect: Option<Rect>) -> ElementId {
        let mut state = self.state.lock().unwrap();
        let id = state.elements.insert(TestElement {
            rect,
            parent: Some(parent),
            ..TestElement::default()
        });
        state.order.push(id);
        id
    }

    pub fn set_attribute(&self, element: ElementId, name: &str, value: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(el) = state.elements.get_mut(element) {
            el.attributes.insert(name.to_string(), value.to_string());
        }
    }

    pub fn set_rect(&self, element: ElementId, rect: Option<Rect>) {
        let mut state = self.state.lock().unwrap();
        if let Some(el) = state.elements.get_mut(element) {
            el.rect = rect;
        }
    }

    /// Remove an element entirely, as if detached from the document.
    pub fn remove_element(&self, element: ElementId) {
        let mut state = self.state.lock().unwrap();
        state.elements.remove(element);
        state.order.retain(|&e| e != element);
    }

    /// Scroll the viewport and fire the scroll stream.
    pub fn set_scroll_top(&self, scroll_top: f32) {
        {
            let mut state = self.state.lock().unwrap();
            state.viewport.top = scroll_top;
        }
        self.scroll.fire(&());
    }

    /// Resize the viewport and fire the scroll stream, as a host relayout
    /// would.
    pub fn resize(&self, width: f32, height: f32) {
        {
            let mut state = self.state.lock().unwrap();
            state.viewport.width = width;
            state.viewport.height = height;
        }
        self.scroll.fire(&());
    }

    /// Flip host visibility and notify subscribers.
    pub fn set_visible(&self, visible: bool) {
        {
            let mut state = self.state.lock().unwrap();
            state.visible = visible;
        }
        self.visibility.fire(&visible);
    }

    /// Mark the document ready, running any queued waiters.
    pub fn make_ready(&self) {
        let waiters = {
            let mut state = self.state.lock().unwrap();
            state.ready = true;
            std::mem::take(&mut state.ready_waiters)
        };
        for waiter in waiters {
            waiter();
        }
    }
}

impl ViewportService for TestHost {
    fn rect(&self) -> Rect {
        self.state.lock().unwrap().viewport
    }

    fn scroll_top(&self) -> f32 {
        self.state.lock().unwrap().viewport.top
    }

    fn height(&self) -> f32 {
        self.state.lock().unwrap().viewport.height
    }

    fn layout_rect(&self, element: ElementId) -> Option<Rect> {
        self.state.lock().unwrap().elements.get(element)?.rect
    }

    fn on_scroll(&self, handler: Box<dyn Fn() + Send + Sync>) -> HandlerId {
        self.scroll.add(move |()| handler())
    }

    fn unsubscribe_scroll(&self, id: HandlerId) {
        self.scroll.remove(id);
    }
}

impl ViewerService for TestHost {
    fn is_visible(&self) -> bool {
        self.state.lock().unwrap().visible
    }

    fn on_visibility_changed(&self, handler: Box<dyn Fn(bool) + Send + Sync>) -> HandlerId {
        self.visibility.add(move |visible| handler(*visible))
    }

    fn unsubscribe_visibility(&self, id: HandlerId) {
        self.visibility.remove(id);
    }
}

impl DocumentRoot for TestHost {
    fn when_ready(&self, callback: Box<dyn FnOnce() + Send>) {
        {
            let mut state = self.state.lock().unwrap();
            if !state.ready {
                state.ready_waiters.push(callback);
                return;
            }
        }
        callback();
    }

    fn elements_with_attribute(&self, attribute: &str) -> Vec<AttributeHit> {
        let state = self.state.lock().unwrap();
        state
            .order
            .iter()
            .filter_map(|&id| {
                let value = state.elements.get(id)?.attributes.get(attribute)?;
                Some(AttributeHit {
                    element: id,
                    value: value.clone(),
                })
            })
            .collect()
    }

    fn contains(&self, element: ElementId) -> bool {
        self.state.lock().unwrap().elements.contains_key(element)
    }

    fn attribute(&self, element: ElementId, name: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .elements
            .get(element)?
            .attributes
            .get(name)
            .cloned()
    }

    fn parent(&self, element: ElementId) -> Option<ElementId> {
        self.state.lock().unwrap().elements.get(element)?.parent
    }

    fn root_element(&self) -> ElementId {
        self.state.lock().unwrap().root
    }
}

/// One recorded action dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggeredAction {
    pub element: ElementId,
    pub action: String,
    pub event: ActionEvent,
    pub trust: ActionTrust,
}

/// `ActionService` that records every dispatch for assertions.
#[derive(Default)]
pub struct RecordingActions {
    log: Mutex<Vec<TriggeredAction>>,
}

impl RecordingActions {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Drain and return everything recorded so far.
    pub fn take(&self) -> Vec<TriggeredAction> {
        std::mem::take(&mut *self.log.lock().unwrap())
    }

    /// Action names recorded so far, without draining.
    pub fn names(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .map(|a| a.action.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.lock().unwrap().is_empty()
    }
}

impl ActionService for RecordingActions {
    fn trigger(&self, source: ElementId, action: &str, event: ActionEvent, trust: ActionTrust) {
        self.log.lock().unwrap().push(TriggeredAction {
            element: source,
            action: action.to_string(),
            event,
            trust,
        });
    }
}

//! Host service traits
//!
//! The embedding host owns the document, the viewport, and user-visible
//! event dispatch; the runtime reaches them only through these traits.
//! Elements are referenced by [`ElementId`], a non-owning key minted by the
//! host — the runtime never owns an element and keeps any per-element state
//! in its own side tables.

use slotmap::new_key_type;

use crate::geometry::Rect;
use crate::observable::HandlerId;

new_key_type! {
    /// Non-owning handle to a host-owned element.
    pub struct ElementId;
}

/// Viewport geometry and the scroll stream.
///
/// `rect()` and `layout_rect()` are in document coordinates: the viewport
/// rect's origin is the current scroll offset. Consumers translate layout
/// rects into viewport coordinates themselves.
pub trait ViewportService: Send + Sync {
    /// The viewport box in document coordinates.
    fn rect(&self) -> Rect;

    fn scroll_top(&self) -> f32;

    fn height(&self) -> f32;

    /// The layout box of `element` in document coordinates, or `None` when
    /// the element is not currently resolvable (detached, cross-frame).
    fn layout_rect(&self, element: ElementId) -> Option<Rect>;

    fn on_scroll(&self, handler: Box<dyn Fn() + Send + Sync>) -> HandlerId;

    fn unsubscribe_scroll(&self, id: HandlerId);
}

/// Host/tab visibility.
pub trait ViewerService: Send + Sync {
    fn is_visible(&self) -> bool;

    fn on_visibility_changed(&self, handler: Box<dyn Fn(bool) + Send + Sync>) -> HandlerId;

    fn unsubscribe_visibility(&self, id: HandlerId);
}

/// Trust level attached to a dispatched action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionTrust {
    Low,
    High,
}

/// Payload of a dispatched custom event.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionEvent {
    pub name: String,
    pub percent: Option<f32>,
}

impl ActionEvent {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            percent: None,
        }
    }

    pub fn with_percent(name: &str, percent: f32) -> Self {
        Self {
            name: name.to_string(),
            percent: Some(percent),
        }
    }
}

/// User-visible custom-event dispatch.
pub trait ActionService: Send + Sync {
    fn trigger(&self, source: ElementId, action: &str, event: ActionEvent, trust: ActionTrust);
}

/// An element matched by an attribute scan, with the attribute's value.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeHit {
    pub element: ElementId,
    pub value: String,
}

/// The document root: readiness, structure queries, ordered attribute scans.
pub trait DocumentRoot: Send + Sync {
    /// Invoke `callback` once the document is ready; immediately if it
    /// already is.
    fn when_ready(&self, callback: Box<dyn FnOnce() + Send>);

    /// All elements carrying `attribute`, in document order.
    fn elements_with_attribute(&self, attribute: &str) -> Vec<AttributeHit>;

    fn contains(&self, element: ElementId) -> bool;

    fn attribute(&self, element: ElementId, name: &str) -> Option<String>;

    fn parent(&self, element: ElementId) -> Option<ElementId>;

    /// The top-level document root element.
    fn root_element(&self) -> ElementId;
}

//! Lightbox ordering manager
//!
//! Elements opt in with the `lightbox` marker attribute; the value `none`
//! opts back out. The manager scans the document once it is ready, caches
//! the eligible elements in document order, and serves `get_next`/
//! `get_previous`/`has_next`/`has_previous` against the cache. Traversal
//! results are always deferred, because the first scan may still be waiting
//! on document readiness; at a boundary the neighbor is `None` — no
//! wraparound, and no error.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use sightline_core::deferred::Deferred;
use sightline_core::host::{DocumentRoot, ElementId};
use sightline_core::pass::Pass;
use sightline_core::services::DocumentContext;
use sightline_core::vsync::FrameScheduler;

/// Marker attribute for lightbox eligibility.
pub const LIGHTBOX_ATTRIBUTE: &str = "lightbox";

/// Attribute value that opts an element out despite carrying the marker.
pub const EXCLUSION_TOKEN: &str = "none";

struct ManagerInner {
    elements: Option<Vec<ElementId>>,
    scan: Deferred<()>,
}

pub struct LightboxManager {
    inner: Arc<Mutex<ManagerInner>>,
    pass: Pass,
    document: Arc<dyn DocumentRoot>,
}

impl LightboxManager {
    /// The per-document manager instance, installed on first use.
    pub fn install(ctx: &DocumentContext) -> Arc<Self> {
        ctx.service(|ctx| {
            Arc::new(LightboxManager::new(
                ctx.vsync().clone(),
                Arc::clone(ctx.document()),
            ))
        })
    }

    pub fn new(scheduler: FrameScheduler, document: Arc<dyn DocumentRoot>) -> Self {
        let inner = Arc::new(Mutex::new(ManagerInner {
            elements: None,
            scan: Deferred::pending(),
        }));

        let weak = Arc::downgrade(&inner);
        let document_for_pass = Arc::clone(&document);
        let pass = Pass::new(&scheduler, Duration::ZERO, move || {
            scan_document(&weak, &document_for_pass);
        });

        // The first scan waits for document readiness, then coalesces
        // through the pass like any re-scan.
        let pass_for_ready = pass.clone();
        document.when_ready(Box::new(move || pass_for_ready.schedule()));

        Self {
            inner,
            pass,
            document,
        }
    }

    /// The element after `element` in document order, or `None` at the end
    /// (or when `element` is not eligible).
    pub fn get_next(&self, element: ElementId) -> Deferred<Option<ElementId>> {
        self.neighbor(element, 1)
    }

    /// The element before `element` in document order, or `None` at the
    /// start.
    pub fn get_previous(&self, element: ElementId) -> Deferred<Option<ElementId>> {
        self.neighbor(element, -1)
    }

    pub fn has_next(&self, element: ElementId) -> Deferred<bool> {
        let result = Deferred::pending();
        let result_for_then = result.clone();
        self.get_next(element)
            .then(move |next| result_for_then.resolve(next.is_some()));
        result
    }

    pub fn has_previous(&self, element: ElementId) -> Deferred<bool> {
        let result = Deferred::pending();
        let result_for_then = result.clone();
        self.get_previous(element)
            .then(move |previous| result_for_then.resolve(previous.is_some()));
        result
    }

    /// Drop the cached scan and coalesce a fresh one. Queries issued before
    /// the re-scan completes resolve against the new scan.
    pub fn invalidate(&self) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.elements = None;
            inner.scan = Deferred::pending();
        }
        tracing::debug!("lightbox cache invalidated");
        self.pass.schedule();
    }

    /// Coalesce a re-scan after `delay` without dropping the current cache.
    pub fn schedule_rescan(&self, delay: Duration) {
        self.pass.schedule_after(delay);
    }

    pub fn is_scanned(&self) -> bool {
        self.inner.lock().unwrap().elements.is_some()
    }

    fn neighbor(&self, element: ElementId, offset: i64) -> Deferred<Option<ElementId>> {
        let result = Deferred::pending();
        let result_for_scan = result.clone();
        let inner = Arc::clone(&self.inner);
        let scan = self.inner.lock().unwrap().scan.clone();
        scan.then(move |_| {
            let neighbor = {
                let guard = inner.lock().unwrap();
                match &guard.elements {
                    Some(elements) => neighbor_in(elements, element, offset),
                    None => None,
                }
            };
            result_for_scan.resolve(neighbor);
        });
        result
    }
}

fn neighbor_in(elements: &[ElementId], element: ElementId, offset: i64) -> Option<ElementId> {
    let index = elements.iter().position(|&e| e == element)? as i64;
    let target = index + offset;
    if target < 0 {
        return None;
    }
    elements.get(target as usize).copied()
}

fn scan_document(weak: &Weak<Mutex<ManagerInner>>, document: &Arc<dyn DocumentRoot>) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    let elements: Vec<ElementId> = document
        .elements_with_attribute(LIGHTBOX_ATTRIBUTE)
        .into_iter()
        .filter(|hit| hit.value != EXCLUSION_TOKEN)
        .map(|hit| hit.element)
        .collect();
    tracing::debug!(eligible = elements.len(), "lightbox scan complete");

    let scan = {
        let mut guard = inner.lock().unwrap();
        guard.elements = Some(elements);
        guard.scan.clone()
    };
    if !scan.is_resolved() {
        scan.resolve(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sightline_core::geometry::Rect;
    use sightline_core::testing::TestHost;
    use std::time::Instant;

    struct Fixture {
        host: Arc<TestHost>,
        vsync: FrameScheduler,
        manager: LightboxManager,
        a: ElementId,
        b: ElementId,
        c: ElementId,
    }

    /// Three eligible elements `[a, b, c]` plus one excluded and one
    /// unmarked, already scanned.
    fn scanned_fixture() -> Fixture {
        let host = TestHost::new(Rect::new(0.0, 0.0, 800.0, 500.0));
        let a = host.insert_element(None);
        host.set_attribute(a, LIGHTBOX_ATTRIBUTE, "");
        let excluded = host.insert_element(None);
        host.set_attribute(excluded, LIGHTBOX_ATTRIBUTE, EXCLUSION_TOKEN);
        let b = host.insert_element(None);
        host.set_attribute(b, LIGHTBOX_ATTRIBUTE, "gallery");
        let _unmarked = host.insert_element(None);
        let c = host.insert_element(None);
        host.set_attribute(c, LIGHTBOX_ATTRIBUTE, "");

        let vsync = FrameScheduler::new();
        let manager = LightboxManager::new(
            vsync.clone(),
            Arc::clone(&host) as Arc<dyn DocumentRoot>,
        );
        host.make_ready();
        vsync.tick();
        assert!(manager.is_scanned());

        Fixture {
            host,
            vsync,
            manager,
            a,
            b,
            c,
        }
    }

    #[test]
    fn test_traversal_over_eligible_elements() {
        let f = scanned_fixture();
        assert_eq!(f.manager.get_next(f.a).peek(), Some(Some(f.b)));
        assert_eq!(f.manager.get_next(f.b).peek(), Some(Some(f.c)));
        assert_eq!(f.manager.get_previous(f.c).peek(), Some(Some(f.b)));
    }

    #[test]
    fn test_boundaries_have_no_neighbors() {
        let f = scanned_fixture();
        assert_eq!(f.manager.get_next(f.c).peek(), Some(None));
        assert_eq!(f.manager.get_previous(f.a).peek(), Some(None));
        assert_eq!(f.manager.has_next(f.c).peek(), Some(false));
        assert_eq!(f.manager.has_previous(f.a).peek(), Some(false));
        assert_eq!(f.manager.has_next(f.a).peek(), Some(true));
    }

    #[test]
    fn test_ineligible_element_has_no_neighbors() {
        let f = scanned_fixture();
        let outsider = f.host.insert_element(None);
        assert_eq!(f.manager.get_next(outsider).peek(), Some(None));
    }

    #[test]
    fn test_queries_before_readiness_resolve_after_scan() {
        let host = TestHost::new(Rect::new(0.0, 0.0, 800.0, 500.0));
        let a = host.insert_element(None);
        host.set_attribute(a, LIGHTBOX_ATTRIBUTE, "");
        let b = host.insert_element(None);
        host.set_attribute(b, LIGHTBOX_ATTRIBUTE, "");

        let vsync = FrameScheduler::new();
        let manager = LightboxManager::new(
            vsync.clone(),
            Arc::clone(&host) as Arc<dyn DocumentRoot>,
        );

        // Document not ready: the query stays pending.
        let next = manager.get_next(a);
        assert_eq!(next.peek(), None);

        host.make_ready();
        assert_eq!(next.peek(), None);
        vsync.tick_at(Instant::now());
        assert_eq!(next.peek(), Some(Some(b)));
    }

    #[test]
    fn test_invalidate_rescans_on_next_tick() {
        let f = scanned_fixture();

        // A newly marked element is invisible to the stale cache.
        let d = f.host.insert_element(None);
        f.host.set_attribute(d, LIGHTBOX_ATTRIBUTE, "");
        assert_eq!(f.manager.get_next(f.c).peek(), Some(None));

        f.manager.invalidate();
        assert!(!f.manager.is_scanned());

        // Queries issued against the invalidated cache wait for the
        // re-scan.
        let pending = f.manager.get_next(f.c);
        assert_eq!(pending.peek(), None);

        f.vsync.tick();
        assert_eq!(pending.peek(), Some(Some(d)));
        assert_eq!(f.manager.get_previous(d).peek(), Some(Some(f.c)));
    }
}

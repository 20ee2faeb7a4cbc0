//! Per-document context and service registry
//!
//! A [`DocumentContext`] bundles the host-service handles for one document
//! together with a type-keyed registry of lazily installed runtime services.
//! Services are installed per document and passed by reference — there is no
//! module-level singleton, and two documents in one process never share an
//! observer.
//!
//! # Example
//!
//! ```ignore
//! let ctx = DocumentContext::new(vsync, viewport, viewer, actions, document);
//! let observer = ctx.service(|ctx| {
//!     Arc::new(PositionObserver::new(ctx.vsync().clone(), Arc::clone(ctx.viewport())))
//! });
//! ```

use rustc_hash::FxHashMap;
use std::any::{Any, TypeId};
use std::sync::{Arc, Mutex};

use crate::host::{ActionService, DocumentRoot, ViewerService, ViewportService};
use crate::vsync::FrameScheduler;

/// Type-keyed registry of lazily installed services.
pub struct ServiceRegistry {
    services: Mutex<FxHashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            services: Mutex::new(FxHashMap::default()),
        }
    }

    /// Return the `T` instance for this registry, installing it with
    /// `install` on first request. The builder runs outside the registry
    /// lock so it may itself request other services.
    pub fn get_or_install<T, F>(&self, install: F) -> Arc<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Arc<T>,
    {
        let key = TypeId::of::<T>();
        if let Some(existing) = self.services.lock().unwrap().get(&key) {
            return Arc::clone(existing)
                .downcast::<T>()
                .expect("service registry type mismatch");
        }

        let built = install();
        let mut services = self.services.lock().unwrap();
        let entry = services
            .entry(key)
            .or_insert_with(|| built as Arc<dyn Any + Send + Sync>);
        Arc::clone(entry)
            .downcast::<T>()
            .expect("service registry type mismatch")
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.services
            .lock()
            .unwrap()
            .contains_key(&TypeId::of::<T>())
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a component needs from its document: the frame pump, the host
/// services, and the per-document service registry.
pub struct DocumentContext {
    vsync: FrameScheduler,
    viewport: Arc<dyn ViewportService>,
    viewer: Arc<dyn ViewerService>,
    actions: Arc<dyn ActionService>,
    document: Arc<dyn DocumentRoot>,
    services: ServiceRegistry,
}

impl DocumentContext {
    pub fn new(
        vsync: FrameScheduler,
        viewport: Arc<dyn ViewportService>,
        viewer: Arc<dyn ViewerService>,
        actions: Arc<dyn ActionService>,
        document: Arc<dyn DocumentRoot>,
    ) -> Self {
        Self {
            vsync,
            viewport,
            viewer,
            actions,
            document,
            services: ServiceRegistry::new(),
        }
    }

    pub fn vsync(&self) -> &FrameScheduler {
        &self.vsync
    }

    pub fn viewport(&self) -> &Arc<dyn ViewportService> {
        &self.viewport
    }

    pub fn viewer(&self) -> &Arc<dyn ViewerService> {
        &self.viewer
    }

    pub fn actions(&self) -> &Arc<dyn ActionService> {
        &self.actions
    }

    pub fn document(&self) -> &Arc<dyn DocumentRoot> {
        &self.document
    }

    /// The per-document instance of service `T`, installed on first use.
    pub fn service<T, F>(&self, install: F) -> Arc<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce(&DocumentContext) -> Arc<T>,
    {
        self.services.get_or_install(|| install(self))
    }
}

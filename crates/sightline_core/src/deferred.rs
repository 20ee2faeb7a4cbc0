//! Single-assignment deferred results
//!
//! `Deferred<T>` standardizes the sometimes-synchronous, sometimes-
//! asynchronous results in the runtime (document scans, traversal queries)
//! on one contract: callers always attach a callback with [`then`], which
//! fires immediately when the value is already present and otherwise once
//! [`resolve`] is called. Resolution happens at most once.
//!
//! [`then`]: Deferred::then
//! [`resolve`]: Deferred::resolve

use std::sync::{Arc, Mutex};

enum DeferredState<T> {
    Pending(Vec<Box<dyn FnOnce(&T) + Send>>),
    Resolved(T),
}

pub struct Deferred<T> {
    state: Arc<Mutex<DeferredState<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: Clone + Send + 'static> Deferred<T> {
    pub fn pending() -> Self {
        Self {
            state: Arc::new(Mutex::new(DeferredState::Pending(Vec::new()))),
        }
    }

    pub fn resolved(value: T) -> Self {
        Self {
            state: Arc::new(Mutex::new(DeferredState::Resolved(value))),
        }
    }

    /// Resolve with `value`, invoking all waiting callbacks. A second
    /// resolution is ignored.
    pub fn resolve(&self, value: T) {
        let waiters = {
            let mut state = self.state.lock().unwrap();
            match &mut *state {
                DeferredState::Pending(waiters) => {
                    let waiters = std::mem::take(waiters);
                    *state = DeferredState::Resolved(value.clone());
                    waiters
                }
                DeferredState::Resolved(_) => {
                    tracing::warn!("deferred resolved twice; second value dropped");
                    return;
                }
            }
        };
        for waiter in waiters {
            waiter(&value);
        }
    }

    /// Attach `callback`; it runs immediately if the value is present.
    ///
    /// Callbacks run outside the internal lock, so they may attach further
    /// callbacks or resolve other deferreds.
    pub fn then(&self, callback: impl FnOnce(&T) + Send + 'static) {
        let value = {
            let mut state = self.state.lock().unwrap();
            match &mut *state {
                DeferredState::Pending(waiters) => {
                    waiters.push(Box::new(callback));
                    return;
                }
                DeferredState::Resolved(value) => value.clone(),
            }
        };
        callback(&value);
    }

    pub fn is_resolved(&self) -> bool {
        matches!(*self.state.lock().unwrap(), DeferredState::Resolved(_))
    }

    /// The resolved value, if any.
    pub fn peek(&self) -> Option<T> {
        match &*self.state.lock().unwrap() {
            DeferredState::Resolved(value) => Some(value.clone()),
            DeferredState::Pending(_) => None,
        }
    }
}

//! Keyed handler registries with deterministic fire order
//!
//! `Observable<T>` backs every event stream in the runtime: scroll, host
//! visibility changes, scene ticks, duration changes. Handlers are invoked
//! in registration order and can add or remove handlers reentrantly from
//! inside a firing; a handler removed mid-fire is not invoked again in the
//! same firing.

use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::sync::{Arc, Mutex};

new_key_type! {
    /// Handle returned from [`Observable::add`], used to remove the handler.
    pub struct HandlerId;
}

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct ObservableInner<T> {
    handlers: SlotMap<HandlerId, Handler<T>>,
    order: SmallVec<[HandlerId; 4]>,
}

pub struct Observable<T> {
    inner: Mutex<ObservableInner<T>>,
}

impl<T> Observable<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ObservableInner {
                handlers: SlotMap::with_key(),
                order: SmallVec::new(),
            }),
        }
    }

    pub fn add(&self, handler: impl Fn(&T) + Send + Sync + 'static) -> HandlerId {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.handlers.insert(Arc::new(handler));
        inner.order.push(id);
        id
    }

    pub fn remove(&self, id: HandlerId) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let removed = inner.handlers.remove(id).is_some();
        if removed {
            inner.order.retain(|h| *h != id);
        }
        removed
    }

    /// Invoke every live handler with `event`, in registration order.
    ///
    /// Handlers run outside the registry lock, so they may call `add` or
    /// `remove` on this observable; liveness is re-checked before each
    /// invocation.
    pub fn fire(&self, event: &T) {
        let order: SmallVec<[HandlerId; 4]> = {
            let inner = self.inner.lock().unwrap();
            inner.order.clone()
        };
        for id in order {
            let handler = {
                let inner = self.inner.lock().unwrap();
                inner.handlers.get(id).cloned()
            };
            if let Some(handler) = handler {
                handler(event);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().handlers.is_empty()
    }
}

impl<T> Default for Observable<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn test_fire_in_registration_order() {
        let observable = Observable::<i32>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let log = Arc::clone(&log);
            observable.add(move |value: &i32| {
                log.lock().unwrap().push(format!("{tag}:{value}"));
            });
        }

        observable.fire(&7);
        assert_eq!(
            log.lock().unwrap().as_slice(),
            ["a:7", "b:7", "c:7"]
        );
    }

    #[test]
    fn test_removed_handler_not_invoked() {
        let observable = Observable::<()>::new();
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = Arc::clone(&calls);

        let id = observable.add(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        observable.fire(&());
        assert!(observable.remove(id));
        observable.fire(&());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // Removing twice reports false.
        assert!(!observable.remove(id));
    }

    #[test]
    fn test_reentrant_remove_during_fire() {
        let observable = Arc::new(Observable::<()>::new());
        let calls = Arc::new(AtomicI32::new(0));

        // First handler removes the second before it ever runs.
        let victim_slot = Arc::new(Mutex::new(None));
        let victim_for_remover = Arc::clone(&victim_slot);
        let obs_for_remover = Arc::clone(&observable);
        observable.add(move |_| {
            if let Some(id) = victim_for_remover.lock().unwrap().take() {
                obs_for_remover.remove(id);
            }
        });

        let calls_clone = Arc::clone(&calls);
        let victim = observable.add(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        *victim_slot.lock().unwrap() = Some(victim);

        observable.fire(&());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}

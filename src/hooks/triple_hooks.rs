use crate::{
    ids::Triple,
    utils::generational_vector::{SlotHandle, SlotVec},
};

/// Callback for newly asserted triples.
pub type TripleCallback = Box<dyn Fn(Triple) + Send + Sync>;

/// Subscription returned by `TripleHooks::subscribe`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HookHandle(SlotHandle);

/// Triple-added subscribers.
/// * Callbacks run after the slab updates, in subscription slot order.
/// * Callbacks only see the triple, they cannot reach the store.
#[derive(Default)]
pub struct TripleHooks {
    callbacks: SlotVec<TripleCallback>,
}

impl TripleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, callback: F) -> HookHandle
    where
        F: Fn(Triple) + Send + Sync + 'static,
    {
        HookHandle(self.callbacks.insert(Box::new(callback)))
    }

    /// False when the handle was already unsubscribed.
    pub fn unsubscribe(&mut self, handle: HookHandle) -> bool {
        self.callbacks.remove(handle.0).is_some()
    }

    pub fn is_subscribed(&self, handle: HookHandle) -> bool {
        self.callbacks.contains(handle.0)
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn notify(&self, triple: Triple) {
        for callback in self.callbacks.values() {
            callback(triple);
        }
    }

    pub fn notify_all(&self, triples: &[Triple]) {
        if self.callbacks.is_empty() {
            return;
        }
        for t in triples {
            self.notify(*t);
        }
    }
}

impl std::fmt::Debug for TripleHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TripleHooks")
            .field("subscribers", &self.callbacks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    #[test]
    fn test_notify_and_unsubscribe() {
        let mut hooks = TripleHooks::new();
        let seen = Arc::new(Mutex::new(vec![]));
        let count = Arc::new(AtomicUsize::new(0));

        let sink = seen.clone();
        let a = hooks.subscribe(move |t| sink.lock().unwrap().push(t));
        let counter = count.clone();
        let b = hooks.subscribe(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(hooks.len(), 2);

        hooks.notify(Triple::new(1, 2, 3));
        assert!(hooks.unsubscribe(a));
        assert!(!hooks.unsubscribe(a));
        assert!(!hooks.is_subscribed(a));
        assert!(hooks.is_subscribed(b));
        hooks.notify_all(&[Triple::new(4, 5, 6), Triple::new(7, 8, 9)]);

        assert_eq!(*seen.lock().unwrap(), vec![Triple::new(1, 2, 3)]);
        assert_eq!(count.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_stale_handle_after_reuse() {
        let mut hooks = TripleHooks::new();
        let a = hooks.subscribe(|_| {});
        hooks.unsubscribe(a);
        let b = hooks.subscribe(|_| {});
        assert_ne!(a, b);
        assert!(!hooks.unsubscribe(a));
        assert!(hooks.is_subscribed(b));
    }
}

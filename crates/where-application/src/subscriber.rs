use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Handle returned by [`SubscriberRegistry::subscribe`].
pub type SubscriptionId = Uuid;

type Callback<P> = Arc<dyn Fn(&P) + Send + Sync>;

/// Re-render callbacks registered against one view-model.
///
/// Callbacks are invoked synchronously, in registration order, after the
/// owning cache has been fully updated. A callback that panics is logged and
/// the remaining callbacks still run.
pub struct SubscriberRegistry<P> {
    subscribers: Mutex<Vec<(SubscriptionId, Callback<P>)>>,
}

impl<P> SubscriberRegistry<P> {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Callback<P>)>> {
        // A panicking callback never runs under this lock, but recover anyway.
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        self.entries().push((id, Arc::new(callback)));
        tracing::debug!("[SubscriberRegistry] subscribed {}", id);
        id
    }

    /// Removes a callback. Returns `false` if `id` was not registered.
    pub fn unsubscribe(&self, id: &SubscriptionId) -> bool {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|(existing, _)| existing != id);
        before != entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Invokes every callback with `perspective`.
    ///
    /// The callback list is copied out first so a callback may subscribe or
    /// unsubscribe without deadlocking.
    pub fn notify(&self, perspective: &P) {
        let callbacks: Vec<(SubscriptionId, Callback<P>)> = self.entries().clone();
        for (id, callback) in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(perspective))).is_err() {
                tracing::error!("[SubscriberRegistry] subscriber {} panicked", id);
            }
        }
    }
}

impl<P> Default for SubscriberRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

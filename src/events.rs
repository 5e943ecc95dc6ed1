use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, Weak};

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Handlers<T> {
    next_id: u64,
    handlers: BTreeMap<u64, Handler<T>>,
}

/// Observer registry. Handlers run synchronously, in subscription order,
/// on the publishing thread.
pub struct EventHub<T> {
    inner: Arc<RwLock<Handlers<T>>>,
}

impl<T> Clone for EventHub<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for EventHub<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Handlers {
                next_id: 0,
                handlers: BTreeMap::new(),
            })),
        }
    }
}

impl<T: 'static> EventHub<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, handler: F) -> Unsubscribe<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = match self.inner.write() {
            Ok(mut inner) => {
                let id = inner.next_id;
                inner.next_id += 1;
                inner.handlers.insert(id, Arc::new(handler));
                id
            }
            Err(_) => {
                tracing::error!("event hub lock poisoned, handler not registered");
                u64::MAX
            }
        };
        Unsubscribe {
            hub: Arc::downgrade(&self.inner),
            id,
        }
    }

    pub fn publish(&self, event: &T) {
        // Snapshot so a handler may subscribe or unsubscribe without deadlocking.
        let handlers: Vec<Handler<T>> = match self.inner.read() {
            Ok(inner) => inner.handlers.values().cloned().collect(),
            Err(_) => return,
        };
        for handler in handlers {
            handler(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .read()
            .map(|inner| inner.handlers.len())
            .unwrap_or(0)
    }
}

/// Removes its handler when called. Dropping it keeps the handler registered.
#[must_use = "keep the handle to be able to unsubscribe"]
pub struct Unsubscribe<T> {
    hub: Weak<RwLock<Handlers<T>>>,
    id: u64,
}

impl<T> Unsubscribe<T> {
    pub fn unsubscribe(self) {
        if let Some(hub) = self.hub.upgrade()
            && let Ok(mut inner) = hub.write()
        {
            inner.handlers.remove(&self.id);
        }
    }
}

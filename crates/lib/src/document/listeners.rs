//! Change listeners keyed by normalized path.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tracing::error;

use crate::Result;

/// Callback receiving the value at a path, or `None` if nothing lives there.
pub type Listener = Arc<dyn Fn(Option<&Value>) -> Result<()> + Send + Sync>;

/// Handle returned by [`Document::listen`](super::Document::listen).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    path: String,
    id: u64,
}

impl Subscription {
    /// The normalized path this subscription watches.
    pub fn path(&self) -> &str {
        &self.path
    }
}

#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: RwLock<HashMap<String, Vec<(u64, Listener)>>>,
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("paths", &self.read().len())
            .finish()
    }
}

impl ListenerRegistry {
    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Vec<(u64, Listener)>>> {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `listener` for the normalized `path`.
    pub(crate) fn register(&self, path: String, listener: Listener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(path.clone())
            .or_default()
            .push((id, listener));
        Subscription { path, id }
    }

    /// Removes a subscription. Returns false if it was already gone.
    pub(crate) fn remove(&self, subscription: &Subscription) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(entries) = listeners.get_mut(&subscription.path) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(id, _)| *id != subscription.id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            listeners.remove(&subscription.path);
        }
        removed
    }

    pub(crate) fn has_listeners(&self, path: &str) -> bool {
        self.read().contains_key(path)
    }

    /// Calls every listener on `path`.
    ///
    /// A failing listener is logged and the remaining listeners still run.
    pub(crate) fn notify(&self, path: &str, value: Option<&Value>) {
        let listeners: Vec<Listener> = match self.read().get(path) {
            Some(entries) => entries.iter().map(|(_, l)| l.clone()).collect(),
            None => return,
        };
        for listener in listeners {
            if let Err(e) = listener(value) {
                error!(path, "listener failed: {e}");
            }
        }
    }

    /// Calls a single listener, logging its failure.
    pub(crate) fn deliver(path: &str, listener: &Listener, value: Option<&Value>) {
        if let Err(e) = listener(value) {
            error!(path, "listener failed: {e}");
        }
    }
}

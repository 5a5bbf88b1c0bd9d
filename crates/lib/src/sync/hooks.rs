//! Sync hooks for detecting root hash changes.
//!
//! A [`Document`](crate::Document) runs its hooks whenever an operation
//! leaves the root with a new hash, whether the change was local or came from
//! a peer. The [`Network`](super::Network) coordinator registers one to
//! broadcast a fresh root `Get` to its idle peers. Hooks are held by the
//! document, and the coordinator's hook holds no reference back to it.

use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;

/// Context passed to hooks after the root hash changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootChangeContext {
    /// The root hash before the operation
    pub previous_hash: String,
    /// The root hash after the operation
    pub hash: String,
}

/// Trait for code that reacts to a document's root hash changing.
#[async_trait]
pub trait RootChangeHook: Send + Sync {
    /// Called after the operation that changed the root has been persisted.
    ///
    /// Hook failures do not undo the operation, but are logged.
    async fn on_root_changed(&self, context: &RootChangeContext) -> Result<()>;
}

/// A collection of hooks executed together, in registration order.
#[derive(Default, Clone)]
pub struct RootChangeHookCollection {
    hooks: Vec<Arc<dyn RootChangeHook>>,
}

impl RootChangeHookCollection {
    /// Create a new empty hook collection.
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Add a hook to the collection.
    pub fn add_hook(&mut self, hook: Arc<dyn RootChangeHook>) {
        self.hooks.push(hook);
    }

    /// Execute all hooks in the collection with the given context.
    ///
    /// If a hook fails, execution continues with the remaining hooks and
    /// the first error is returned at the end.
    pub async fn execute_hooks(&self, context: &RootChangeContext) -> Result<()> {
        let mut first_error = None;

        for hook in &self.hooks {
            if let Err(e) = hook.on_root_changed(context).await {
                tracing::error!("Root change hook failed: {e}");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Get the number of registered hooks.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Check if the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

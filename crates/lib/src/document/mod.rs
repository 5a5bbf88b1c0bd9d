//! The path-based facade over one replica of a shared document.
//!
//! A [`Document`] owns the [`Store`] holding every node of the tree, and
//! exposes the JSON view of it: `get`, `set` and `delete` by dotted path, plus
//! `listen` for change notifications. Messages from peers enter through
//! [`Document::handle_message`], usually called by a [`Network`](crate::sync::Network).
//!
//! Whole-tree operations are serialized by a document-level lock. Listeners
//! and root-change hooks run after that lock is released, once the operation
//! has fully landed, so a listener reading the document sees the new state.

use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, trace};

use crate::backend::Backend;
use crate::clock::{Clock, SystemClock};
use crate::codec::{Decode, Encode};
use crate::config::DocumentConfig;
use crate::crdt::{CRDTError, Crdt, CrdtKind, NodeContext, OrMap};
use crate::store::Store;
use crate::sync::hooks::{RootChangeContext, RootChangeHook, RootChangeHookCollection};
use crate::sync::protocol::Message;
use crate::tag::{Tag, TagGenerator};
use crate::Result;

mod errors;
mod listeners;
pub mod path;

pub use errors::DocumentError;
pub use listeners::{Listener, Subscription};

use listeners::ListenerRegistry;
use path::{normalize_path, segments};

struct DocumentInternal {
    store: Arc<Store>,
    tags: TagGenerator,
    config: DocumentConfig,
    /// Held for the duration of every whole-tree operation.
    op_lock: Mutex<()>,
    listeners: ListenerRegistry,
    hooks: RwLock<RootChangeHookCollection>,
}

/// One replica of a shared JSON document.
///
/// `Document` is a cheap-to-clone handle; clones share the same replica.
#[derive(Clone)]
pub struct Document {
    inner: Arc<DocumentInternal>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("store", &self.inner.store)
            .field("config", &self.inner.config)
            .field("listeners", &self.inner.listeners)
            .finish_non_exhaustive()
    }
}

/// The outcome of one operation, before notifications go out.
struct Landed<T> {
    result: T,
    changed: Vec<String>,
    previous_hash: String,
    hash: String,
}

impl<T> Landed<T> {
    fn new(result: T, ctx: &NodeContext, previous_hash: String, root: &Crdt) -> Self {
        Self {
            result,
            changed: ctx.take_changes(),
            previous_hash,
            hash: root.hash().to_string(),
        }
    }
}

impl Document {
    /// Opens the document held in `backend`, creating an empty root if the
    /// backend has none.
    pub async fn open(backend: Box<dyn Backend>, config: DocumentConfig) -> Result<Self> {
        Self::open_with_clock(backend, config, Arc::new(SystemClock)).await
    }

    /// Opens a document whose timestamps and tags come from `clock`.
    pub async fn open_with_clock(
        backend: Box<dyn Backend>,
        config: DocumentConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let backend: Arc<dyn Backend> = Arc::from(backend);
        let document = Self {
            inner: Arc::new(DocumentInternal {
                store: Arc::new(Store::new(backend)),
                tags: TagGenerator::new(clock),
                config,
                op_lock: Mutex::new(()),
                listeners: ListenerRegistry::default(),
                hooks: RwLock::new(RootChangeHookCollection::new()),
            }),
        };

        if document.inner.store.get(&Tag::root()).await?.is_none() {
            debug!("creating empty document root");
            document
                .inner
                .store
                .set(OrMap::new(Tag::root()).into())
                .await?;
        }
        Ok(document)
    }

    pub fn config(&self) -> &DocumentConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.inner.store
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        self.inner.store.backend()
    }

    /// Generates an id unique across all replicas, such as a fresh tag.
    pub fn new_unique_id(&self) -> String {
        self.inner.tags.generate().into()
    }

    fn context(&self) -> NodeContext {
        NodeContext::new(self.inner.store.clone(), self.inner.tags.clone())
    }

    async fn lock(&self) -> MutexGuard<'_, ()> {
        self.inner.op_lock.lock().await
    }

    /// Loads the root map, recreating it if its record has gone missing.
    async fn load_root(&self) -> Result<Crdt> {
        match self.inner.store.get(&Tag::root()).await? {
            Some(root @ Crdt::Map(_)) => Ok(root),
            Some(other) => Err(CRDTError::KindMismatch {
                tag: Tag::root().to_string(),
                local: other.kind(),
                remote: CrdtKind::Map,
            }
            .into()),
            None => {
                debug!("document root missing; starting from an empty root");
                let root: Crdt = OrMap::new(Tag::root()).into();
                self.inner.store.set(root.clone()).await?;
                Ok(root)
            }
        }
    }

    /// Returns the current hash of the root map.
    pub async fn root_hash(&self) -> Result<String> {
        let _guard = self.lock().await;
        Ok(self.load_root().await?.hash().to_string())
    }

    /// Reads the JSON value at `path`, or `None` if nothing lives there.
    ///
    /// The empty path reads the whole document.
    pub async fn get(&self, path: &str) -> Result<Option<Value>> {
        let _guard = self.lock().await;
        let ctx = self.context();
        self.load_root()
            .await?
            .read(&ctx, &segments(path))
            .await
    }

    /// Writes `value` at `path`, creating intermediate maps as needed.
    ///
    /// Objects and arrays are merged key by key into what is already there;
    /// arrays are stored as maps keyed by element index.
    ///
    /// # Errors
    /// [`DocumentError::RootMustBeMap`] if `path` is the root and `value` is
    /// not an object or array.
    pub async fn set(&self, path: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let path = segments(path);
        let landed = {
            let _guard = self.lock().await;
            let ctx = self.context();
            let root = self.load_root().await?;
            let previous_hash = root.hash().to_string();
            let root = root.write(&ctx, &value, &path, "").await?;
            Landed::new((), &ctx, previous_hash, &root)
        };
        self.announce(landed).await;
        Ok(())
    }

    /// Deletes whatever lives at `path`. Deleting a missing path does nothing.
    ///
    /// # Errors
    /// [`DocumentError::RootNotDeletable`] if `path` is the root.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let path = segments(path);
        if path.is_empty() {
            return Err(DocumentError::RootNotDeletable.into());
        }
        let landed = {
            let _guard = self.lock().await;
            let ctx = self.context();
            let mut root = self.load_root().await?;
            let previous_hash = root.hash().to_string();
            root.delete(&ctx, &path, "").await?;
            Landed::new((), &ctx, previous_hash, &root)
        };
        self.announce(landed).await;
        Ok(())
    }

    /// Applies one sync message to the tree and returns the reply, if any.
    pub async fn handle_message(&self, message: &Message) -> Result<Option<Message>> {
        let landed = {
            let _guard = self.lock().await;
            let ctx = self.context();
            let mut root = self.load_root().await?;
            let previous_hash = root.hash().to_string();
            let reply = root.handle(&ctx, message, "").await?;
            Landed::new(reply, &ctx, previous_hash, &root)
        };
        trace!(
            kind = ?message.kind(),
            changed = landed.changed.len(),
            replied = landed.result.is_some(),
            "handled sync message"
        );
        let reply = landed.result.clone();
        self.announce(landed).await;
        Ok(reply)
    }

    /// Decodes a frame, applies it and encodes the reply.
    pub async fn handle_bytes(&self, bytes: &[u8]) -> Result<Option<Vec<u8>>> {
        let message = Message::decode(bytes)?;
        Ok(self
            .handle_message(&message)
            .await?
            .map(|reply| reply.encode()))
    }

    /// Delivers notifications for an operation that has landed.
    async fn announce<T>(&self, landed: Landed<T>) {
        for path in &landed.changed {
            if !self.inner.listeners.has_listeners(path) {
                continue;
            }
            match self.get(path).await {
                Ok(value) => self.inner.listeners.notify(path, value.as_ref()),
                Err(e) => debug!(path = %path, "failed to read changed path: {e}"),
            }
        }

        if landed.hash != landed.previous_hash {
            let hooks = self
                .inner
                .hooks
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            let context = RootChangeContext {
                previous_hash: landed.previous_hash,
                hash: landed.hash,
            };
            // Failures are logged by the collection; the change has landed.
            let _ = hooks.execute_hooks(&context).await;
        }
    }

    /// Calls `listener` with the value at `path` now, then after every change
    /// at or below it.
    pub async fn listen<F>(&self, path: &str, listener: F) -> Result<Subscription>
    where
        F: Fn(Option<&Value>) -> Result<()> + Send + Sync + 'static,
    {
        let path = normalize_path(path);
        let listener: Listener = Arc::new(listener);
        let current = self.get(&path).await?;
        let subscription = self.inner.listeners.register(path.clone(), listener.clone());
        ListenerRegistry::deliver(&path, &listener, current.as_ref());
        Ok(subscription)
    }

    /// Stops a listener. Returns false if it was already removed.
    pub fn unlisten(&self, subscription: &Subscription) -> bool {
        self.inner.listeners.remove(subscription)
    }

    /// Registers a hook run whenever an operation changes the root hash.
    pub fn add_root_hook(&self, hook: Arc<dyn RootChangeHook>) {
        self.inner
            .hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add_hook(hook);
    }
}

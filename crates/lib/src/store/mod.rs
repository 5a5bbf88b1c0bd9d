//! Caching, serialized access to CRDT nodes.
//!
//! The [`Store`] sits between the CRDT engine and a byte-oriented
//! [`Backend`]. It decodes records into [`Crdt`] values, keeps every node it
//! has seen in a cache keyed by tag, and runs all of its operations one at a
//! time: a single FIFO mutex guards the cache and every backend call, so
//! concurrent callers queue behind the operation in flight and never observe
//! a half-applied read or write.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::trace;

use crate::Result;
use crate::backend::Backend;
use crate::codec::{Decode, Encode};
use crate::crdt::Crdt;
use crate::tag::Tag;

/// Node store over a [`Backend`], keyed by tag.
pub struct Store {
    backend: Arc<dyn Backend>,
    cache: Mutex<HashMap<Tag, Crdt>>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The backend records are persisted to.
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Loads the node stored under `tag`.
    ///
    /// Returns `Ok(None)` if the backend has no record for it.
    pub async fn get(&self, tag: &Tag) -> Result<Option<Crdt>> {
        let mut cache = self.cache.lock().await;
        if let Some(node) = cache.get(tag) {
            return Ok(Some(node.clone()));
        }

        let bytes = match self.backend.get(tag).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        let node = Crdt::decode(&bytes)?;
        trace!(%tag, kind = ?node.kind(), "loaded node from backend");
        cache.insert(tag.clone(), node.clone());
        Ok(Some(node))
    }

    /// Persists `node` under its tag, replacing any previous version.
    pub async fn set(&self, node: Crdt) -> Result<()> {
        let mut cache = self.cache.lock().await;
        self.backend.set(node.tag(), node.encode()).await?;
        cache.insert(node.tag().clone(), node);
        Ok(())
    }

    /// Removes the node stored under `tag`. Removing an absent node succeeds.
    pub async fn del(&self, tag: &Tag) -> Result<()> {
        let mut cache = self.cache.lock().await;
        cache.remove(tag);
        match self.backend.delete(tag).await {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    }

    /// Number of nodes currently cached.
    pub async fn cached(&self) -> usize {
        self.cache.lock().await.len()
    }
}

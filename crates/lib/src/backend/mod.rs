//! Backing store capability.
//!
//! The `Backend` trait is the narrow, byte-oriented key/value interface the
//! document store persists CRDT nodes through. Records are keyed by node tag
//! and hold the node's encoded snapshot; the backend knows nothing about
//! their contents.
//!
//! Implementations must be `Send` and `Sync` so a document can be shared
//! across tasks, and implement `as_any` to allow downcasting (for example to
//! reach [`InMemory::save_to_file`] from a `Box<dyn Backend>`).

use std::any::Any;

use async_trait::async_trait;

use crate::Result;

mod errors;
mod in_memory;

pub use errors::BackendError;
pub use in_memory::InMemory;

/// Byte-addressed key/value store keyed by node tag.
#[async_trait]
pub trait Backend: Send + Sync + Any {
    /// Fetches the record stored under `tag`.
    ///
    /// # Errors
    /// Returns [`BackendError::NotFound`] if nothing is stored under `tag`.
    async fn get(&self, tag: &str) -> Result<Vec<u8>>;

    /// Stores `bytes` under `tag`, replacing any previous record.
    async fn set(&self, tag: &str, bytes: Vec<u8>) -> Result<()>;

    /// Removes the record stored under `tag`.
    ///
    /// # Errors
    /// Returns [`BackendError::NotFound`] if nothing is stored under `tag`.
    async fn delete(&self, tag: &str) -> Result<()>;

    /// Returns a reference to the backend as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

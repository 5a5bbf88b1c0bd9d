//!
//! Driftdoc: peer-to-peer, eventually-consistent shared JSON documents.
//!
//! Every peer holds a full replica of a tree-shaped JSON document and keeps it
//! in sync with its neighbours by trading compact hash-diff messages over any
//! message transport.
//!
//! ## Core Concepts
//!
//! * **Documents (`document::Document`)**: The path-based `get`/`set`/`delete`/`listen` API over one replica.
//! * **CRDTs (`crdt::Crdt`)**: The two node kinds a document is built from:
//!     * **Register (`crdt::Register`)**: A last-writer-wins cell holding one JSON scalar.
//!     * **OrMap (`crdt::OrMap`)**: An observed-remove map whose tombstones keep deleted children deleted.
//! * **Tags (`tag::Tag`)**: Globally unique, time-ordered node identifiers; the root map is always tag `"0"`.
//! * **Store (`store::Store`)**: A caching, serialized view of nodes over a pluggable byte-oriented **Backend (`backend::Backend`)**.
//! * **Sync (`sync::Network`)**: Tracks connected peers and runs the Merkle-style handshake: compare root
//!   hashes, then descend only into the children whose hashes differ.
//!
//! ```
//! use driftdoc::{Document, backend::InMemory, config::DocumentConfig};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> driftdoc::Result<()> {
//! let doc = Document::open(Box::new(InMemory::new()), DocumentConfig::default()).await?;
//! doc.set("todo.first", json!({"title": "write docs", "done": false})).await?;
//! assert_eq!(doc.get("todo.first.done").await?, Some(json!(false)));
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod clock;
pub mod codec;
pub mod config;
pub mod constants;
pub mod crdt;
pub mod document;
pub mod hash;
pub mod sorted;
pub mod store;
pub mod sync;
pub mod tag;

/// Re-export the `Document` struct for easier access.
pub use document::Document;

/// Re-export clock types.
pub use clock::{Clock, SystemClock};

#[cfg(any(test, feature = "testing"))]
pub use clock::FixedClock;

/// Result type used throughout the Driftdoc library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Driftdoc library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Structured decoding errors from the codec module
    #[error(transparent)]
    Codec(codec::CodecError),

    /// Structured storage errors from the backend module
    #[error(transparent)]
    Backend(backend::BackendError),

    /// Structured CRDT errors from the crdt module
    #[error(transparent)]
    CRDT(crdt::CRDTError),

    /// Structured peer and transport errors from the sync module
    #[error(transparent)]
    Sync(sync::SyncError),

    /// Structured errors from the document facade
    #[error(transparent)]
    Document(document::DocumentError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Serialize(_) => "serialize",
            Error::Codec(_) => "codec",
            Error::Backend(_) => "backend",
            Error::CRDT(_) => "crdt",
            Error::Sync(_) => "sync",
            Error::Document(_) => "document",
        }
    }

    /// Check if this error indicates a resource was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Backend(backend_err) => backend_err.is_not_found(),
            Error::Sync(sync_err) => sync_err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error means a peer or the local state broke the protocol.
    ///
    /// These abort the operation that hit them and must not be mistaken for
    /// ordinary not-found results.
    pub fn is_protocol_violation(&self) -> bool {
        match self {
            Error::Codec(_) => true,
            Error::CRDT(crdt_err) => crdt_err.is_protocol_violation(),
            _ => false,
        }
    }

    /// Check if the requested operation does not apply to its target.
    pub fn is_not_applicable(&self) -> bool {
        match self {
            Error::Document(document_err) => document_err.is_not_applicable(),
            _ => false,
        }
    }

    /// Check if this error is I/O related.
    pub fn is_io_error(&self) -> bool {
        match self {
            Error::Io(_) => true,
            Error::Backend(backend_err) => backend_err.is_io_error(),
            _ => false,
        }
    }

    /// Check if this error indicates a data integrity issue.
    pub fn is_integrity_error(&self) -> bool {
        match self {
            Error::Backend(backend_err) => backend_err.is_integrity_error(),
            _ => false,
        }
    }

    /// Check if this error is network-related.
    pub fn is_network_error(&self) -> bool {
        match self {
            Error::Sync(sync_err) => sync_err.is_network_error(),
            _ => false,
        }
    }

    /// Check if this error is CRDT-related.
    pub fn is_crdt_error(&self) -> bool {
        matches!(self, Error::CRDT(_))
    }
}

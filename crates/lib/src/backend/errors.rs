//! Backend error types.
//!
//! Not-found is a normal outcome for a key/value store and is kept distinct
//! from real failures so that callers can recover from it locally.

use thiserror::Error;

/// Errors that can occur during backend operations.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BackendError {
    /// No record stored under the given tag.
    #[error("Record not found: {tag}")]
    NotFound {
        /// The tag that was looked up
        tag: String,
    },

    /// Serialization of the persisted state failed.
    #[error("Serialization failed")]
    SerializationFailed {
        #[source]
        source: serde_json::Error,
    },

    /// Deserialization of the persisted state failed.
    #[error("Deserialization failed")]
    DeserializationFailed {
        #[source]
        source: serde_json::Error,
    },

    /// A persisted record was not valid base64.
    #[error("Corrupt record {tag}: {reason}")]
    CorruptRecord { tag: String, reason: String },

    /// File I/O error.
    #[error("File I/O error")]
    FileIo {
        #[source]
        source: std::io::Error,
    },
}

impl BackendError {
    /// Check if this error indicates a record was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound { .. })
    }

    /// Check if this error is I/O related.
    pub fn is_io_error(&self) -> bool {
        matches!(self, BackendError::FileIo { .. })
    }

    /// Check if this error indicates damaged persisted state.
    pub fn is_integrity_error(&self) -> bool {
        matches!(
            self,
            BackendError::CorruptRecord { .. } | BackendError::DeserializationFailed { .. }
        )
    }
}

impl From<BackendError> for crate::Error {
    fn from(err: BackendError) -> Self {
        crate::Error::Backend(err)
    }
}

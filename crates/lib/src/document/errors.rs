//! Error types for the document facade.

use thiserror::Error;

/// Requests the document rejects because they do not apply to their target.
#[non_exhaustive]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    /// The document always has a root.
    #[error("Cannot delete the document root")]
    RootNotDeletable,

    /// The root is a map; only objects and arrays can be written there.
    #[error("The document root can only hold an object or an array")]
    RootMustBeMap,
}

impl DocumentError {
    /// Check if the operation is not applicable to its target.
    pub fn is_not_applicable(&self) -> bool {
        matches!(
            self,
            DocumentError::RootNotDeletable | DocumentError::RootMustBeMap
        )
    }
}

impl From<DocumentError> for crate::Error {
    fn from(err: DocumentError) -> Self {
        crate::Error::Document(err)
    }
}

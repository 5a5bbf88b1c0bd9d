//! Error types for CRDT operations.
//!
//! These are invariant breaks inside the engine: an operation a variant
//! structurally cannot support, or a dangling child reference. They abort the
//! current operation and are never swallowed by the engine itself.

use thiserror::Error;

use crate::crdt::CrdtKind;

/// Structured error types for CRDT operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CRDTError {
    /// A register was asked to perform an operation on children.
    #[error("Register has no children: cannot {operation}")]
    NoChildren { operation: &'static str },

    /// A map was asked to replace a child it does not observe.
    #[error("No observed child with tag {tag}")]
    MissingChild { tag: String },

    /// An observed entry points at a tag that has no stored record.
    #[error("Observed child '{key}' points at missing record {tag}")]
    DanglingChild { key: String, tag: String },

    /// Two snapshots share a tag but disagree on the CRDT kind.
    #[error("CRDT kind mismatch for tag {tag}: local {local:?}, remote {remote:?}")]
    KindMismatch {
        tag: String,
        local: CrdtKind,
        remote: CrdtKind,
    },

    /// A register value could not be parsed back as JSON.
    #[error("Invalid register value for tag {tag}")]
    InvalidValue {
        tag: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CRDTError {
    /// Check if this error is an engine invariant violation.
    ///
    /// Every variant currently is; the helper exists so callers do not
    /// depend on that.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            CRDTError::NoChildren { .. }
                | CRDTError::MissingChild { .. }
                | CRDTError::DanglingChild { .. }
                | CRDTError::KindMismatch { .. }
                | CRDTError::InvalidValue { .. }
        )
    }

    /// Get the tag involved in this error, if any.
    pub fn tag(&self) -> Option<&str> {
        match self {
            CRDTError::MissingChild { tag }
            | CRDTError::DanglingChild { tag, .. }
            | CRDTError::KindMismatch { tag, .. }
            | CRDTError::InvalidValue { tag, .. } => Some(tag),
            _ => None,
        }
    }
}

// Conversion from CRDTError to the main Error type
impl From<CRDTError> for crate::Error {
    fn from(err: CRDTError) -> Self {
        crate::Error::CRDT(err)
    }
}

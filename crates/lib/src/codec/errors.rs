//! Error types for the binary codec.
//!
//! Every variant here is a protocol violation: the bytes did not follow the
//! wire or storage format, so the operation that was decoding them must abort.

use thiserror::Error;

/// Errors raised while decoding the length-prefixed binary format.
#[non_exhaustive]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The buffer ended before the value was complete.
    #[error("Unexpected end of input: needed {needed} bytes at offset {offset}")]
    UnexpectedEof { offset: usize, needed: usize },

    /// A varint used more bytes than a `u64` can hold.
    #[error("Varint overflow at offset {offset}")]
    VarIntOverflow { offset: usize },

    /// A string field was not valid UTF-8.
    #[error("Invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    /// The leading kind byte of a message is not a known message kind.
    #[error("Unknown message kind: {kind}")]
    UnknownMessageKind { kind: u8 },

    /// The leading kind byte of a CRDT snapshot is not a known CRDT kind.
    #[error("Unknown CRDT kind: {kind}")]
    UnknownCrdtKind { kind: u8 },

    /// `Children` messages were nested deeper than any document tree.
    #[error("Message nesting exceeds {limit} levels at offset {offset}")]
    NestingTooDeep { offset: usize, limit: usize },

    /// A register's value was not a serialized JSON scalar.
    #[error("Invalid register value at offset {offset}")]
    InvalidRegisterValue { offset: usize },

    /// Bytes were left over after a complete value was decoded.
    #[error("{count} trailing bytes after decoded value")]
    TrailingBytes { count: usize },
}

impl CodecError {
    /// Check if the input was truncated.
    pub fn is_truncated(&self) -> bool {
        matches!(self, CodecError::UnexpectedEof { .. })
    }

    /// Check if this error is an unknown message or CRDT kind.
    pub fn is_unknown_kind(&self) -> bool {
        matches!(
            self,
            CodecError::UnknownMessageKind { .. } | CodecError::UnknownCrdtKind { .. }
        )
    }
}

impl From<CodecError> for crate::Error {
    fn from(err: CodecError) -> Self {
        crate::Error::Codec(err)
    }
}

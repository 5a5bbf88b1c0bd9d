//! Error types for the synchronization module.

use thiserror::Error;

use super::peer_types::PeerId;

/// Errors that can occur during synchronization operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    /// An event or message referenced a peer that is not registered.
    #[error("Peer not found: {0}")]
    PeerNotFound(PeerId),

    /// A peer with this id is already registered.
    #[error("Peer already exists: {0}")]
    PeerAlreadyExists(PeerId),

    /// A transport refused an outgoing frame.
    #[error("Failed to send to {peer}: {reason}")]
    SendFailed { peer: PeerId, reason: String },

    /// The other end of an in-process link has gone away.
    #[error("Link to {peer} is closed")]
    LinkClosed { peer: PeerId },

    /// An in-process link kept producing frames past the round limit.
    #[error("Sync did not settle after {frames} frames")]
    NotSettled { frames: usize },
}

impl SyncError {
    /// Check if this is a not found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::PeerNotFound(_))
    }

    /// Check if this is a network/connection error.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            SyncError::SendFailed { .. } | SyncError::LinkClosed { .. }
        )
    }

    /// Check if this is a peer registry conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, SyncError::PeerAlreadyExists(_))
    }
}

impl From<SyncError> for crate::Error {
    fn from(err: SyncError) -> Self {
        crate::Error::Sync(err)
    }
}

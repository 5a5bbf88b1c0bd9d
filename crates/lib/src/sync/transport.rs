//! Peer transport capability.
//!
//! The coordinator never owns a connection. Outbound frames go through a
//! [`PeerTransport`], and whoever owns the connection reports inbound events
//! by calling [`Network::peer_opened`], [`Network::peer_message`] and
//! [`Network::peer_closed`]. WebSocket or WebRTC links plug in the same way
//! as the in-process [`ChannelTransport`] used by tests and the CLI demo.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::trace;

use super::Network;
use super::error::SyncError;
use super::peer_types::PeerId;
use super::protocol::Message;
use crate::Result;

/// Upper bound on frames a [`ChannelLink`] delivers in one `pump`.
const MAX_PUMP_FRAMES: usize = 100_000;

/// Outbound half of a link to one peer.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Sends one encoded frame to the peer.
    async fn send(&self, bytes: Vec<u8>) -> Result<()>;
}

/// Opens links to peers learned through discovery.
///
/// The coordinator calls this when a peer list names peers it is not
/// connected to, and hands it signaling messages addressed to this node.
#[async_trait]
pub trait PeerDialer: Send + Sync {
    /// Starts connecting to `peer`, signaling through the connected peer `via`.
    ///
    /// A returned transport is registered immediately; the dialer reports the
    /// link as open through [`Network::peer_opened`] once it is usable.
    async fn dial(&self, peer: &PeerId, via: &PeerId) -> Result<Option<Arc<dyn PeerTransport>>>;

    /// Handles a signaling message addressed to this node, received from `via`.
    async fn signal(&self, via: &PeerId, message: &Message) -> Result<()>;
}

/// Transport over an unbounded in-process channel.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    peer: PeerId,
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl ChannelTransport {
    /// Creates a transport to `peer` and the receiver its frames arrive on.
    pub fn channel(peer: PeerId) -> (Self, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { peer, tx }, rx)
    }

    pub fn peer(&self) -> &PeerId {
        &self.peer
    }
}

#[async_trait]
impl PeerTransport for ChannelTransport {
    async fn send(&self, bytes: Vec<u8>) -> Result<()> {
        self.tx.send(bytes).map_err(|_| {
            SyncError::LinkClosed {
                peer: self.peer.clone(),
            }
            .into()
        })
    }
}

/// Two coordinators joined by a pair of [`ChannelTransport`]s.
///
/// Frames queue up until [`ChannelLink::pump`] delivers them, which keeps
/// multi-peer tests deterministic.
pub struct ChannelLink {
    a: Network,
    b: Network,
    inbox_a: mpsc::UnboundedReceiver<Vec<u8>>,
    inbox_b: mpsc::UnboundedReceiver<Vec<u8>>,
}

/// Registers `a` and `b` with each other and opens the link on both sides.
pub async fn connect_pair(a: &Network, b: &Network) -> Result<ChannelLink> {
    let (to_b, inbox_b) = ChannelTransport::channel(b.peer_id().clone());
    let (to_a, inbox_a) = ChannelTransport::channel(a.peer_id().clone());
    a.add_peer(b.peer_id().clone(), Arc::new(to_b)).await?;
    b.add_peer(a.peer_id().clone(), Arc::new(to_a)).await?;
    a.peer_opened(b.peer_id()).await?;
    b.peer_opened(a.peer_id()).await?;
    Ok(ChannelLink {
        a: a.clone(),
        b: b.clone(),
        inbox_a,
        inbox_b,
    })
}

impl ChannelLink {
    /// Delivers queued frames in both directions until neither side has
    /// anything left to say. Returns the number of frames delivered.
    pub async fn pump(&mut self) -> Result<usize> {
        let mut frames = 0;
        loop {
            let mut progressed = false;
            while let Ok(bytes) = self.inbox_b.try_recv() {
                trace!(from = %self.a.peer_id(), to = %self.b.peer_id(), len = bytes.len(), "delivering frame");
                self.b.peer_message(self.a.peer_id(), &bytes).await?;
                frames += 1;
                progressed = true;
            }
            while let Ok(bytes) = self.inbox_a.try_recv() {
                trace!(from = %self.b.peer_id(), to = %self.a.peer_id(), len = bytes.len(), "delivering frame");
                self.a.peer_message(self.b.peer_id(), &bytes).await?;
                frames += 1;
                progressed = true;
            }
            if !progressed {
                return Ok(frames);
            }
            if frames > MAX_PUMP_FRAMES {
                return Err(SyncError::NotSettled { frames }.into());
            }
        }
    }

    /// The two ends of the link.
    pub fn ends(&self) -> (&Network, &Network) {
        (&self.a, &self.b)
    }

    /// Reports the link as closed on both sides.
    pub async fn close(self) -> Result<()> {
        self.a.peer_closed(self.b.peer_id()).await?;
        self.b.peer_closed(self.a.peer_id()).await
    }
}

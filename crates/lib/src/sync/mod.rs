//! Synchronization between replicas of a document.
//!
//! The [`Network`] coordinator keeps the set of connected peers and runs the
//! hash-diff handshake with each of them:
//!
//! 1. Whenever the local root hash changes, a `Get(rootHash)` goes to every
//!    idle peer, and that peer becomes busy.
//! 2. Tree messages (`Get`, `Push`, `Children`) from a peer are answered by
//!    the document. An empty answer ends the round with `Done`.
//! 3. `Done` marks the peer idle again. If the root changed while the round
//!    was running, the latest root `Get` goes out right away.
//!
//! When a link opens, the side with the larger peer id starts the first
//! round, and both sides swap peer lists for mesh discovery. Signaling
//! messages for other peers are relayed verbatim.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::codec::{Decode, Encode};
use crate::config::NetworkConfig;
use crate::document::Document;
use crate::Result;

pub mod error;
pub mod hooks;
pub mod peer_types;
pub mod protocol;
pub mod transport;

pub use error::SyncError;
pub use hooks::{RootChangeContext, RootChangeHook, RootChangeHookCollection};
pub use peer_types::{PeerId, PeerInfo};
pub use protocol::{Message, MessageKind, Relay};
pub use transport::{ChannelLink, ChannelTransport, PeerDialer, PeerTransport, connect_pair};

/// Connection bookkeeping shared by the coordinator and its root hook.
#[derive(Default)]
struct PeerTable {
    peers: BTreeMap<PeerId, Arc<dyn PeerTransport>>,
    /// Peers currently in a sync round with us.
    busy: HashSet<PeerId>,
    /// Busy peers that missed a root broadcast.
    pending: HashSet<PeerId>,
    /// The latest root `Get`, sent to every peer that becomes available.
    root_get: Option<Vec<u8>>,
}

/// State of the coordinator that does not depend on the document.
///
/// The document holds this as a [`RootChangeHook`]; it never points back at
/// the document.
struct NetworkState {
    id: PeerId,
    config: NetworkConfig,
    table: Mutex<PeerTable>,
    dialer: RwLock<Option<Arc<dyn PeerDialer>>>,
}

impl NetworkState {
    /// Sends `message` to every idle peer and remembers it for new peers.
    async fn broadcast(&self, message: &Message) -> Result<()> {
        let bytes = message.encode();
        let targets: Vec<(PeerId, Arc<dyn PeerTransport>)> = {
            let mut table = self.table.lock().await;
            table.root_get = Some(bytes.clone());
            let PeerTable {
                peers,
                busy,
                pending,
                ..
            } = &mut *table;
            let mut targets = Vec::new();
            for (id, transport) in peers.iter() {
                if busy.insert(id.clone()) {
                    targets.push((id.clone(), transport.clone()));
                } else {
                    pending.insert(id.clone());
                }
            }
            targets
        };

        for (id, transport) in targets {
            if let Err(e) = transport.send(bytes.clone()).await {
                warn!(peer = %id, "failed to send broadcast: {e}");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RootChangeHook for NetworkState {
    async fn on_root_changed(&self, context: &RootChangeContext) -> Result<()> {
        self.broadcast(&Message::Get {
            hash: context.hash.clone(),
        })
        .await
    }
}

/// Sync coordinator for one document.
///
/// `Network` is a cheap-to-clone handle.
#[derive(Clone)]
pub struct Network {
    document: Document,
    state: Arc<NetworkState>,
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("id", &self.state.id)
            .field("config", &self.state.config)
            .finish_non_exhaustive()
    }
}

impl Network {
    /// Creates a coordinator using the document's network configuration.
    pub async fn new(document: Document) -> Result<Self> {
        let config = document.config().network.clone();
        Self::with_config(document, config).await
    }

    /// Creates a coordinator with an explicit configuration.
    ///
    /// Without a configured `peer_id`, a fresh unique id is generated.
    pub async fn with_config(document: Document, config: NetworkConfig) -> Result<Self> {
        let id = match &config.peer_id {
            Some(id) => PeerId::new(id.as_str()),
            None => PeerId::new(document.new_unique_id()),
        };
        let state = Arc::new(NetworkState {
            id,
            config,
            table: Mutex::new(PeerTable::default()),
            dialer: RwLock::new(None),
        });
        document.add_root_hook(state.clone());

        let network = Self { document, state };
        let hash = network.document.root_hash().await?;
        network.broadcast(&Message::Get { hash }).await?;
        Ok(network)
    }

    /// This node's peer id.
    pub fn peer_id(&self) -> &PeerId {
        &self.state.id
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.state.config
    }

    /// Installs the dialer used to act on peer lists and signaling.
    pub async fn set_dialer(&self, dialer: Arc<dyn PeerDialer>) {
        *self.state.dialer.write().await = Some(dialer);
    }

    /// Sends `message` to every idle peer, marking them busy.
    pub async fn broadcast(&self, message: &Message) -> Result<()> {
        self.state.broadcast(message).await
    }

    /// Registers a peer. The link is not used until [`Network::peer_opened`].
    pub async fn add_peer(&self, id: PeerId, transport: Arc<dyn PeerTransport>) -> Result<()> {
        let mut table = self.state.table.lock().await;
        if table.peers.contains_key(&id) {
            return Err(SyncError::PeerAlreadyExists(id).into());
        }
        debug!(peer = %id, "registered peer");
        table.peers.insert(id, transport);
        Ok(())
    }

    /// Connected peers, in id order.
    pub async fn peers(&self) -> Vec<PeerInfo> {
        let table = self.state.table.lock().await;
        table
            .peers
            .keys()
            .map(|id| PeerInfo {
                id: id.clone(),
                busy: table.busy.contains(id),
            })
            .collect()
    }

    /// Whether a sync round with `peer` is in progress.
    pub async fn is_busy(&self, peer: &PeerId) -> bool {
        self.state.table.lock().await.busy.contains(peer)
    }

    async fn transport(&self, peer: &PeerId) -> Result<Arc<dyn PeerTransport>> {
        self.state
            .table
            .lock()
            .await
            .peers
            .get(peer)
            .cloned()
            .ok_or_else(|| SyncError::PeerNotFound(peer.clone()).into())
    }

    async fn peer_list(&self) -> Message {
        Message::Peers {
            peers: self.state.table.lock().await.peers.keys().cloned().collect(),
        }
    }

    /// Ends the sync round with `peer`, returning a root `Get` it missed.
    async fn finish_round(&self, peer: &PeerId) -> Option<Vec<u8>> {
        let mut table = self.state.table.lock().await;
        table.busy.remove(peer);
        if table.pending.remove(peer) && table.peers.contains_key(peer) {
            let root_get = table.root_get.clone()?;
            table.busy.insert(peer.clone());
            return Some(root_get);
        }
        None
    }

    async fn resume(&self, peer: &PeerId) -> Result<()> {
        if let Some(root_get) = self.finish_round(peer).await {
            debug!(%peer, "resending root hash missed during sync round");
            self.transport(peer).await?.send(root_get).await?;
        }
        Ok(())
    }

    /// Handles a link to `peer` becoming usable.
    pub async fn peer_opened(&self, peer: &PeerId) -> Result<()> {
        let transport = self.transport(peer).await?;
        info!(%peer, "peer connected");

        if self.state.id > *peer {
            let root_get = {
                let mut table = self.state.table.lock().await;
                let root_get = table.root_get.clone();
                if root_get.is_some() {
                    table.busy.insert(peer.clone());
                }
                root_get
            };
            if let Some(root_get) = root_get {
                transport.send(root_get).await?;
            }
        }

        transport.send(self.peer_list().await.encode()).await
    }

    /// Handles the link to `peer` going away.
    pub async fn peer_closed(&self, peer: &PeerId) -> Result<()> {
        let remaining: Vec<(PeerId, Arc<dyn PeerTransport>)> = {
            let mut table = self.state.table.lock().await;
            table.peers.remove(peer);
            table.busy.remove(peer);
            table.pending.remove(peer);
            table
                .peers
                .iter()
                .map(|(id, t)| (id.clone(), t.clone()))
                .collect()
        };
        info!(%peer, remaining = remaining.len(), "peer disconnected");

        if self.state.config.discovery && remaining.len() < self.state.config.low_water_mark {
            let list = Message::Peers {
                peers: remaining.iter().map(|(id, _)| id.clone()).collect(),
            }
            .encode();
            for (id, transport) in remaining {
                if let Err(e) = transport.send(list.clone()).await {
                    warn!(peer = %id, "failed to send peer list: {e}");
                }
            }
        }
        Ok(())
    }

    /// Handles one frame received from `from`.
    pub async fn peer_message(&self, from: &PeerId, bytes: &[u8]) -> Result<()> {
        let message = Message::decode(bytes)?;
        match &message {
            Message::Done => self.resume(from).await,
            Message::Get { .. } | Message::Push { .. } | Message::Children { .. } => {
                self.handle_tree_message(from, &message).await
            }
            Message::Peers { peers } => self.handle_peer_list(from, peers).await,
            Message::SdpOffer(relay) | Message::SdpAnswer(relay) | Message::IceCandidate(relay) => {
                if relay.to == self.state.id {
                    self.handle_signal(from, &message).await
                } else {
                    self.relay(from, &relay.to, bytes).await
                }
            }
        }
    }

    async fn handle_tree_message(&self, from: &PeerId, message: &Message) -> Result<()> {
        let transport = {
            let mut table = self.state.table.lock().await;
            let transport = table
                .peers
                .get(from)
                .cloned()
                .ok_or_else(|| SyncError::PeerNotFound(from.clone()))?;
            table.busy.insert(from.clone());
            transport
        };

        match self.document.handle_message(message).await {
            Ok(Some(answer)) => transport.send(answer.encode()).await,
            Ok(None) => {
                transport.send(Message::Done.encode()).await?;
                self.resume(from).await
            }
            Err(e) => {
                warn!(peer = %from, kind = ?message.kind(), "failed to apply sync message: {e}");
                self.state.table.lock().await.busy.remove(from);
                if let Err(send_err) = transport.send(Message::Done.encode()).await {
                    warn!(peer = %from, "failed to end sync round: {send_err}");
                }
                Err(e)
            }
        }
    }

    async fn handle_peer_list(&self, from: &PeerId, peers: &[PeerId]) -> Result<()> {
        if !self.state.config.discovery {
            return Ok(());
        }
        let Some(dialer) = self.state.dialer.read().await.clone() else {
            debug!(peer = %from, "no dialer installed; ignoring peer list");
            return Ok(());
        };
        let unknown: Vec<PeerId> = {
            let table = self.state.table.lock().await;
            if table.peers.len() >= self.state.config.low_water_mark {
                return Ok(());
            }
            peers
                .iter()
                .filter(|p| **p != self.state.id && !p.is_empty() && !table.peers.contains_key(*p))
                .cloned()
                .collect()
        };

        for peer in unknown {
            debug!(%peer, via = %from, "dialing discovered peer");
            if let Some(transport) = dialer.dial(&peer, from).await? {
                self.add_peer(peer, transport).await?;
            }
        }
        Ok(())
    }

    async fn handle_signal(&self, from: &PeerId, message: &Message) -> Result<()> {
        if !self.state.config.discovery {
            return Ok(());
        }
        let dialer = self.state.dialer.read().await.clone();
        match dialer {
            Some(dialer) => dialer.signal(from, message).await,
            None => {
                debug!(peer = %from, kind = ?message.kind(), "no dialer installed; dropping signal");
                Ok(())
            }
        }
    }

    async fn relay(&self, from: &PeerId, to: &PeerId, bytes: &[u8]) -> Result<()> {
        let transport = self.state.table.lock().await.peers.get(to).cloned();
        match transport {
            Some(transport) => transport.send(bytes.to_vec()).await,
            None => {
                debug!(%from, %to, "dropping relay for unknown peer");
                Ok(())
            }
        }
    }
}

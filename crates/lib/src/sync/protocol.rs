//! Protocol definitions for sync communication.
//!
//! Every frame exchanged between peers is one [`Message`]: a kind byte
//! followed by kind-specific fields in the shared binary codec. The messages
//! fall into two groups:
//!
//! - tree messages (`Get`, `Push`, `Children`, `Done`), which carry the
//!   hash-diff handshake between two replicas of a document
//! - mesh messages (`Peers` and the three relay kinds), which support peer
//!   discovery and the signaling needed to open new direct links

use std::collections::BTreeMap;

use crate::codec::{CodecError, CodecResult, Decode, Encode, Reader, Writer};
use crate::constants::MAX_MESSAGE_DEPTH;
use crate::crdt::RemovedItem;
use crate::sync::peer_types::PeerId;
use crate::tag::Tag;

/// One-byte discriminant at the start of every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    Done = 1,
    Get = 2,
    Push = 3,
    Children = 4,
    Peers = 10,
    SdpOffer = 11,
    SdpAnswer = 12,
    IceCandidate = 13,
}

impl TryFrom<u8> for MessageKind {
    type Error = CodecError;

    fn try_from(kind: u8) -> CodecResult<Self> {
        Ok(match kind {
            1 => MessageKind::Done,
            2 => MessageKind::Get,
            3 => MessageKind::Push,
            4 => MessageKind::Children,
            10 => MessageKind::Peers,
            11 => MessageKind::SdpOffer,
            12 => MessageKind::SdpAnswer,
            13 => MessageKind::IceCandidate,
            kind => return Err(CodecError::UnknownMessageKind { kind }),
        })
    }
}

/// Signaling payload addressed from one peer to another.
///
/// Intermediate peers forward relays verbatim; only the addressee looks at
/// `payload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relay {
    pub from: PeerId,
    pub to: PeerId,
    pub payload: String,
}

impl Relay {
    pub fn new(from: impl Into<PeerId>, to: impl Into<PeerId>, payload: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            payload: payload.into(),
        }
    }
}

/// A protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Ends a sync round: the sender has nothing further to say.
    Done,
    /// Asks for the receiver's state if its hash differs from `hash`.
    Get { hash: String },
    /// Carries one encoded CRDT snapshot.
    Push { crdt: Vec<u8> },
    /// Per-child messages for the map `tag`, plus tombstones the receiver lacks.
    Children {
        tag: Tag,
        removed: Vec<RemovedItem>,
        children: BTreeMap<String, Message>,
    },
    /// The sender's currently connected peers.
    Peers { peers: Vec<PeerId> },
    SdpOffer(Relay),
    SdpAnswer(Relay),
    IceCandidate(Relay),
}

impl Message {
    /// A `Get` that no hash matches, so it is always answered with a `Push`.
    pub fn get_any() -> Self {
        Message::Get {
            hash: String::new(),
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Done => MessageKind::Done,
            Message::Get { .. } => MessageKind::Get,
            Message::Push { .. } => MessageKind::Push,
            Message::Children { .. } => MessageKind::Children,
            Message::Peers { .. } => MessageKind::Peers,
            Message::SdpOffer(_) => MessageKind::SdpOffer,
            Message::SdpAnswer(_) => MessageKind::SdpAnswer,
            Message::IceCandidate(_) => MessageKind::IceCandidate,
        }
    }
}

impl Encode for Message {
    fn encode_to(&self, writer: &mut Writer) {
        writer.write_byte(self.kind() as u8);
        match self {
            Message::Done => {}
            Message::Get { hash } => writer.write_string(hash),
            Message::Push { crdt } => writer.write_bytes(crdt),
            Message::Children {
                tag,
                removed,
                children,
            } => {
                writer.write_string(tag.as_str());
                writer.write_len(removed.len());
                for item in removed {
                    item.encode_to(writer);
                }
                writer.write_len(children.len());
                for (key, message) in children {
                    writer.write_string(key);
                    message.encode_to(writer);
                }
            }
            Message::Peers { peers } => {
                writer.write_len(peers.len());
                for peer in peers {
                    writer.write_string(peer.as_str());
                }
            }
            Message::SdpOffer(relay) | Message::SdpAnswer(relay) | Message::IceCandidate(relay) => {
                writer.write_string(relay.from.as_str());
                writer.write_string(relay.to.as_str());
                writer.write_string(&relay.payload);
            }
        }
    }
}

impl Decode for Message {
    fn decode_from(reader: &mut Reader<'_>) -> CodecResult<Self> {
        Message::decode_nested(reader, 0)
    }
}

impl Message {
    /// Decodes a message found `depth` levels down inside `Children`.
    fn decode_nested(reader: &mut Reader<'_>, depth: usize) -> CodecResult<Self> {
        if depth > MAX_MESSAGE_DEPTH {
            return Err(CodecError::NestingTooDeep {
                offset: reader.position(),
                limit: MAX_MESSAGE_DEPTH,
            });
        }
        let kind = MessageKind::try_from(reader.read_byte()?)?;
        Ok(match kind {
            MessageKind::Done => Message::Done,
            MessageKind::Get => Message::Get {
                hash: reader.read_string()?,
            },
            MessageKind::Push => Message::Push {
                crdt: reader.read_bytes()?.to_vec(),
            },
            MessageKind::Children => {
                let tag = Tag::new(reader.read_string()?);
                let removed_len = reader.read_len()?;
                let mut removed = Vec::with_capacity(removed_len);
                for _ in 0..removed_len {
                    removed.push(RemovedItem::decode_from(reader)?);
                }
                let children_len = reader.read_len()?;
                let mut children = BTreeMap::new();
                for _ in 0..children_len {
                    let key = reader.read_string()?;
                    let message = Message::decode_nested(reader, depth + 1)?;
                    children.insert(key, message);
                }
                Message::Children {
                    tag,
                    removed,
                    children,
                }
            }
            MessageKind::Peers => {
                let len = reader.read_len()?;
                let mut peers = Vec::with_capacity(len);
                for _ in 0..len {
                    peers.push(PeerId::new(reader.read_string()?));
                }
                Message::Peers { peers }
            }
            MessageKind::SdpOffer | MessageKind::SdpAnswer | MessageKind::IceCandidate => {
                let relay = Relay {
                    from: PeerId::new(reader.read_string()?),
                    to: PeerId::new(reader.read_string()?),
                    payload: reader.read_string()?,
                };
                match kind {
                    MessageKind::SdpOffer => Message::SdpOffer(relay),
                    MessageKind::SdpAnswer => Message::SdpAnswer(relay),
                    _ => Message::IceCandidate(relay),
                }
            }
        })
    }
}

//! Last-writer-wins register.

use std::cmp::Ordering;

use serde_json::Value;
use tracing::trace;

use super::{CRDTError, CrdtKind, NodeContext, encode_header, is_scalar};
use crate::Result;
use crate::codec::{CodecError, CodecResult, Encode, Reader, Writer};
use crate::hash::Hasher;
use crate::sync::protocol::Message;
use crate::tag::Tag;

/// A JSON scalar plus the timestamp of the write that produced it.
///
/// The value is kept in its serialized form; that string is what gets
/// hashed, stored and sent over the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Register {
    tag: Tag,
    hash: String,
    timestamp: String,
    value: String,
}

impl Register {
    /// Creates a register holding the serialized JSON `value`.
    pub fn new(tag: Tag, timestamp: String, value: String) -> Self {
        let mut register = Self {
            tag,
            hash: String::new(),
            timestamp,
            value,
        };
        register.recompute_hash();
        register
    }

    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// The value as serialized JSON.
    pub fn value_json(&self) -> &str {
        &self.value
    }

    pub fn recompute_hash(&mut self) {
        self.hash = Hasher::new()
            .update(&self.timestamp)
            .update(&self.value)
            .finish();
    }

    pub(crate) fn read(&self) -> Result<Value> {
        serde_json::from_str(&self.value).map_err(|source| {
            CRDTError::InvalidValue {
                tag: self.tag.to_string(),
                source,
            }
            .into()
        })
    }

    /// Stores a new scalar, stamping it with the current time.
    ///
    /// Writing the value already held changes nothing.
    pub(crate) async fn write(
        &mut self,
        ctx: &NodeContext,
        value: &Value,
        node_path: &str,
    ) -> Result<()> {
        let json = serde_json::to_string(value)?;
        if json == self.value {
            return Ok(());
        }
        self.timestamp = ctx.tags().now();
        self.value = json;
        self.recompute_hash();
        ctx.save(self.clone().into(), node_path).await
    }

    /// Last-writer-wins merge.
    ///
    /// The later timestamp wins; equal timestamps go to the larger hash so
    /// both sides pick the same value whichever way the exchange runs. When
    /// the local state wins but differs, it is pushed back to the sender.
    pub(crate) async fn merge(
        &mut self,
        ctx: &NodeContext,
        remote: Register,
        node_path: &str,
    ) -> Result<Option<Message>> {
        let remote_wins = match remote.timestamp.cmp(&self.timestamp) {
            Ordering::Greater => true,
            Ordering::Equal => remote.hash > self.hash,
            Ordering::Less => false,
        };

        if remote_wins {
            trace!(tag = %self.tag, path = node_path, "adopting remote register value");
            self.timestamp = remote.timestamp;
            self.value = remote.value;
            self.recompute_hash();
            ctx.save(self.clone().into(), node_path).await?;
            Ok(None)
        } else if remote.value != self.value || remote.timestamp != self.timestamp {
            Ok(Some(Message::Push {
                crdt: self.encode(),
            }))
        } else {
            Ok(None)
        }
    }

    pub(crate) fn decode_fields(
        tag: Tag,
        hash: String,
        reader: &mut Reader<'_>,
    ) -> CodecResult<Self> {
        let timestamp = reader.read_string()?;
        let offset = reader.position();
        let value = reader.read_string()?;
        match serde_json::from_str::<Value>(&value) {
            Ok(parsed) if is_scalar(&parsed) => {}
            _ => return Err(CodecError::InvalidRegisterValue { offset }),
        }
        Ok(Self {
            tag,
            hash,
            timestamp,
            value,
        })
    }
}

impl Encode for Register {
    fn encode_to(&self, writer: &mut Writer) {
        encode_header(writer, CrdtKind::Register, &self.tag, &self.hash);
        writer.write_string(&self.timestamp);
        writer.write_string(&self.value);
    }
}

//! Conflict-free Replicated Data Types for the shared document tree.
//!
//! A document is a tree of two node kinds:
//!
//! - [`Register`] - a last-writer-wins cell holding one JSON scalar
//! - [`OrMap`] - an observed-remove map from keys to child nodes, keeping a
//!   tombstone for every child tag it ever removed
//!
//! Nodes never point at their parents. Every node lives in the
//! [`Store`](crate::store::Store) keyed by its [`Tag`], and a map only records
//! `(key, child tag, child hash)` for each live child. Operations walk the
//! tree top-down carrying the dotted path of the node they are visiting, and a
//! parent rebinds its entry whenever a child is replaced by a node of another
//! kind.
//!
//! Synchronization is driven through [`Crdt::handle`], which answers the
//! `Get`/`Push`/`Children` messages of the sync protocol and returns the
//! response to send back, if any.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tracing::debug;

use crate::codec::{CodecError, CodecResult, Decode, Encode, Reader, Writer};
use crate::store::Store;
use crate::sync::protocol::Message;
use crate::tag::{Tag, TagGenerator};
use crate::Result;

pub mod errors;
mod map;
mod register;

pub use errors::CRDTError;
pub use map::{ObservedItem, OrMap, RemovedItem};
pub use register::Register;

/// Boxed future returned by the recursive tree operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Wire discriminant of a CRDT snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CrdtKind {
    Register = 1,
    Map = 2,
}

impl TryFrom<u8> for CrdtKind {
    type Error = CodecError;

    fn try_from(kind: u8) -> CodecResult<Self> {
        match kind {
            1 => Ok(CrdtKind::Register),
            2 => Ok(CrdtKind::Map),
            kind => Err(CodecError::UnknownCrdtKind { kind }),
        }
    }
}

/// Returns the dotted path of child `key` beneath the node at `parent`.
pub fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

/// True for JSON values stored in a register rather than a map.
pub(crate) fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}

/// Everything a tree operation needs besides the node itself.
///
/// A context lives for one top-level operation. It records the path of every
/// node persisted or removed along the way, so that change notifications can
/// be delivered once the whole operation has landed.
#[derive(Debug)]
pub struct NodeContext {
    store: Arc<Store>,
    tags: TagGenerator,
    changed: Mutex<Vec<String>>,
}

impl NodeContext {
    pub fn new(store: Arc<Store>, tags: TagGenerator) -> Self {
        Self {
            store,
            tags,
            changed: Mutex::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn tags(&self) -> &TagGenerator {
        &self.tags
    }

    /// Persists `node` and records `node_path` as changed.
    pub(crate) async fn save(&self, node: Crdt, node_path: &str) -> Result<()> {
        self.store.set(node).await?;
        self.mark_changed(node_path);
        Ok(())
    }

    /// Removes the record for `tag` and records `node_path` as changed.
    pub(crate) async fn remove(&self, tag: &Tag, node_path: &str) -> Result<()> {
        self.store.del(tag).await?;
        self.mark_changed(node_path);
        Ok(())
    }

    /// Loads the child an observed entry points at.
    pub(crate) async fn load_child(&self, item: &ObservedItem) -> Result<Crdt> {
        self.store.get(&item.tag).await?.ok_or_else(|| {
            CRDTError::DanglingChild {
                key: item.key.clone(),
                tag: item.tag.to_string(),
            }
            .into()
        })
    }

    fn mark_changed(&self, node_path: &str) {
        let mut changed = self.changed.lock().unwrap_or_else(PoisonError::into_inner);
        if !changed.iter().any(|p| p == node_path) {
            changed.push(node_path.to_string());
        }
    }

    /// Drains the changed paths, in the order they were first touched.
    pub fn take_changes(&self) -> Vec<String> {
        std::mem::take(&mut *self.changed.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// A node of the document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Crdt {
    Register(Register),
    Map(OrMap),
}

impl From<Register> for Crdt {
    fn from(register: Register) -> Self {
        Crdt::Register(register)
    }
}

impl From<OrMap> for Crdt {
    fn from(map: OrMap) -> Self {
        Crdt::Map(map)
    }
}

impl Crdt {
    pub fn kind(&self) -> CrdtKind {
        match self {
            Crdt::Register(_) => CrdtKind::Register,
            Crdt::Map(_) => CrdtKind::Map,
        }
    }

    pub fn tag(&self) -> &Tag {
        match self {
            Crdt::Register(r) => r.tag(),
            Crdt::Map(m) => m.tag(),
        }
    }

    pub fn hash(&self) -> &str {
        match self {
            Crdt::Register(r) => r.hash(),
            Crdt::Map(m) => m.hash(),
        }
    }

    /// Re-derives the hash from the node's current state.
    pub fn recompute_hash(&mut self) {
        match self {
            Crdt::Register(r) => r.recompute_hash(),
            Crdt::Map(m) => m.recompute_hash(),
        }
    }

    /// The local node a remote snapshot is adopted into.
    ///
    /// Registers are copied whole. Maps start empty under the remote tag and
    /// fill in through the merge that follows, one level at a time.
    pub(crate) fn seed_from(remote: Crdt) -> Crdt {
        match remote {
            Crdt::Register(r) => {
                Register::new(r.tag().clone(), r.timestamp().to_string(), r.value_json().to_string())
                    .into()
            }
            Crdt::Map(m) => OrMap::new(m.tag().clone()).into(),
        }
    }

    /// Reads the JSON value at `path` below this node.
    ///
    /// Returns `None` when nothing lives at `path`.
    pub fn read<'a>(
        &'a self,
        ctx: &'a NodeContext,
        path: &'a [String],
    ) -> BoxFuture<'a, Result<Option<Value>>> {
        Box::pin(async move {
            match self {
                Crdt::Register(r) if path.is_empty() => r.read().map(Some),
                Crdt::Register(_) => Ok(None),
                Crdt::Map(m) => m.read(ctx, path).await,
            }
        })
    }

    /// Writes `value` at `path` below this node, returning the resulting node.
    ///
    /// The result has a different tag when the write changed the node's
    /// kind; the caller must rebind its reference to it.
    pub fn write<'a>(
        self,
        ctx: &'a NodeContext,
        value: &'a Value,
        path: &'a [String],
        node_path: &'a str,
    ) -> BoxFuture<'a, Result<Crdt>> {
        Box::pin(async move {
            match self {
                Crdt::Register(mut r) if path.is_empty() && is_scalar(value) => {
                    r.write(ctx, value, node_path).await?;
                    Ok(Crdt::Register(r))
                }
                Crdt::Register(r) => {
                    debug!(tag = %r.tag(), path = node_path, "converting register to map");
                    ctx.store().del(r.tag()).await?;
                    OrMap::new(ctx.tags().generate())
                        .write(ctx, value, path, node_path)
                        .await
                }
                Crdt::Map(m) => m.write(ctx, value, path, node_path).await,
            }
        })
    }

    /// Deletes the node at `path` below this node.
    ///
    /// An empty `path` deletes this node's own records (and, for a map, its
    /// whole subtree). Missing paths are a no-op.
    pub fn delete<'a>(
        &'a mut self,
        ctx: &'a NodeContext,
        path: &'a [String],
        node_path: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            match self {
                Crdt::Register(r) if path.is_empty() => ctx.remove(r.tag(), node_path).await,
                Crdt::Register(_) => Ok(()),
                Crdt::Map(m) => m.delete(ctx, path, node_path).await,
            }
        })
    }

    /// Deletes the child with `tag` and tombstones it.
    ///
    /// Returns false if no live child has that tag.
    pub async fn delete_child_by_tag(
        &mut self,
        ctx: &NodeContext,
        tag: &Tag,
        node_path: &str,
    ) -> Result<bool> {
        match self {
            Crdt::Register(_) => Err(CRDTError::NoChildren {
                operation: "delete a child by tag",
            }
            .into()),
            Crdt::Map(m) => m.delete_child_by_tag(ctx, tag, node_path).await,
        }
    }

    /// Points the child entry for `old` at `new_node`, tombstoning `old`.
    pub async fn replace_child(
        &mut self,
        ctx: &NodeContext,
        old: &Tag,
        new_node: &Crdt,
        node_path: &str,
    ) -> Result<()> {
        match self {
            Crdt::Register(_) => Err(CRDTError::NoChildren {
                operation: "replace a child",
            }
            .into()),
            Crdt::Map(m) => m.replace_child(ctx, old, new_node, node_path).await,
        }
    }

    /// Answers one sync message addressed to this node.
    pub fn handle<'a>(
        &'a mut self,
        ctx: &'a NodeContext,
        message: &'a Message,
        node_path: &'a str,
    ) -> BoxFuture<'a, Result<Option<Message>>> {
        Box::pin(async move {
            match message {
                Message::Get { hash } => Ok((hash != self.hash()).then(|| Message::Push {
                    crdt: self.encode(),
                })),
                Message::Push { crdt } => {
                    let remote = Crdt::decode(crdt)?;
                    if remote.tag() != self.tag() {
                        debug!(
                            local = %self.tag(),
                            remote = %remote.tag(),
                            path = node_path,
                            "ignoring push for another tag"
                        );
                        return Ok(None);
                    }
                    self.merge(ctx, remote, node_path).await
                }
                Message::Children {
                    tag,
                    removed,
                    children,
                } => {
                    if let Crdt::Map(m) = self
                        && tag == m.tag()
                    {
                        return m.handle_children(ctx, removed, children, node_path).await;
                    }
                    debug!(
                        local = %self.tag(),
                        remote = %tag,
                        path = node_path,
                        "ignoring stale children message"
                    );
                    Ok(None)
                }
                other => {
                    debug!(kind = ?other.kind(), "message is not addressed to the document tree");
                    Ok(None)
                }
            }
        })
    }

    /// Merges a remote snapshot carrying the same tag into this node.
    pub async fn merge(
        &mut self,
        ctx: &NodeContext,
        remote: Crdt,
        node_path: &str,
    ) -> Result<Option<Message>> {
        match (self, remote) {
            (Crdt::Register(local), Crdt::Register(remote)) => {
                local.merge(ctx, remote, node_path).await
            }
            (Crdt::Map(local), Crdt::Map(remote)) => local.merge(ctx, remote, node_path).await,
            (local, remote) => Err(CRDTError::KindMismatch {
                tag: local.tag().to_string(),
                local: local.kind(),
                remote: remote.kind(),
            }
            .into()),
        }
    }
}

impl Encode for Crdt {
    fn encode_to(&self, writer: &mut Writer) {
        match self {
            Crdt::Register(r) => r.encode_to(writer),
            Crdt::Map(m) => m.encode_to(writer),
        }
    }
}

impl Decode for Crdt {
    fn decode_from(reader: &mut Reader<'_>) -> CodecResult<Self> {
        let kind = CrdtKind::try_from(reader.read_byte()?)?;
        let tag = Tag::new(reader.read_string()?);
        let hash = reader.read_string()?;
        Ok(match kind {
            CrdtKind::Register => Register::decode_fields(tag, hash, reader)?.into(),
            CrdtKind::Map => OrMap::decode_fields(tag, hash, reader)?.into(),
        })
    }
}

/// Writes the header shared by every CRDT snapshot.
fn encode_header(writer: &mut Writer, kind: CrdtKind, tag: &Tag, hash: &str) {
    writer.write_byte(kind as u8);
    writer.write_string(tag.as_str());
    writer.write_string(hash);
}

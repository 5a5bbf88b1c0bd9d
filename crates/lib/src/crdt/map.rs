//! Observed-remove map.
//!
//! A map keeps two sorted lists: the live children it observes, sorted by
//! key, and a tombstone for every child tag it ever removed, sorted by tag.
//! Tombstones are never dropped. A tag that appears in `removed` never comes
//! back into `observed`, which is what keeps deleted children from being
//! resurrected by late or replayed messages.
//!
//! Synchronization compares two maps with a merge-join over their sorted
//! `observed` lists and transfers children lazily: a `Push` carries a child's
//! own snapshot only, and a map adopted from a push is filled in one level at
//! a time through the `Children` messages that follow.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, trace};

use super::{
    CRDTError, Crdt, CrdtKind, NodeContext, Register, child_path, encode_header, is_scalar,
};
use crate::Result;
use crate::codec::{CodecResult, Decode, Encode, Reader, Writer};
use crate::document::DocumentError;
use crate::hash::Hasher;
use crate::sorted::{SortKey, SortedVec};
use crate::sync::protocol::Message;
use crate::tag::Tag;

/// A live child: its key, its tag, and the hash it had when last seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedItem {
    pub key: String,
    pub tag: Tag,
    pub hash: String,
}

impl ObservedItem {
    pub fn new(key: impl Into<String>, tag: Tag, hash: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            tag,
            hash: hash.into(),
        }
    }
}

impl SortKey for ObservedItem {
    fn sort_key(&self) -> &str {
        &self.key
    }
}

/// A tombstone: the tag of a removed child and when it was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedItem {
    pub tag: Tag,
    pub timestamp: String,
}

impl RemovedItem {
    pub fn new(tag: Tag, timestamp: impl Into<String>) -> Self {
        Self {
            tag,
            timestamp: timestamp.into(),
        }
    }

    pub(crate) fn decode_from(reader: &mut Reader<'_>) -> CodecResult<Self> {
        Ok(Self {
            tag: Tag::new(reader.read_string()?),
            timestamp: reader.read_string()?,
        })
    }

    pub(crate) fn encode_to(&self, writer: &mut Writer) {
        writer.write_string(self.tag.as_str());
        writer.write_string(&self.timestamp);
    }
}

impl SortKey for RemovedItem {
    fn sort_key(&self) -> &str {
        self.tag.as_str()
    }
}

/// Observed-remove map from keys to child nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrMap {
    tag: Tag,
    hash: String,
    observed: SortedVec<ObservedItem>,
    removed: SortedVec<RemovedItem>,
}

impl OrMap {
    /// Creates an empty map.
    pub fn new(tag: Tag) -> Self {
        Self::from_parts(tag, SortedVec::new(), SortedVec::new())
    }

    /// Creates a map from its two lists, deriving the hash.
    pub fn from_parts(
        tag: Tag,
        observed: SortedVec<ObservedItem>,
        removed: SortedVec<RemovedItem>,
    ) -> Self {
        let mut map = Self {
            tag,
            hash: String::new(),
            observed,
            removed,
        };
        map.recompute_hash();
        map
    }

    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn observed(&self) -> &SortedVec<ObservedItem> {
        &self.observed
    }

    pub fn removed(&self) -> &SortedVec<RemovedItem> {
        &self.removed
    }

    /// Hash over every child's tag and hash, then every tombstoned tag.
    pub fn recompute_hash(&mut self) {
        let mut hasher = Hasher::new();
        for item in &self.observed {
            hasher.update(item.tag.as_str()).update(&item.hash);
        }
        for item in &self.removed {
            hasher.update(item.tag.as_str());
        }
        self.hash = hasher.finish();
    }

    async fn persist(&mut self, ctx: &NodeContext, node_path: &str) -> Result<()> {
        self.recompute_hash();
        ctx.save(self.clone().into(), node_path).await
    }

    pub(crate) async fn read(&self, ctx: &NodeContext, path: &[String]) -> Result<Option<Value>> {
        let Some((key, rest)) = path.split_first() else {
            let mut object = serde_json::Map::new();
            for item in &self.observed {
                let child = ctx.load_child(item).await?;
                if let Some(value) = child.read(ctx, &[]).await? {
                    object.insert(item.key.clone(), value);
                }
            }
            return Ok(Some(Value::Object(object)));
        };

        match self.observed.get(key) {
            Some(item) => ctx.load_child(item).await?.read(ctx, rest).await,
            None => Ok(None),
        }
    }

    pub(crate) async fn write(
        mut self,
        ctx: &NodeContext,
        value: &Value,
        path: &[String],
        node_path: &str,
    ) -> Result<Crdt> {
        if let Some((key, rest)) = path.split_first() {
            self.write_child(ctx, key, value, rest, node_path).await?;
            self.persist(ctx, node_path).await?;
            return Ok(self.into());
        }

        match value {
            Value::Object(entries) => {
                for (key, child_value) in entries {
                    self.write_child(ctx, key, child_value, &[], node_path).await?;
                }
            }
            Value::Array(items) => {
                for (index, child_value) in items.iter().enumerate() {
                    self.write_child(ctx, &index.to_string(), child_value, &[], node_path)
                        .await?;
                }
            }
            scalar => {
                if self.tag.is_root() {
                    return Err(DocumentError::RootMustBeMap.into());
                }
                debug!(tag = %self.tag, path = node_path, "converting map to register");
                self.delete_subtree(ctx, node_path).await?;
                let register = Register::new(
                    ctx.tags().generate(),
                    ctx.tags().now(),
                    serde_json::to_string(scalar)?,
                );
                ctx.save(register.clone().into(), node_path).await?;
                return Ok(register.into());
            }
        }
        self.persist(ctx, node_path).await?;
        Ok(self.into())
    }

    /// Writes `value` at `rest` below child `key`, creating the child if needed.
    ///
    /// Does not persist this map.
    async fn write_child(
        &mut self,
        ctx: &NodeContext,
        key: &str,
        value: &Value,
        rest: &[String],
        node_path: &str,
    ) -> Result<()> {
        let path = child_path(node_path, key);
        let previous = self.observed.get(key).cloned();
        let child = match &previous {
            Some(item) => {
                ctx.load_child(item)
                    .await?
                    .write(ctx, value, rest, &path)
                    .await?
            }
            None if rest.is_empty() && is_scalar(value) => {
                let register = Register::new(
                    ctx.tags().generate(),
                    ctx.tags().now(),
                    serde_json::to_string(value)?,
                );
                ctx.save(register.clone().into(), &path).await?;
                register.into()
            }
            None => {
                Crdt::from(OrMap::new(ctx.tags().generate()))
                    .write(ctx, value, rest, &path)
                    .await?
            }
        };
        self.bind(key, previous.as_ref().map(|item| &item.tag), &child, ctx);
        Ok(())
    }

    /// Points `key` at `child`, tombstoning the tag it replaces, if any.
    fn bind(&mut self, key: &str, previous: Option<&Tag>, child: &Crdt, ctx: &NodeContext) {
        if let Some(previous) = previous
            && previous != child.tag()
        {
            self.removed
                .upsert(RemovedItem::new(previous.clone(), ctx.tags().now()));
        }
        self.observed
            .upsert(ObservedItem::new(key, child.tag().clone(), child.hash()));
    }

    pub(crate) async fn replace_child(
        &mut self,
        ctx: &NodeContext,
        old: &Tag,
        new_node: &Crdt,
        node_path: &str,
    ) -> Result<()> {
        let key = self
            .observed
            .find(|item| &item.tag == old)
            .map(|item| item.key.clone())
            .ok_or_else(|| CRDTError::MissingChild {
                tag: old.to_string(),
            })?;
        self.bind(&key, Some(old), new_node, ctx);
        self.persist(ctx, node_path).await
    }

    pub(crate) async fn delete(
        &mut self,
        ctx: &NodeContext,
        path: &[String],
        node_path: &str,
    ) -> Result<()> {
        let Some((key, rest)) = path.split_first() else {
            if self.tag.is_root() {
                return Err(DocumentError::RootNotDeletable.into());
            }
            return self.delete_subtree(ctx, node_path).await;
        };

        let Some(item) = self.observed.get(key).cloned() else {
            return Ok(());
        };
        let mut child = ctx.load_child(&item).await?;
        child.delete(ctx, rest, &child_path(node_path, key)).await?;

        if rest.is_empty() {
            self.observed.delete(key);
            self.removed
                .upsert(RemovedItem::new(item.tag, ctx.tags().now()));
        } else if child.hash() != item.hash {
            self.observed
                .upsert(ObservedItem::new(key.as_str(), item.tag, child.hash()));
        } else {
            return Ok(());
        }
        self.persist(ctx, node_path).await
    }

    pub(crate) async fn delete_child_by_tag(
        &mut self,
        ctx: &NodeContext,
        tag: &Tag,
        node_path: &str,
    ) -> Result<bool> {
        let Some(item) = self.observed.find(|item| &item.tag == tag).cloned() else {
            return Ok(false);
        };
        self.drop_child(ctx, &item, node_path).await?;
        self.removed
            .upsert(RemovedItem::new(item.tag, ctx.tags().now()));
        self.persist(ctx, node_path).await?;
        Ok(true)
    }

    /// Deletes every record below this map, then the map's own record.
    async fn delete_subtree(&mut self, ctx: &NodeContext, node_path: &str) -> Result<()> {
        for item in self.observed.iter() {
            let mut child = ctx.load_child(item).await?;
            child
                .delete(ctx, &[], &child_path(node_path, &item.key))
                .await?;
        }
        ctx.remove(&self.tag, node_path).await
    }

    /// Deletes a child's subtree and its observed entry, without tombstoning.
    async fn drop_child(
        &mut self,
        ctx: &NodeContext,
        item: &ObservedItem,
        node_path: &str,
    ) -> Result<()> {
        let mut child = ctx.load_child(item).await?;
        child
            .delete(ctx, &[], &child_path(node_path, &item.key))
            .await?;
        self.observed.delete(&item.key);
        Ok(())
    }

    async fn push_child(&self, ctx: &NodeContext, item: &ObservedItem) -> Result<Message> {
        Ok(Message::Push {
            crdt: ctx.load_child(item).await?.encode(),
        })
    }

    /// Bilateral merge of a remote snapshot of this map.
    ///
    /// Tombstones are reconciled first. Then both `observed` lists are walked
    /// in key order, and every key that needs transferring is answered with a
    /// `Push` of the local child or a `Get` asking for the remote one. When two
    /// different tags claim the same key, the smaller tag wins.
    pub(crate) async fn merge(
        &mut self,
        ctx: &NodeContext,
        remote: OrMap,
        node_path: &str,
    ) -> Result<Option<Message>> {
        let mut updated = false;
        let mut removed: Vec<RemovedItem> = self
            .removed
            .iter()
            .filter(|item| !remote.removed.has(&item.tag))
            .cloned()
            .collect();
        let mut children = BTreeMap::new();

        for tombstone in remote.removed.iter() {
            if self.removed.has(&tombstone.tag) {
                continue;
            }
            if let Some(item) = self
                .observed
                .find(|item| item.tag == tombstone.tag)
                .cloned()
            {
                trace!(key = %item.key, tag = %item.tag, "child removed remotely");
                self.drop_child(ctx, &item, node_path).await?;
            }
            self.removed.upsert(tombstone.clone());
            updated = true;
        }

        let local: Vec<ObservedItem> = self.observed.iter().cloned().collect();
        let mut local = local.iter().peekable();
        let mut theirs = remote.observed.iter().peekable();

        loop {
            let order = match (local.peek(), theirs.peek()) {
                (None, None) => break,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(l), Some(r)) => l.key.cmp(&r.key),
            };

            match order {
                Ordering::Less => {
                    let Some(l) = local.next() else { break };
                    if !remote.removed.has(&l.tag) {
                        children.insert(l.key.clone(), self.push_child(ctx, l).await?);
                    }
                }
                Ordering::Greater => {
                    let Some(r) = theirs.next() else { break };
                    if !self.removed.has(&r.tag) {
                        children.insert(r.key.clone(), Message::get_any());
                    }
                }
                Ordering::Equal => {
                    let (Some(l), Some(r)) = (local.next(), theirs.next()) else {
                        break;
                    };
                    if self.removed.has(&r.tag) {
                        // Their child is already dead here; only ours contends.
                        if !remote.removed.has(&l.tag) {
                            children.insert(l.key.clone(), self.push_child(ctx, l).await?);
                        }
                        continue;
                    }
                    match l.tag.cmp(&r.tag) {
                        Ordering::Equal => {
                            if l.hash != r.hash {
                                children.insert(l.key.clone(), self.push_child(ctx, l).await?);
                            }
                        }
                        Ordering::Greater => {
                            debug!(key = %l.key, local = %l.tag, remote = %r.tag, "local child lost tag conflict");
                            self.drop_child(ctx, l, node_path).await?;
                            self.removed
                                .upsert(RemovedItem::new(l.tag.clone(), ctx.tags().now()));
                            updated = true;
                            children.insert(l.key.clone(), Message::get_any());
                        }
                        Ordering::Less => {
                            debug!(key = %l.key, local = %l.tag, remote = %r.tag, "local child won tag conflict");
                            let tombstone = match self.removed.get(&r.tag) {
                                Some(existing) => existing.clone(),
                                None => {
                                    let tombstone =
                                        RemovedItem::new(r.tag.clone(), ctx.tags().now());
                                    self.removed.upsert(tombstone.clone());
                                    updated = true;
                                    tombstone
                                }
                            };
                            removed.push(tombstone);
                            children.insert(l.key.clone(), self.push_child(ctx, l).await?);
                        }
                    }
                }
            }
        }

        if updated {
            self.persist(ctx, node_path).await?;
        }

        if removed.is_empty() && children.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Message::Children {
                tag: self.tag.clone(),
                removed,
                children,
            }))
        }
    }

    /// Applies a `Children` message addressed to this map.
    ///
    /// Tombstones are applied first. Each per-child message is then
    /// dispatched to the child under its key; a `Push` for a key this map
    /// does not have creates the child, unless its tag was removed here.
    pub(crate) async fn handle_children(
        &mut self,
        ctx: &NodeContext,
        removed: &[RemovedItem],
        children: &BTreeMap<String, Message>,
        node_path: &str,
    ) -> Result<Option<Message>> {
        let mut updated = false;

        for tombstone in removed {
            if let Some(item) = self
                .observed
                .find(|item| item.tag == tombstone.tag)
                .cloned()
            {
                self.drop_child(ctx, &item, node_path).await?;
                updated = true;
            }
            if !self.removed.has(&tombstone.tag) {
                self.removed.upsert(tombstone.clone());
                updated = true;
            }
        }

        let mut reply_removed = Vec::new();
        let mut replies = BTreeMap::new();

        for (key, message) in children {
            let path = child_path(node_path, key);
            let mut child = match self.observed.get(key) {
                Some(item) => ctx.load_child(item).await?,
                None => {
                    let Message::Push { crdt } = message else {
                        debug!(%key, path = node_path, "dropping message for unknown child");
                        continue;
                    };
                    let remote = Crdt::decode(crdt)?;
                    if let Some(tombstone) = self.removed.get(remote.tag()) {
                        debug!(%key, tag = %remote.tag(), "refusing to resurrect removed child");
                        reply_removed.push(tombstone.clone());
                        continue;
                    }
                    let child = Crdt::seed_from(remote);
                    ctx.save(child.clone(), &path).await?;
                    self.observed
                        .upsert(ObservedItem::new(key.as_str(), child.tag().clone(), child.hash()));
                    updated = true;
                    child
                }
            };

            if let Some(reply) = child.handle(ctx, message, &path).await? {
                replies.insert(key.clone(), reply);
            }
            if let Some(item) = self.observed.get_mut(key)
                && item.hash != child.hash()
            {
                item.hash = child.hash().to_string();
                updated = true;
            }
        }

        if updated {
            self.persist(ctx, node_path).await?;
        }

        if reply_removed.is_empty() && replies.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Message::Children {
                tag: self.tag.clone(),
                removed: reply_removed,
                children: replies,
            }))
        }
    }

    pub(crate) fn decode_fields(
        tag: Tag,
        hash: String,
        reader: &mut Reader<'_>,
    ) -> CodecResult<Self> {
        let observed_len = reader.read_len()?;
        let mut observed = Vec::with_capacity(observed_len);
        for _ in 0..observed_len {
            observed.push(ObservedItem {
                key: reader.read_string()?,
                tag: Tag::new(reader.read_string()?),
                hash: reader.read_string()?,
            });
        }
        let removed_len = reader.read_len()?;
        let mut removed = Vec::with_capacity(removed_len);
        for _ in 0..removed_len {
            removed.push(RemovedItem::decode_from(reader)?);
        }
        Ok(Self {
            tag,
            hash,
            observed: observed.into_iter().collect(),
            removed: removed.into_iter().collect(),
        })
    }
}

impl Encode for OrMap {
    fn encode_to(&self, writer: &mut Writer) {
        encode_header(writer, CrdtKind::Map, &self.tag, &self.hash);
        writer.write_len(self.observed.len());
        for item in &self.observed {
            writer.write_string(&item.key);
            writer.write_string(item.tag.as_str());
            writer.write_string(&item.hash);
        }
        writer.write_len(self.removed.len());
        for item in &self.removed {
            item.encode_to(writer);
        }
    }
}

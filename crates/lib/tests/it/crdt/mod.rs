//! Document-tree CRDT tests
//!
//! These drive two or more replicas through local operations and the sync
//! handshake, checking the convergence guarantees of the register and map
//! merge rules.

mod convergence;
mod conversion;
mod properties;

use driftdoc::{
    Document,
    crdt::{Crdt, Register},
    tag::Tag,
};

/// Loads the register stored under `key` of the root map.
pub async fn root_register(doc: &Document, key: &str) -> Register {
    let Some(Crdt::Map(root)) = doc.store().get(&Tag::root()).await.unwrap() else {
        panic!("root is not a map");
    };
    let tag = root.observed().get(key).expect("key not present").tag.clone();
    match doc.store().get(&tag).await.unwrap() {
        Some(Crdt::Register(register)) => register,
        other => panic!("expected a register under {key}, got {other:?}"),
    }
}

/// The tag bound to `key` in the root map.
pub async fn root_child_tag(doc: &Document, key: &str) -> Option<Tag> {
    let Some(Crdt::Map(root)) = doc.store().get(&Tag::root()).await.unwrap() else {
        panic!("root is not a map");
    };
    root.observed().get(key).map(|item| item.tag.clone())
}

//! Store tests
//!
//! Caching and serialization of node records over a backend.

use std::sync::Arc;

use driftdoc::{
    backend::{Backend, InMemory},
    codec::Encode,
    crdt::{Crdt, Register},
    store::Store,
    tag::Tag,
};

fn register(tag: &str, value: i64) -> Crdt {
    Register::new(Tag::new(tag), "---------".to_string(), value.to_string()).into()
}

#[tokio::test]
async fn concurrent_writes_apply_in_sequence() {
    let backend = Arc::new(InMemory::new());
    let store = Arc::new(Store::new(backend.clone()));

    let mut tasks = Vec::new();
    for i in 0..32 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            store.set(register("same", i)).await.unwrap();
            i
        }));
    }
    let mut finished = Vec::new();
    for task in tasks {
        finished.push(task.await.unwrap());
    }
    assert_eq!(finished.len(), 32);

    // The cache and the backend agree on whichever write ran last.
    let cached = store.get(&Tag::new("same")).await.unwrap().unwrap();
    let persisted = backend.get("same").await.unwrap();
    assert_eq!(cached.encode(), persisted);
}

#[tokio::test]
async fn cache_serves_repeated_reads() {
    let backend = Arc::new(InMemory::new());
    backend
        .set("t", register("t", 1).encode())
        .await
        .unwrap();
    let store = Store::new(backend.clone());

    assert_eq!(store.cached().await, 0);
    let first = store.get(&Tag::new("t")).await.unwrap();
    assert_eq!(store.cached().await, 1);
    assert_eq!(store.get(&Tag::new("t")).await.unwrap(), first);

    store.del(&Tag::new("t")).await.unwrap();
    assert_eq!(store.cached().await, 0);
    assert!(backend.get("t").await.unwrap_err().is_not_found());
    store.del(&Tag::new("t")).await.unwrap();
}

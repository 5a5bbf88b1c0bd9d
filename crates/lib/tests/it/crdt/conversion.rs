use driftdoc::crdt::CrdtKind;
use serde_json::json;

use super::root_child_tag;
use crate::helpers::{assert_same_view, converge, test_document};

#[tokio::test]
async fn scalar_over_map_keeps_siblings() {
    let doc = test_document().await;
    doc.set("a", json!({"b": {"c": 1}, "d": 2})).await.unwrap();
    doc.set("e", "sibling").await.unwrap();

    doc.set("a.b", 7).await.unwrap();
    assert_eq!(doc.get("a").await.unwrap(), Some(json!({"b": 7, "d": 2})));
    assert_eq!(doc.get("a.b.c").await.unwrap(), None);
    assert_eq!(doc.get("e").await.unwrap(), Some(json!("sibling")));
}

#[tokio::test]
async fn map_over_scalar_mints_a_new_tag() {
    let doc = test_document().await;
    doc.set("a", 1).await.unwrap();
    let before = root_child_tag(&doc, "a").await.unwrap();
    assert_eq!(
        doc.store().get(&before).await.unwrap().unwrap().kind(),
        CrdtKind::Register
    );

    doc.set("a.nested", true).await.unwrap();
    let after = root_child_tag(&doc, "a").await.unwrap();
    assert_ne!(before, after);
    assert_eq!(doc.store().get(&before).await.unwrap(), None);
    assert_eq!(
        doc.store().get(&after).await.unwrap().unwrap().kind(),
        CrdtKind::Map
    );
    assert_eq!(doc.get("a").await.unwrap(), Some(json!({"nested": true})));
}

#[tokio::test]
async fn conversions_sync_like_any_replace() {
    let a = test_document().await;
    let b = test_document().await;
    a.set("node", json!({"x": 1})).await.unwrap();
    converge(&a, &b).await;

    a.set("node", "flat").await.unwrap();
    converge(&a, &b).await;
    assert_eq!(b.get("node").await.unwrap(), Some(json!("flat")));

    b.set("node.again", json!([1, 2])).await.unwrap();
    converge(&b, &a).await;
    assert_eq!(a.get("node").await.unwrap(), Some(json!({"again": {"0": 1, "1": 2}})));
    assert_same_view(&a, &b).await;
}

#[tokio::test]
async fn writing_an_object_merges_keys() {
    let doc = test_document().await;
    doc.set("cfg", json!({"a": 1, "b": 2})).await.unwrap();
    doc.set("cfg", json!({"b": 3, "c": 4})).await.unwrap();
    assert_eq!(
        doc.get("cfg").await.unwrap(),
        Some(json!({"a": 1, "b": 3, "c": 4}))
    );
}

use driftdoc::{Document, backend::InMemory, config::DocumentConfig};
use serde_json::json;

use crate::helpers::test_document;

#[tokio::test]
async fn nested_set_get_delete() {
    let doc = test_document().await;
    doc.set("a.b.c", 5).await.unwrap();
    assert_eq!(doc.get("a.b.c").await.unwrap(), Some(json!(5)));
    assert_eq!(doc.get("a.b").await.unwrap(), Some(json!({"c": 5})));

    doc.delete("a.b").await.unwrap();
    assert_eq!(doc.get("a.b").await.unwrap(), None);
    assert_eq!(doc.get("a").await.unwrap(), Some(json!({})));
}

#[tokio::test]
async fn paths_are_normalized() {
    let doc = test_document().await;
    doc.set(".x..y.", "v").await.unwrap();
    assert_eq!(doc.get("x.y").await.unwrap(), Some(json!("v")));
    assert_eq!(doc.get("x..y").await.unwrap(), Some(json!("v")));
    assert_eq!(doc.get(".").await.unwrap(), doc.get("").await.unwrap());
}

#[tokio::test]
async fn unicode_keys_and_values() {
    let doc = test_document().await;
    doc.set("größe.名前", "値 ✓").await.unwrap();
    assert_eq!(
        doc.get("").await.unwrap(),
        Some(json!({"größe": {"名前": "値 ✓"}}))
    );
}

#[tokio::test]
async fn json_scalars_round_trip() {
    let doc = test_document().await;
    let value = json!({
        "null": null,
        "bool": false,
        "int": -42,
        "float": 2.5,
        "big": u64::MAX,
        "text": "quoted \"text\"",
    });
    doc.set("scalars", value.clone()).await.unwrap();
    assert_eq!(doc.get("scalars").await.unwrap(), Some(value));
}

#[tokio::test]
async fn root_cannot_be_deleted_or_made_scalar() {
    let doc = test_document().await;
    doc.set("k", 1).await.unwrap();

    let err = doc.delete("").await.unwrap_err();
    assert!(err.is_not_applicable());
    let err = doc.set("", "scalar").await.unwrap_err();
    assert!(err.is_not_applicable());
    assert_eq!(doc.get("").await.unwrap(), Some(json!({"k": 1})));
}

#[tokio::test]
async fn state_survives_a_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("state.json");

    let backend = InMemory::new();
    let doc = Document::open(Box::new(backend), DocumentConfig::default())
        .await
        .unwrap();
    doc.set("todo", json!({"first": {"done": true}})).await.unwrap();
    let hash = doc.root_hash().await.unwrap();
    let backend = doc
        .backend()
        .as_any()
        .downcast_ref::<InMemory>()
        .unwrap();
    backend.save_to_file(&file).await.unwrap();

    let loaded = InMemory::load_from_file(&file).await.unwrap();
    let reopened = Document::open(Box::new(loaded), DocumentConfig::default())
        .await
        .unwrap();
    assert_eq!(reopened.root_hash().await.unwrap(), hash);
    assert_eq!(
        reopened.get("todo.first.done").await.unwrap(),
        Some(json!(true))
    );
}

#[tokio::test]
async fn concurrent_sets_all_land() {
    let doc = test_document().await;
    let mut tasks = Vec::new();
    for i in 0..16 {
        let doc = doc.clone();
        tasks.push(tokio::spawn(async move {
            doc.set(&format!("items.{i}"), i).await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let items = doc.get("items").await.unwrap().unwrap();
    assert_eq!(items.as_object().unwrap().len(), 16);
    assert_eq!(doc.get("items.15").await.unwrap(), Some(json!(15)));
}

//! Backend tests
//!
//! Behavior every `Backend` must show, checked against `InMemory`, plus its
//! file persistence.

use driftdoc::backend::{Backend, InMemory};

#[tokio::test]
async fn records_round_trip() {
    let backend = InMemory::new();
    assert!(backend.get("missing").await.unwrap_err().is_not_found());
    assert!(backend.delete("missing").await.unwrap_err().is_not_found());

    backend.set("a", vec![1, 2, 3]).await.unwrap();
    backend.set("a", vec![4]).await.unwrap();
    assert_eq!(backend.get("a").await.unwrap(), vec![4]);
    assert_eq!(backend.len().await, 1);

    backend.delete("a").await.unwrap();
    assert!(backend.is_empty().await);
}

#[tokio::test]
async fn file_persistence() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.json");

    let backend = InMemory::new();
    backend.set("0", vec![2, 0]).await.unwrap();
    backend.set("binary", vec![0, 255, 128]).await.unwrap();
    backend.save_to_file(&path).await.unwrap();

    let loaded = InMemory::load_from_file(&path).await.unwrap();
    let mut tags = loaded.all_tags().await;
    tags.sort();
    assert_eq!(tags, vec!["0".to_string(), "binary".to_string()]);
    assert_eq!(loaded.get("binary").await.unwrap(), vec![0, 255, 128]);

    let missing = InMemory::load_from_file(dir.path().join("absent.json"))
        .await
        .unwrap();
    assert!(missing.is_empty().await);
}

#[tokio::test]
async fn corrupt_files_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");

    std::fs::write(&path, "not json").unwrap();
    let err = InMemory::load_from_file(&path).await.unwrap_err();
    assert_eq!(err.module(), "backend");

    std::fs::write(&path, r#"{"_v":0,"records":{"t":"***"}}"#).unwrap();
    let err = InMemory::load_from_file(&path).await.unwrap_err();
    assert!(err.is_integrity_error());
}

use std::sync::{Arc, Mutex};

use driftdoc::{document::DocumentError, sync::Message};
use serde_json::{Value, json};

use crate::helpers::{converge, test_document};

type Log = Arc<Mutex<Vec<Option<Value>>>>;

fn recorder() -> (Log, impl Fn(Option<&Value>) -> driftdoc::Result<()> + Send + Sync + 'static) {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    (log, move |value: Option<&Value>| {
        sink.lock().unwrap().push(value.cloned());
        Ok(())
    })
}

#[tokio::test]
async fn current_value_is_delivered_first() {
    let doc = test_document().await;
    doc.set("a", 1).await.unwrap();

    let (log, listener) = recorder();
    doc.listen("a", listener).await.unwrap();
    let (missing, listener) = recorder();
    doc.listen("nothing.here", listener).await.unwrap();

    assert_eq!(*log.lock().unwrap(), vec![Some(json!(1))]);
    assert_eq!(*missing.lock().unwrap(), vec![None]);
}

#[tokio::test]
async fn changes_below_a_path_notify_it() {
    let doc = test_document().await;
    let (log, listener) = recorder();
    doc.listen("cfg", listener).await.unwrap();

    doc.set("cfg.theme.color", "red").await.unwrap();
    doc.set("unrelated", true).await.unwrap();
    doc.delete("cfg.theme").await.unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec![None, Some(json!({"theme": {"color": "red"}})), Some(json!({}))]
    );
}

#[tokio::test]
async fn remote_changes_notify_listeners() {
    let a = test_document().await;
    let b = test_document().await;
    let (log, listener) = recorder();
    b.listen("shared.value", listener).await.unwrap();

    a.set("shared.value", 10).await.unwrap();
    converge(&a, &b).await;
    a.set("shared.value", 11).await.unwrap();
    converge(&a, &b).await;

    let log = log.lock().unwrap();
    assert_eq!(log.first(), Some(&None));
    assert_eq!(log.last(), Some(&Some(json!(11))));
    assert!(log.contains(&Some(json!(10))));
}

#[tokio::test]
async fn failing_listener_does_not_block_others_or_the_write() {
    let doc = test_document().await;
    doc.listen("k", |value| match value {
        Some(_) => Err(DocumentError::RootMustBeMap.into()),
        None => Ok(()),
    })
    .await
    .unwrap();
    let (log, listener) = recorder();
    doc.listen("k", listener).await.unwrap();

    doc.set("k", "v").await.unwrap();
    assert_eq!(doc.get("k").await.unwrap(), Some(json!("v")));
    assert_eq!(*log.lock().unwrap(), vec![None, Some(json!("v"))]);
}

#[tokio::test]
async fn listeners_see_the_state_they_are_told_about() {
    let doc = test_document().await;
    let reader = doc.clone();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    doc.listen("n", move |value| {
        sink.lock().unwrap().push(value.cloned());
        Ok(())
    })
    .await
    .unwrap();

    for i in 0..3 {
        doc.set("n", i).await.unwrap();
        assert_eq!(reader.get("n").await.unwrap(), Some(json!(i)));
    }
    assert_eq!(
        *seen.lock().unwrap(),
        vec![None, Some(json!(0)), Some(json!(1)), Some(json!(2))]
    );
}

#[tokio::test]
async fn unlisten_stops_delivery() {
    let doc = test_document().await;
    let (log, listener) = recorder();
    let subscription = doc.listen("k", listener).await.unwrap();
    assert_eq!(subscription.path(), "k");

    assert!(doc.unlisten(&subscription));
    doc.set("k", 1).await.unwrap();
    doc.handle_message(&Message::get_any()).await.unwrap();
    assert_eq!(*log.lock().unwrap(), vec![None]);
}

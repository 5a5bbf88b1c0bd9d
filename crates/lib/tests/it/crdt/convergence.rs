use std::sync::Arc;

use driftdoc::{
    FixedClock,
    codec::Encode,
    crdt::{Crdt, Register},
    sync::Message,
    tag::Tag,
};
use serde_json::json;

use super::root_register;
use crate::helpers::{assert_same_view, converge, exchange, replica, test_document};

#[tokio::test]
async fn disjoint_writes_merge() {
    let a = test_document().await;
    let b = test_document().await;
    a.set("todo.first", json!({"title": "a", "done": false}))
        .await
        .unwrap();
    b.set("todo.second", "b").await.unwrap();
    b.set("count", 3).await.unwrap();

    converge(&a, &b).await;
    assert_same_view(&a, &b).await;
    // Both sides created "todo" independently; the earlier map wins whole.
    let todo = a.get("todo").await.unwrap().unwrap();
    assert!(todo == json!({"first": {"title": "a", "done": false}}) || todo == json!({"second": "b"}));
    assert_eq!(a.get("count").await.unwrap(), Some(json!(3)));
}

#[tokio::test]
async fn earlier_tag_wins_a_concurrent_create() {
    let clock = Arc::new(FixedClock::default());
    let a = replica(clock.clone()).await;
    let b = replica(clock).await;
    a.set("cfg", json!({"x": 1})).await.unwrap();
    b.set("cfg", json!({"y": 2})).await.unwrap();

    converge(&b, &a).await;
    assert_same_view(&a, &b).await;
    assert_eq!(b.get("cfg").await.unwrap(), Some(json!({"x": 1})));
}

#[tokio::test]
async fn later_write_to_a_shared_register_wins() {
    let clock = Arc::new(FixedClock::default());
    let a = replica(clock.clone()).await;
    let b = replica(clock).await;
    a.set("k", 0).await.unwrap();
    converge(&a, &b).await;

    a.set("k", 1).await.unwrap();
    b.set("k", 2).await.unwrap();
    converge(&a, &b).await;
    assert_same_view(&a, &b).await;
    assert_eq!(a.get("k").await.unwrap(), Some(json!(2)));
}

#[tokio::test]
async fn timestamp_tie_picks_the_same_value_both_ways() {
    let clock = Arc::new(FixedClock::default());
    let a = replica(clock.clone()).await;
    let b = replica(clock.clone()).await;
    a.set("k", "seed").await.unwrap();
    converge(&a, &b).await;

    {
        let _hold = clock.hold();
        a.set("k", "from a").await.unwrap();
        b.set("k", "from b").await.unwrap();
    }
    let ra = root_register(&a, "k").await;
    let rb = root_register(&b, "k").await;
    assert_eq!(ra.tag(), rb.tag());
    assert_eq!(ra.timestamp(), rb.timestamp());
    let expected = if ra.hash() > rb.hash() {
        json!("from a")
    } else {
        json!("from b")
    };

    // Push each side's register straight at the other.
    let push_a = Message::Push {
        crdt: Crdt::from(ra).encode(),
    };
    let push_b = Message::Push {
        crdt: Crdt::from(rb).encode(),
    };
    let children = |push: Message| Message::Children {
        tag: Tag::root(),
        removed: Vec::new(),
        children: [("k".to_string(), push)].into_iter().collect(),
    };
    a.handle_message(&children(push_b)).await.unwrap();
    b.handle_message(&children(push_a)).await.unwrap();

    assert_eq!(a.get("k").await.unwrap(), Some(expected.clone()));
    assert_eq!(b.get("k").await.unwrap(), Some(expected));
    assert_same_view(&a, &b).await;
}

#[test]
fn register_hash_covers_only_timestamp_and_value() {
    let ts = "---------".to_string();
    let one = Register::new(Tag::new("one"), ts.clone(), "1".to_string());
    let other = Register::new(Tag::new("two"), ts.clone(), "1".to_string());
    let changed = Register::new(Tag::new("one"), ts, "2".to_string());
    assert_eq!(one.hash(), other.hash());
    assert_ne!(one.hash(), changed.hash());
}

#[tokio::test]
async fn merging_a_converged_replica_is_a_no_op() {
    let a = test_document().await;
    let b = test_document().await;
    a.set("nested", json!({"list": [1, 2, 3], "flag": true}))
        .await
        .unwrap();
    converge(&a, &b).await;

    let hash = a.root_hash().await.unwrap();
    let snapshot = b.store().get(&Tag::root()).await.unwrap().unwrap();
    let reply = a
        .handle_message(&Message::Push {
            crdt: snapshot.encode(),
        })
        .await
        .unwrap();
    assert_eq!(reply, None);
    assert_eq!(a.root_hash().await.unwrap(), hash);

    assert_eq!(exchange(&a, &b).await, 0);
    assert_eq!(exchange(&b, &a).await, 0);
}

#[tokio::test]
async fn deep_trees_transfer_level_by_level() {
    let a = test_document().await;
    let b = test_document().await;
    a.set(
        "l1",
        json!({"l2": {"l3": {"l4": {"leaf": "deep", "n": 4}}, "side": [true]}}),
    )
    .await
    .unwrap();

    converge(&a, &b).await;
    assert_eq!(b.get("l1.l2.l3.l4.leaf").await.unwrap(), Some(json!("deep")));
    assert_eq!(b.get("l1.l2.side.0").await.unwrap(), Some(json!(true)));
    assert_same_view(&a, &b).await;
}

#[tokio::test]
async fn three_replicas_converge_pairwise() {
    let clock = Arc::new(FixedClock::default());
    let a = replica(clock.clone()).await;
    let b = replica(clock.clone()).await;
    let c = replica(clock).await;
    a.set("shared", json!({"from": "a"})).await.unwrap();
    b.set("only_b", 1).await.unwrap();
    c.set("only_c", json!(["x"])).await.unwrap();
    c.set("scratch", 1).await.unwrap();
    c.delete("scratch").await.unwrap();

    converge(&a, &b).await;
    converge(&b, &c).await;
    converge(&a, &c).await;
    converge(&a, &b).await;

    assert_same_view(&a, &b).await;
    assert_same_view(&b, &c).await;
    assert_eq!(
        a.get("").await.unwrap(),
        Some(json!({"shared": {"from": "a"}, "only_b": 1, "only_c": {"0": "x"}}))
    );
}

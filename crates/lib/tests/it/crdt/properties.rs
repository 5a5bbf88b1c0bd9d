//! Randomised convergence checks.

use std::sync::Arc;

use driftdoc::{Document, FixedClock};
use proptest::prelude::*;
use serde_json::{Value, json};

use crate::helpers::{assert_same_view, converge, replica};

#[derive(Debug, Clone)]
enum Op {
    Set(&'static str, Value),
    Delete(&'static str),
}

const PATHS: &[&str] = &["a", "b", "a.x", "a.y", "b.z", "c.d.e"];

fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        (0i64..100).prop_map(Value::from),
        "[a-zé]{0,4}".prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        Just(Value::Null),
        Just(json!({"n": 1, "m": {"deep": true}})),
        Just(json!(["p", "q"])),
    ]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (prop::sample::select(PATHS), arb_value()).prop_map(|(p, v)| Op::Set(p, v)),
        1 => prop::sample::select(PATHS).prop_map(Op::Delete),
    ]
}

async fn apply(doc: &Document, ops: &[Op]) {
    for op in ops {
        match op {
            Op::Set(path, value) => doc.set(path, value.clone()).await.unwrap(),
            Op::Delete(path) => doc.delete(path).await.unwrap(),
        }
    }
}

fn run(future: impl std::future::Future<Output = ()>) {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Independent edits on two replicas converge after syncing.
    #[test]
    fn prop_replicas_converge(
        common in prop::collection::vec(arb_op(), 0..6),
        left in prop::collection::vec(arb_op(), 0..8),
        right in prop::collection::vec(arb_op(), 0..8),
    ) {
        run(async {
            let clock = Arc::new(FixedClock::default());
            let a = replica(clock.clone()).await;
            let b = replica(clock).await;
            apply(&a, &common).await;
            converge(&a, &b).await;

            apply(&a, &left).await;
            apply(&b, &right).await;
            converge(&a, &b).await;
            assert_same_view(&a, &b).await;
        });
    }

    /// Syncing in either direction first reaches the same state.
    #[test]
    fn prop_direction_does_not_matter(
        left in prop::collection::vec(arb_op(), 1..8),
        right in prop::collection::vec(arb_op(), 1..8),
    ) {
        run(async {
            let mut views = Vec::new();
            for a_first in [true, false] {
                let clock = Arc::new(FixedClock::default());
                let a = replica(clock.clone()).await;
                let b = replica(clock).await;
                apply(&a, &left).await;
                apply(&b, &right).await;
                if a_first {
                    converge(&a, &b).await;
                } else {
                    converge(&b, &a).await;
                }
                assert_same_view(&a, &b).await;
                views.push(a.get("").await.unwrap());
            }
            assert_eq!(views[0], views[1]);
        });
    }
}

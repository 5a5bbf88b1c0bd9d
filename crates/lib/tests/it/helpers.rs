use std::sync::Arc;

use driftdoc::{
    Document, FixedClock, backend::InMemory, config::DocumentConfig, sync::Message,
};

/// Upper bound on messages in one handshake before a test gives up.
const MAX_ROUNDS: usize = 10_000;

/// Creates an empty document on an in-memory backend with a test clock.
pub async fn test_document() -> Document {
    replica(Arc::new(FixedClock::default())).await
}

/// Creates an empty document reading time from `clock`.
///
/// Replicas sharing a clock mint tags in creation order, which makes
/// tag-conflict outcomes predictable.
pub async fn replica(clock: Arc<FixedClock>) -> Document {
    Document::open_with_clock(Box::new(InMemory::new()), DocumentConfig::default(), clock)
        .await
        .expect("Failed to open document")
}

/// Runs one handshake started by `from` sending its root hash to `to`, until
/// one side has nothing left to say. Returns the number of replies.
pub async fn exchange(from: &Document, to: &Document) -> usize {
    let mut message = Message::Get {
        hash: from.root_hash().await.expect("root hash"),
    };
    let mut towards_to = true;
    let mut replies = 0;
    loop {
        let receiver = if towards_to { to } else { from };
        match receiver
            .handle_message(&message)
            .await
            .expect("Failed to handle sync message")
        {
            Some(reply) => {
                message = reply;
                towards_to = !towards_to;
                replies += 1;
                assert!(replies < MAX_ROUNDS, "handshake did not settle");
            }
            None => return replies,
        }
    }
}

/// Exchanges in both directions until the two root hashes agree.
pub async fn converge(a: &Document, b: &Document) {
    for _ in 0..8 {
        exchange(a, b).await;
        exchange(b, a).await;
        if a.root_hash().await.unwrap() == b.root_hash().await.unwrap() {
            return;
        }
    }
    panic!(
        "replicas did not converge:\n{:?}\n{:?}",
        a.get("").await.unwrap(),
        b.get("").await.unwrap()
    );
}

/// Asserts that both replicas show the same whole-document value.
pub async fn assert_same_view(a: &Document, b: &Document) {
    assert_eq!(a.get("").await.unwrap(), b.get("").await.unwrap());
    assert_eq!(a.root_hash().await.unwrap(), b.root_hash().await.unwrap());
}

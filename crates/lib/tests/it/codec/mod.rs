//! Codec round-trip properties
//!
//! Randomly generated messages and CRDT snapshots must decode to exactly what
//! was encoded, including empty and nested maps and non-ASCII strings.

use std::collections::BTreeMap;

use driftdoc::{
    codec::{Decode, Encode},
    crdt::{Crdt, ObservedItem, OrMap, Register, RemovedItem},
    sorted::SortedVec,
    sync::{Message, PeerId, Relay},
    tag::Tag,
};
use proptest::prelude::*;

fn arb_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 _.é名✓-]{0,12}"
}

fn arb_tag() -> impl Strategy<Value = Tag> {
    "[-0-9A-Za-z_]{22}".prop_map(Tag::new)
}

fn arb_register() -> impl Strategy<Value = Crdt> {
    (arb_tag(), "[-0-9A-Za-z_]{9}", arb_text()).prop_map(|(tag, ts, text)| {
        let value = serde_json::to_string(&text).unwrap();
        Register::new(tag, ts, value).into()
    })
}

fn arb_map() -> impl Strategy<Value = Crdt> {
    (
        arb_tag(),
        prop::collection::btree_map(arb_text(), (arb_tag(), arb_text()), 0..6),
        prop::collection::btree_map(arb_tag(), "[-0-9A-Za-z_]{9}", 0..4),
    )
        .prop_map(|(tag, observed, removed)| {
            let observed: SortedVec<ObservedItem> = observed
                .into_iter()
                .map(|(key, (tag, hash))| ObservedItem::new(key, tag, hash))
                .collect();
            let removed: SortedVec<RemovedItem> = removed
                .into_iter()
                .map(|(tag, ts)| RemovedItem::new(tag, ts))
                .collect();
            OrMap::from_parts(tag, observed, removed).into()
        })
}

fn arb_crdt() -> impl Strategy<Value = Crdt> {
    prop_oneof![arb_register(), arb_map()]
}

fn arb_removed() -> impl Strategy<Value = Vec<RemovedItem>> {
    prop::collection::vec(
        (arb_tag(), "[-0-9A-Za-z_]{9}").prop_map(|(tag, ts)| RemovedItem::new(tag, ts)),
        0..3,
    )
}

fn arb_message() -> impl Strategy<Value = Message> {
    let leaf = prop_oneof![
        Just(Message::Done),
        arb_text().prop_map(|hash| Message::Get { hash }),
        arb_crdt().prop_map(|crdt| Message::Push { crdt: crdt.encode() }),
        prop::collection::vec(arb_text().prop_map(PeerId::new), 0..4)
            .prop_map(|peers| Message::Peers { peers }),
        (arb_text(), arb_text(), arb_text())
            .prop_map(|(from, to, payload)| Message::SdpOffer(Relay::new(from, to, payload))),
        (arb_text(), arb_text(), arb_text())
            .prop_map(|(from, to, payload)| Message::IceCandidate(Relay::new(from, to, payload))),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        (
            arb_tag(),
            arb_removed(),
            prop::collection::btree_map(arb_text(), inner, 0..4),
        )
            .prop_map(|(tag, removed, children): (Tag, Vec<RemovedItem>, BTreeMap<String, Message>)| {
                Message::Children {
                    tag,
                    removed,
                    children,
                }
            })
    })
}

proptest! {
    #[test]
    fn prop_crdt_round_trip(crdt in arb_crdt()) {
        let bytes = crdt.encode();
        prop_assert_eq!(Crdt::decode(&bytes).unwrap(), crdt);
    }

    #[test]
    fn prop_message_round_trip(message in arb_message()) {
        let bytes = message.encode();
        prop_assert_eq!(Message::decode(&bytes).unwrap(), message);
    }

    #[test]
    fn prop_truncated_frames_never_panic(message in arb_message(), cut in 0usize..64) {
        let bytes = message.encode();
        let cut = cut.min(bytes.len());
        if cut < bytes.len() {
            prop_assert!(Message::decode(&bytes[..cut]).is_err());
        }
    }
}

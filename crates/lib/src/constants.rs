//! Constants used throughout the driftdoc library.
//!
//! Reserved tags, fixed identifier lengths and protocol defaults live here so
//! that the codec, the engine and the coordinator agree on them.

/// Tag reserved for the root map of every document.
pub const ROOT_TAG: &str = "0";

/// Length of a timestamp produced by the tag generator.
pub const TIMESTAMP_LEN: usize = 9;

/// Length of a tag: a timestamp followed by random characters.
pub const TAG_LEN: usize = 22;

/// Number of random characters appended to a timestamp to form a tag.
pub const TAG_RANDOM_LEN: usize = TAG_LEN - TIMESTAMP_LEN;

/// Order-preserving base64 alphabet; ASCII order equals digit order.
pub const ORDER_PRESERVING_ALPHABET: &[u8; 64] =
    b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

/// Below this many connected peers a node asks its neighbours for more.
pub const DEFAULT_PEER_LOW_WATER_MARK: usize = 7;

/// Deepest `Children` nesting accepted in a single message.
pub const MAX_MESSAGE_DEPTH: usize = 128;

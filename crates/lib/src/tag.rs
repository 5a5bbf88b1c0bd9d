//! Globally unique, order-preserving identifiers.
//!
//! Tags identify CRDT nodes for their whole lifetime. A tag is a 9-character
//! timestamp followed by 13 random characters, all drawn from an alphabet
//! whose ASCII order matches its digit order, so comparing two tags as
//! strings compares their creation times first. The bare timestamp doubles
//! as the clock value used for last-writer-wins decisions in registers.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::constants::{
    ORDER_PRESERVING_ALPHABET, ROOT_TAG, TAG_LEN, TAG_RANDOM_LEN, TIMESTAMP_LEN,
};

/// Encodes `n` in order-preserving base64 without padding.
///
/// Zero encodes as the lowest digit, `-`.
pub fn encode_base64(mut n: u64) -> String {
    if n == 0 {
        return "-".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(ORDER_PRESERVING_ALPHABET[(n % 64) as usize]);
        n /= 64;
    }
    digits.reverse();
    // The alphabet is pure ASCII.
    digits.into_iter().map(char::from).collect()
}

/// Encodes `n` in order-preserving base64, left-padded with the zero digit.
///
/// Padded encodings of equal width compare like the numbers they encode.
pub fn encode_base64_padded(n: u64, width: usize) -> String {
    format!("{:->width$}", encode_base64(n))
}

/// Identifier of a CRDT node.
///
/// The root map always uses [`Tag::root`]; every other tag comes from a
/// [`TagGenerator`].
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    /// Wraps an existing tag string, as read from the wire or storage.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The reserved tag of the document root.
    pub fn root() -> Self {
        Self(ROOT_TAG.to_string())
    }

    /// Returns true for the reserved root tag.
    pub fn is_root(&self) -> bool {
        self.0 == ROOT_TAG
    }

    /// Returns the tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Creation timestamp embedded in a generated tag.
    pub fn timestamp(&self) -> Option<&str> {
        if self.0.len() == TAG_LEN {
            self.0.get(..TIMESTAMP_LEN)
        } else {
            None
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Tag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for Tag {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<String> for Tag {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Tag {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.0
    }
}

impl PartialEq<str> for Tag {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Tag {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Produces timestamps and tags from a [`Clock`].
#[derive(Debug, Clone)]
pub struct TagGenerator {
    clock: Arc<dyn Clock>,
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl TagGenerator {
    /// Creates a generator reading time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// The clock backing this generator.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Current time as a 9-character order-preserving timestamp.
    pub fn now(&self) -> String {
        let ts = encode_base64_padded(self.clock.now_micros(), TIMESTAMP_LEN);
        debug_assert_eq!(ts.len(), TIMESTAMP_LEN);
        ts
    }

    /// Generates a fresh 22-character tag.
    pub fn generate(&self) -> Tag {
        let mut id = self.now();
        let mut rng = rand::thread_rng();
        for _ in 0..TAG_RANDOM_LEN {
            id.push(char::from(ORDER_PRESERVING_ALPHABET[rng.gen_range(0..64)]));
        }
        debug_assert_eq!(id.len(), TAG_LEN);
        Tag(id)
    }
}

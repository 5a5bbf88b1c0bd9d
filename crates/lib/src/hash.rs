//! Convergence fingerprints for CRDT nodes.
//!
//! A node's hash covers exactly its mutable state. Two replicas holding the
//! same subtree compute the same hash, so comparing hashes top-down finds the
//! diverged branches without shipping their contents (Merkle-style).

use crate::codec::Writer;
use crate::tag::encode_base64_padded;

/// Number of digest bytes kept from the underlying BLAKE3 output.
const DIGEST_LEN: usize = 16;

/// Width of each rendered 32-bit word.
const WORD_WIDTH: usize = 6;

/// Hashes `bytes` into a fixed 24-character fingerprint.
///
/// The fingerprint is the first 16 bytes of BLAKE3, rendered as four
/// big-endian words in order-preserving base64.
pub fn digest(bytes: &[u8]) -> String {
    let hash = blake3::hash(bytes);
    let digest = &hash.as_bytes()[..DIGEST_LEN];
    digest
        .chunks_exact(4)
        .map(|word| {
            let n = u32::from_be_bytes([word[0], word[1], word[2], word[3]]);
            encode_base64_padded(u64::from(n), WORD_WIDTH)
        })
        .collect()
}

/// Accumulates the canonical encoding of a node's state before hashing.
#[derive(Debug, Default)]
pub struct Hasher {
    writer: Writer,
}

impl Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a length-prefixed string to the canonical encoding.
    pub fn update(&mut self, s: &str) -> &mut Self {
        self.writer.write_string(s);
        self
    }

    pub fn finish(&self) -> String {
        digest(self.writer.as_slice())
    }
}

//! Stable hashing helpers for procedures, manifests, and chunk digests.

use blake3::Hasher;
use serde::Serialize;

use crate::chunk::Chunk;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub fn to_hex(&self) -> String {
        // blake3 hex(32b) is 64 hex chars
        let mut s = String::with_capacity(64);
        for b in &self.0 {
            use std::fmt::Write as _;
            let _ = write!(&mut s, "{:02x}", b);
        }
        s
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

pub fn hash_bytes(bytes: &[u8]) -> Hash256 {
    let mut h = Hasher::new();
    h.update(bytes);
    Hash256(h.finalize().into())
}

/// Hash any serde-serializable value deterministically (via JSON).
pub fn hash_serde<T: Serialize>(v: &T) -> Result<Hash256, crate::error::Error> {
    let bytes = serde_json::to_vec(v)?;
    Ok(hash_bytes(&bytes))
}

/// Digest of a chunk sequence by rows, ignoring how the rows were split into chunks.
///
/// Two streams with the same keys, schemas and row values in the same order hash
/// equal even when one was delivered in a single chunk and the other row by row.
pub fn rows_digest<'a>(chunks: impl IntoIterator<Item = &'a Chunk>) -> Hash256 {
    let mut h = Hasher::new();
    for chunk in chunks {
        for i in 0..chunk.len() {
            chunk.key().hash_into(&mut h);
            for (c, b) in chunk.cols().iter().zip(chunk.buffers()) {
                h.update(c.label.as_bytes());
                h.update(&[0]);
                h.update(c.ty.as_str().as_bytes());
                b.value(i).hash_into(&mut h);
            }
        }
    }
    Hash256(h.finalize().into())
}

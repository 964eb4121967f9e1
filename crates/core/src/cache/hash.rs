//! Content fingerprints for defragmented bodies.

use sha2::{Digest, Sha256};

/// SHA-256 hex digest of a resource body.
pub fn content_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

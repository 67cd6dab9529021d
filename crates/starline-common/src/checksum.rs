//! SHA-256 checksums for staged artifacts

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `data`
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

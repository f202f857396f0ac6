//! Content hashing.

use sha2::{Digest, Sha256};

/// SHA-256 of raw bytes, lowercase hex.
pub fn sha256_bytes(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// SHA-256 of a string, lowercase hex.
pub fn sha256_str(content: &str) -> String {
    sha256_bytes(content.as_bytes())
}

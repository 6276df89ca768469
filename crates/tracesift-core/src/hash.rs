//! Content hashing for stable identifiers

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of a string
pub fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// `<prefix>:<sha256 hex>` identifier
pub fn prefixed_hash(prefix: &str, text: &str) -> String {
    format!("{prefix}:{}", sha256_hex(text))
}

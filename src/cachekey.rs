//! Deterministic cache key construction (spec §3 "Cached object layout").
//!
//! Key shape: `cache/{host}/{hex(sha256(method ‖ url ‖ body))}`.

use sha2::{Digest, Sha256};

/// Builds the cache key for a given (method, url, body) triple. Identical
/// inputs always produce the identical key (spec §8 invariant); changing
/// any one of the three changes the key.
pub fn cache_key(method: &str, url: &url::Url, body: &[u8]) -> String {
    let host = url.host_str().unwrap_or("unknown-host");

    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(url.as_str().as_bytes());
    hasher.update(body);
    let digest = hasher.finalize();

    format!("cache/{host}/{}", hex::encode(digest))
}

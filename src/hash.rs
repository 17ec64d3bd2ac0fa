//! Content fingerprints.
//!
//! Every identity-of-content comparison in the build goes through this
//! module: post input hashes, cached artifact fingerprints, membership
//! hashes. Digests are SHA-256 rendered as lowercase hex, so they are
//! stable across processes and safe to persist in the cache manifest.
//!
//! Multi-part hashes are length-prefixed per part. Without the prefix
//! `("ab", "c")` and `("a", "bc")` would collide.

use sha2::{Digest, Sha256};

/// Hash content together with an auxiliary context string.
///
/// The context is a namespace tag such as a template or artifact name, so
/// the same bytes hashed for two different purposes never share a key.
pub fn hash_with_context(context: &str, content: &[u8]) -> String {
    hash_parts([context.as_bytes(), content])
}

/// Hash an ordered sequence of parts.
pub fn hash_parts<'a, I>(parts: I) -> String
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    format!("{:x}", hasher.finalize())
}

//! Record key generation
//!
//! Every entity lives in a flat key-value namespace under a type-prefixed
//! content hash. The prefix keeps entity types sharing a natural key (a URL
//! record and its check-flag, say) from colliding on the same storage key.

use sha2::{Digest, Sha256};

/// Hex characters of the digest kept in a key.
const KEY_DIGEST_LEN: usize = 8;

pub const URL_PREFIX: &str = "url";
pub const GROUP_PREFIX: &str = "group";
pub const CHECK_PREFIX: &str = "check";
pub const WEBHOOK_PREFIX: &str = "webhook";

/// Builds the storage key for a value under the given entity prefix.
pub fn key_for(prefix: &str, value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    let encoded = hex::encode(digest);
    format!("{}:{}", prefix, &encoded[..KEY_DIGEST_LEN])
}

/// Key of the URL record for a checked URL.
pub fn url_key(url: &str) -> String {
    key_for(URL_PREFIX, url)
}

/// Key of the group record for a group name.
pub fn group_key(name: &str) -> String {
    key_for(GROUP_PREFIX, name)
}

/// Key of the in-flight marker for a checked URL.
pub fn check_key(url: &str) -> String {
    key_for(CHECK_PREFIX, url)
}

/// Key of the callback list for a checked URL.
pub fn webhook_key(url: &str) -> String {
    key_for(WEBHOOK_PREFIX, url)
}

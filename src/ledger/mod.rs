//! Dedup ledger
//!
//! Remembers the fingerprint of every fact that went out so the same text is
//! never posted twice.

mod store;

pub use store::Ledger;

use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 of `title + "|" + body`, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Derive the fingerprint of a title/body pair
    pub fn of(title: &str, body: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(title.as_bytes());
        hasher.update(b"|");
        hasher.update(body.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

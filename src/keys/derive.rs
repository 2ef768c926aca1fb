//! Cache-key derivation from a source's version signal.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

use crate::cache::CacheValue;
use crate::error::Result;
use crate::keys::ConfigSource;

/// Hex characters of the SHA-256 kept in content-hash keys.
const HASH_PREFIX_LEN: usize = 16;

/// What makes one version of a source distinguishable from another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSignal {
    /// Nanoseconds since the Unix epoch
    Mtime(u128),
    /// Leading hex digits of the SHA-256 of the canonical JSON payload
    ContentHash(String),
}

impl VersionSignal {
    pub fn from_mtime(mtime: SystemTime) -> Self {
        let nanos = mtime
            .duration_since(UNIX_EPOCH)
            .map(|since| since.as_nanos())
            .unwrap_or(0);
        VersionSignal::Mtime(nanos)
    }
}

impl fmt::Display for VersionSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSignal::Mtime(nanos) => write!(f, "mtime-{nanos}"),
            VersionSignal::ContentHash(hash) => write!(f, "sha256-{hash}"),
        }
    }
}

/// A derived key, plus the payload when deriving it required a load.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedKey {
    pub key: String,
    pub version: VersionSignal,
    pub loaded: Option<CacheValue>,
}

/// Builds `source_type:identity:version`.
///
/// With a modification time the source is not loaded. Otherwise it is loaded
/// once, hashed, and the payload is returned in [`DerivedKey::loaded`]. Load
/// failures propagate.
pub fn derive_key(source: &dyn ConfigSource) -> Result<DerivedKey> {
    let (version, loaded) = match source.modified_at() {
        Some(mtime) => (VersionSignal::from_mtime(mtime), None),
        None => {
            let value = source.load()?;
            (VersionSignal::ContentHash(content_hash(&value)?), Some(value))
        }
    };

    Ok(DerivedKey {
        key: format!("{}:{}:{}", source.source_type(), source.identity(), version),
        version,
        loaded,
    })
}

/// SHA-256 of the value's JSON encoding, truncated to 16 hex characters.
/// Object keys serialize in sorted order, so equal values hash equally.
pub fn content_hash(value: &CacheValue) -> Result<String> {
    let bytes = serde_json::to_vec(value)?;
    let digest = format!("{:x}", Sha256::digest(&bytes));
    Ok(digest[..HASH_PREFIX_LEN].to_string())
}

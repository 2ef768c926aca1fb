//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL, tags and
//! access bookkeeping.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::CacheValue;

/// Set of labels attached to an entry for bulk invalidation.
pub type TagSet = BTreeSet<String>;

/// Builds a [`TagSet`] from anything string-like.
///
/// ```
/// use config_cache::cache::tag_set;
///
/// let tags = tag_set(["profile:prod", "file"]);
/// assert!(tags.contains("file"));
/// ```
pub fn tag_set<I, S>(tags: I) -> TagSet
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    tags.into_iter().map(Into::into).collect()
}

// == Expiry ==
/// Time-to-live requested for a `set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiry {
    /// Use the store's configured default TTL
    #[default]
    Default,
    /// Never expires, regardless of the store default
    Never,
    /// Expires once the entry is older than the given duration
    After(Duration),
}

impl Expiry {
    /// Resolves this expiry against a store's default TTL.
    pub fn resolve(self, default_ttl: Option<Duration>) -> Option<Duration> {
        match self {
            Expiry::Default => default_ttl,
            Expiry::Never => None,
            Expiry::After(ttl) => Some(ttl),
        }
    }
}

impl From<Duration> for Expiry {
    fn from(ttl: Duration) -> Self {
        Expiry::After(ttl)
    }
}

impl From<Option<Duration>> for Expiry {
    fn from(ttl: Option<Duration>) -> Self {
        ttl.map_or(Expiry::Default, Expiry::After)
    }
}

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The stored value
    pub value: CacheValue,
    /// Time-to-live measured from `created_at`, None = no expiration
    pub ttl: Option<Duration>,
    /// Labels used by `delete_by_tags`
    pub tags: TagSet,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    /// Number of successful lookups
    pub access_count: u64,
    /// Approximate serialized size, used for reporting only
    pub size_bytes: usize,
    /// Store-assigned insertion tick (FIFO tie-break)
    pub insert_seq: u64,
    /// Store-assigned tick of the latest touch (LRU tie-break)
    pub access_seq: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `ttl` - Optional time-to-live
    /// * `tags` - Labels for bulk invalidation
    /// * `now` - Creation time, taken from the owning store's clock
    /// * `seq` - Logical tick assigned by the owning store
    pub fn new(
        value: CacheValue,
        ttl: Option<Duration>,
        tags: TagSet,
        now: DateTime<Utc>,
        seq: u64,
    ) -> Self {
        let size_bytes = estimate_size(&value);
        Self {
            value,
            ttl,
            tags,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
            size_bytes,
            insert_seq: seq,
            access_seq: seq,
        }
    }

    // == Touch ==
    /// Records a successful access and returns the value.
    pub fn touch(&mut self, now: DateTime<Utc>, seq: u64) -> &CacheValue {
        self.access_count += 1;
        self.last_accessed_at = now.max(self.created_at);
        self.access_seq = seq;
        &self.value
    }

    /// Time elapsed since creation; zero if the clock reads earlier.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or(Duration::ZERO)
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// Boundary condition: the comparison is strict, so an entry whose age is
    /// exactly its TTL is still valid.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.ttl {
            Some(ttl) => self.age(now) > ttl,
            None => false,
        }
    }

    /// Remaining lifetime, `Some(ZERO)` once expired, `None` without a TTL.
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.ttl.map(|ttl| ttl.saturating_sub(self.age(now)))
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn has_any_tag(&self, tags: &TagSet) -> bool {
        !self.tags.is_disjoint(tags)
    }
}

// == Utility Functions ==
/// Best-effort size estimate of a value: its compact JSON length.
pub fn estimate_size(value: &CacheValue) -> usize {
    serde_json::to_vec(value).map(|bytes| bytes.len()).unwrap_or(0)
}

//! Backend Contract
//!
//! The store interface shared by the memory, file and null backends.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use glob::Pattern;

use crate::cache::{
    system_clock, CacheEvent, CacheStats, CacheValue, Clock, EventCallback, EvictionPolicy, Expiry,
    TagSet,
};
use crate::error::Result;
use crate::tasks::Sweeper;

// == Store Options ==
/// Construction parameters shared by the memory and file backends.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Capacity in entries (memory) or entry files (file)
    pub max_size: usize,
    /// TTL applied by `Expiry::Default`
    pub default_ttl: Option<Duration>,
    /// Victim selection for the memory backend; the file backend always
    /// prunes its oldest files
    pub eviction_policy: EvictionPolicy,
    /// Sweep period; zero disables the background sweep
    pub cleanup_interval: Duration,
    pub clock: Arc<dyn Clock>,
}

impl StoreOptions {
    pub fn new(max_size: usize, eviction_policy: EvictionPolicy) -> Self {
        Self {
            max_size,
            default_ttl: None,
            eviction_policy,
            cleanup_interval: Duration::ZERO,
            clock: system_clock(),
        }
    }

    pub fn default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

// == Cache Backend ==
/// A concurrency-safe key/value store for derived configuration data.
///
/// Misses are never errors: `get` returns `None` for absent and expired keys.
/// The bulk helpers are defined in terms of the single-key operations and
/// carry no atomicity guarantee across the batch.
pub trait CacheBackend: Send + Sync {
    /// Short backend name used in logs, events and reports.
    fn name(&self) -> &'static str;

    fn get(&self, key: &str) -> Option<CacheValue>;

    /// Stores `value`, replacing any previous entry under `key`.
    fn set(&self, key: &str, value: CacheValue, expiry: Expiry, tags: TagSet) -> Result<()>;

    /// Removes `key`; returns whether anything was removed.
    fn delete(&self, key: &str) -> bool;

    fn clear(&self);

    /// Liveness check; purges the entry if it has expired.
    fn exists(&self, key: &str) -> bool;

    /// Removes every entry carrying at least one of `tags`; returns the count.
    fn delete_by_tags(&self, tags: &TagSet) -> usize;

    /// Sorted snapshot of live keys, optionally filtered by a glob pattern.
    fn keys(&self, pattern: Option<&str>) -> Result<Vec<String>>;

    fn stats(&self) -> CacheStats;

    fn reset_stats(&self);

    /// Subtracts counters recorded by internal traffic (the health probe)
    /// so they never show up in reported stats.
    fn discount_stats(&self, counted: &CacheStats);

    /// Removes every expired entry; returns the count. Body of the sweep.
    fn purge_expired(&self) -> usize;

    fn on(&self, event: CacheEvent, callback: EventCallback);

    /// True for backends that store nothing; such a backend is never
    /// health-probed.
    fn is_passthrough(&self) -> bool {
        false
    }

    /// The background sweep worker, if this backend runs one.
    fn sweeper(&self) -> Option<&Sweeper> {
        None
    }

    fn get_many(&self, keys: &[&str]) -> HashMap<String, CacheValue> {
        keys.iter()
            .filter_map(|key| self.get(key).map(|value| (key.to_string(), value)))
            .collect()
    }

    fn set_many(&self, items: Vec<(String, CacheValue)>, expiry: Expiry, tags: &TagSet) -> Result<()> {
        for (key, value) in items {
            self.set(&key, value, expiry, tags.clone())?;
        }
        Ok(())
    }

    fn delete_many(&self, keys: &[&str]) -> usize {
        keys.iter().filter(|key| self.delete(key)).count()
    }
}

// == Helpers ==
/// Compiles an optional glob filter for `keys`.
pub fn compile_pattern(pattern: Option<&str>) -> Result<Option<Pattern>> {
    Ok(pattern.map(Pattern::new).transpose()?)
}

/// Applies a compiled glob filter and sorts the result.
pub fn filter_keys<I>(keys: I, pattern: Option<&Pattern>) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut keys: Vec<String> = keys
        .into_iter()
        .filter(|key| pattern.map_or(true, |p| p.matches(key)))
        .collect();
    keys.sort();
    keys
}

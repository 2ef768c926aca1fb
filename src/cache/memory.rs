//! Memory Store Module
//!
//! In-memory cache engine: a key/entry map plus a tag index, guarded by one
//! mutex, with policy-driven eviction and TTL expiration.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::cache::backend::{compile_pattern, filter_keys};
use crate::cache::{
    CacheBackend, CacheEntry, CacheEvent, CacheStats, CacheValue, Clock, EventCallback,
    EventHooks, EvictionPolicy, Expiry, PendingEvents, StoreOptions, TagSet,
};
use crate::error::{CacheError, Result};
use crate::tasks::{Sweep, Sweeper};

const BACKEND_NAME: &str = "memory";

// == Memory State ==
/// Everything the store lock protects. `entries` and `tag_index` are only
/// ever changed together through `insert`/`remove`.
#[derive(Debug)]
struct MemoryState {
    entries: HashMap<String, CacheEntry>,
    /// tag -> keys carrying it; empty buckets are removed immediately
    tag_index: HashMap<String, HashSet<String>>,
    stats: CacheStats,
    /// Logical clock for deterministic tie-breaks
    seq: u64,
}

impl MemoryState {
    fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            tag_index: HashMap::new(),
            stats: CacheStats::new(max_size),
            seq: 0,
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn insert(&mut self, key: String, entry: CacheEntry) {
        for tag in &entry.tags {
            self.tag_index
                .entry(tag.clone())
                .or_default()
                .insert(key.clone());
        }
        let memory = self.stats.total_memory_used + entry.size_bytes;
        self.entries.insert(key, entry);
        self.stats.set_current_size(self.entries.len(), memory);
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        for tag in &entry.tags {
            if let Some(keys) = self.tag_index.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tag_index.remove(tag);
                }
            }
        }
        let memory = self.stats.total_memory_used.saturating_sub(entry.size_bytes);
        self.stats.set_current_size(self.entries.len(), memory);
        Some(entry)
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.tag_index.clear();
        self.stats.set_current_size(0, 0);
    }

    fn expired_keys(&self, now: DateTime<Utc>) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn tag_index_consistent(&self) -> bool {
        let forward = self.entries.iter().all(|(key, entry)| {
            entry
                .tags
                .iter()
                .all(|tag| self.tag_index.get(tag).is_some_and(|keys| keys.contains(key)))
        });
        let backward = self.tag_index.iter().all(|(tag, keys)| {
            !keys.is_empty()
                && keys
                    .iter()
                    .all(|key| self.entries.get(key).is_some_and(|e| e.has_tag(tag)))
        });
        forward && backward
    }
}

// == Memory Core ==
/// Shared between the store handle and its sweep worker.
struct MemoryCore {
    state: Mutex<MemoryState>,
    max_size: usize,
    default_ttl: Option<Duration>,
    policy: EvictionPolicy,
    clock: Arc<dyn Clock>,
    hooks: EventHooks,
}

impl Sweep for MemoryCore {
    fn label(&self) -> &'static str {
        BACKEND_NAME
    }

    fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut events = PendingEvents::new();

        let removed = {
            let mut state = self.state.lock();
            let expired = state.expired_keys(now);
            for key in &expired {
                state.remove(key);
                state.stats.record_expiration();
                events.push(CacheEvent::Expire, key.as_str());
            }
            expired.len()
        };

        self.hooks.dispatch(events);
        removed
    }
}

// == Memory Store ==
/// In-memory cache storage with policy-driven eviction, tags and TTL support.
///
/// # Example
/// ```
/// use config_cache::cache::{CacheBackend, EvictionPolicy, Expiry, MemoryStore, TagSet};
/// use serde_json::json;
///
/// let cache = MemoryStore::new(2, EvictionPolicy::Lru);
/// cache.set("k1", json!("v1"), Expiry::Default, TagSet::new()).unwrap();
/// cache.set("k2", json!("v2"), Expiry::Default, TagSet::new()).unwrap();
/// cache.get("k1");
/// cache.set("k3", json!("v3"), Expiry::Default, TagSet::new()).unwrap();
///
/// assert!(!cache.exists("k2"));
/// assert!(cache.exists("k1"));
/// assert!(cache.exists("k3"));
/// ```
pub struct MemoryStore {
    core: Arc<MemoryCore>,
    sweeper: Option<Sweeper>,
}

impl MemoryStore {
    // == Constructors ==
    /// Creates a store with no default TTL and no background sweep.
    pub fn new(max_size: usize, policy: EvictionPolicy) -> Self {
        Self::with_options(StoreOptions::new(max_size, policy))
    }

    /// Creates a store from full options. A non-zero cleanup interval starts
    /// the sweep worker on the current tokio runtime.
    pub fn with_options(options: StoreOptions) -> Self {
        let core = Arc::new(MemoryCore {
            state: Mutex::new(MemoryState::new(options.max_size)),
            max_size: options.max_size,
            default_ttl: options.default_ttl,
            policy: options.eviction_policy,
            clock: options.clock,
            hooks: EventHooks::new(BACKEND_NAME),
        });

        let sweeper = Sweeper::spawn(core.clone(), options.cleanup_interval);

        debug!(
            max_size = options.max_size,
            policy = %options.eviction_policy,
            sweeping = sweeper.is_some(),
            "Memory cache store created"
        );

        Self { core, sweeper }
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.core.policy
    }

    pub fn max_size(&self) -> usize {
        self.core.max_size
    }

    // == Length ==
    /// Returns the current number of stored entries, expired ones included
    /// until they are purged.
    pub fn len(&self) -> usize {
        self.core.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.state.lock().entries.is_empty()
    }

    /// Keys currently indexed under `tag`, sorted.
    pub fn keys_with_tag(&self, tag: &str) -> Vec<String> {
        let state = self.core.state.lock();
        let mut keys: Vec<String> = state
            .tag_index
            .get(tag)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Copy of the stored entry without touching its access metadata.
    pub fn peek_entry(&self, key: &str) -> Option<CacheEntry> {
        self.core.state.lock().entries.get(key).cloned()
    }

    /// Verifies the two-way agreement between entries and the tag index.
    pub fn tag_index_consistent(&self) -> bool {
        self.core.state.lock().tag_index_consistent()
    }

    /// Stops the background sweep and waits for it; idempotent.
    pub async fn shutdown(&self) {
        if let Some(sweeper) = &self.sweeper {
            sweeper.shutdown().await;
        }
    }
}

impl CacheBackend for MemoryStore {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    // == Get ==
    /// Returns the value if found and not expired. Expired entries are
    /// removed and counted both as a miss and as an expiration.
    fn get(&self, key: &str) -> Option<CacheValue> {
        let now = self.core.clock.now();
        let mut events = PendingEvents::new();

        let value = {
            let mut state = self.core.state.lock();
            match state.entries.get(key).map(|entry| entry.is_expired(now)) {
                None => {
                    state.stats.record_miss();
                    events.push(CacheEvent::Miss, key);
                    None
                }
                Some(true) => {
                    state.stats.record_miss();
                    events.push(CacheEvent::Miss, key);
                    state.remove(key);
                    state.stats.record_expiration();
                    events.push(CacheEvent::Expire, key);
                    None
                }
                Some(false) => {
                    let seq = state.next_seq();
                    state.stats.record_hit();
                    events.push(CacheEvent::Hit, key);
                    state
                        .entries
                        .get_mut(key)
                        .map(|entry| entry.touch(now, seq).clone())
                }
            }
        };

        self.core.hooks.dispatch(events);
        value
    }

    // == Set ==
    /// Stores a key-value pair.
    ///
    /// An existing entry is removed (with its tags) before the new one is
    /// inserted and never triggers eviction; if it had already expired, the
    /// removal counts as an expiration. A new key at capacity evicts one
    /// entry chosen by the policy; if the policy selects none, the insert is
    /// refused with [`CacheError::CacheFull`].
    fn set(&self, key: &str, value: CacheValue, expiry: Expiry, tags: TagSet) -> Result<()> {
        let now = self.core.clock.now();
        let ttl = expiry.resolve(self.core.default_ttl);
        let mut events = PendingEvents::new();

        let result = {
            let mut state = self.core.state.lock();
            let replaced = match state.remove(key) {
                Some(old) if old.is_expired(now) => {
                    state.stats.record_expiration();
                    events.push(CacheEvent::Expire, key);
                    false
                }
                Some(_) => true,
                None => false,
            };

            if !replaced && state.entries.len() >= self.core.max_size {
                let needed = state.entries.len() + 1 - self.core.max_size;
                let victims = self.core.policy.select_victims(
                    state.entries.iter().map(|(k, e)| (k.as_str(), e)),
                    needed,
                    now,
                );
                for victim in victims {
                    if state.remove(&victim).is_some() {
                        state.stats.record_eviction();
                        events.push(CacheEvent::Evict, victim);
                    }
                }
            }

            if !replaced && state.entries.len() >= self.core.max_size {
                Err(CacheError::CacheFull(format!(
                    "{} entries stored and the {} policy selected no victim for '{}'",
                    state.entries.len(),
                    self.core.policy,
                    key
                )))
            } else {
                let seq = state.next_seq();
                state.insert(key.to_string(), CacheEntry::new(value, ttl, tags, now, seq));
                state.stats.record_set();
                events.push(CacheEvent::Set, key);
                Ok(())
            }
        };

        if let Err(err) = &result {
            warn!(key, error = %err, "Cache insert refused");
        }

        self.core.hooks.dispatch(events);
        result
    }

    // == Delete ==
    fn delete(&self, key: &str) -> bool {
        let mut events = PendingEvents::new();
        let removed = {
            let mut state = self.core.state.lock();
            let removed = state.remove(key).is_some();
            if removed {
                state.stats.record_delete();
                events.push(CacheEvent::Delete, key);
            }
            removed
        };
        self.core.hooks.dispatch(events);
        removed
    }

    fn clear(&self) {
        let cleared = {
            let mut state = self.core.state.lock();
            let count = state.entries.len();
            state.clear();
            count
        };
        debug!(cleared, "Memory cache cleared");

        let mut events = PendingEvents::new();
        events.push_keyless(CacheEvent::Clear);
        self.core.hooks.dispatch(events);
    }

    fn exists(&self, key: &str) -> bool {
        let now = self.core.clock.now();
        let mut events = PendingEvents::new();

        let live = {
            let mut state = self.core.state.lock();
            match state.entries.get(key).map(|entry| entry.is_expired(now)) {
                None => false,
                Some(true) => {
                    state.remove(key);
                    state.stats.record_expiration();
                    events.push(CacheEvent::Expire, key);
                    false
                }
                Some(false) => true,
            }
        };

        self.core.hooks.dispatch(events);
        live
    }

    fn delete_by_tags(&self, tags: &TagSet) -> usize {
        let mut events = PendingEvents::new();

        let removed = {
            let mut state = self.core.state.lock();
            let targets: HashSet<String> = tags
                .iter()
                .filter_map(|tag| state.tag_index.get(tag))
                .flat_map(|keys| keys.iter().cloned())
                .collect();

            let mut removed = 0;
            for key in targets {
                if state.remove(&key).is_some() {
                    state.stats.record_delete();
                    events.push(CacheEvent::Delete, key);
                    removed += 1;
                }
            }
            removed
        };

        debug!(?tags, removed, "Deleted entries by tag");
        self.core.hooks.dispatch(events);
        removed
    }

    fn keys(&self, pattern: Option<&str>) -> Result<Vec<String>> {
        let pattern = compile_pattern(pattern)?;
        let now = self.core.clock.now();

        let live: Vec<String> = {
            let state = self.core.state.lock();
            state
                .entries
                .iter()
                .filter(|(_, entry)| !entry.is_expired(now))
                .map(|(key, _)| key.clone())
                .collect()
        };

        Ok(filter_keys(live, pattern.as_ref()))
    }

    fn stats(&self) -> CacheStats {
        self.core.state.lock().stats.clone()
    }

    fn reset_stats(&self) {
        self.core.state.lock().stats.reset();
    }

    fn discount_stats(&self, counted: &CacheStats) {
        self.core.state.lock().stats.discount(counted);
    }

    fn purge_expired(&self) -> usize {
        self.core.purge_expired()
    }

    fn on(&self, event: CacheEvent, callback: EventCallback) {
        self.core.hooks.register(event, callback);
    }

    fn sweeper(&self) -> Option<&Sweeper> {
        self.sweeper.as_ref()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("max_size", &self.core.max_size)
            .field("policy", &self.core.policy)
            .field("default_ttl", &self.core.default_ttl)
            .field("sweeper", &self.sweeper)
            .finish()
    }
}

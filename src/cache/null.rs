//! Null Store Module
//!
//! A backend that accepts writes and misses on every read. Swapped in to
//! disable caching without changing call sites.

use parking_lot::Mutex;

use crate::cache::backend::compile_pattern;
use crate::cache::{
    CacheBackend, CacheEvent, CacheStats, CacheValue, EventCallback, EventHooks, Expiry,
    PendingEvents, TagSet,
};
use crate::error::Result;

const BACKEND_NAME: &str = "null";

/// Stores nothing. `set` and `delete` still count, so callers inspecting
/// `stats.sets`/`stats.deletes` see the same numbers whether or not caching
/// is active.
#[derive(Debug)]
pub struct NullStore {
    stats: Mutex<CacheStats>,
    hooks: EventHooks,
}

impl NullStore {
    pub fn new() -> Self {
        Self {
            stats: Mutex::new(CacheStats::new(0)),
            hooks: EventHooks::new(BACKEND_NAME),
        }
    }

    fn fire(&self, event: CacheEvent, key: Option<&str>) {
        let mut events = PendingEvents::new();
        match key {
            Some(key) => events.push(event, key),
            None => events.push_keyless(event),
        }
        self.hooks.dispatch(events);
    }
}

impl Default for NullStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheBackend for NullStore {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn get(&self, key: &str) -> Option<CacheValue> {
        self.stats.lock().record_miss();
        self.fire(CacheEvent::Miss, Some(key));
        None
    }

    fn set(&self, key: &str, _value: CacheValue, _expiry: Expiry, _tags: TagSet) -> Result<()> {
        self.stats.lock().record_set();
        self.fire(CacheEvent::Set, Some(key));
        Ok(())
    }

    fn delete(&self, key: &str) -> bool {
        self.stats.lock().record_delete();
        self.fire(CacheEvent::Delete, Some(key));
        false
    }

    fn clear(&self) {
        self.fire(CacheEvent::Clear, None);
    }

    fn exists(&self, _key: &str) -> bool {
        false
    }

    fn delete_by_tags(&self, _tags: &TagSet) -> usize {
        0
    }

    fn keys(&self, pattern: Option<&str>) -> Result<Vec<String>> {
        compile_pattern(pattern)?;
        Ok(Vec::new())
    }

    fn stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }

    fn reset_stats(&self) {
        self.stats.lock().reset();
    }

    fn discount_stats(&self, counted: &CacheStats) {
        self.stats.lock().discount(counted);
    }

    fn purge_expired(&self) -> usize {
        0
    }

    fn on(&self, event: CacheEvent, callback: EventCallback) {
        self.hooks.register(event, callback);
    }

    fn is_passthrough(&self) -> bool {
        true
    }
}

//! Cache Module
//!
//! The cache engine: entries with TTL and tags, pluggable eviction policies,
//! and three interchangeable backends (memory, file, null).

mod backend;
mod clock;
mod entry;
mod events;
mod file;
mod memory;
mod null;
mod policy;
mod stats;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use backend::{compile_pattern, filter_keys, CacheBackend, StoreOptions};
pub use clock::{system_clock, Clock, ManualClock, SystemClock};
pub use entry::{estimate_size, tag_set, CacheEntry, Expiry, TagSet};
pub use events::{CacheEvent, EventCallback, EventContext, EventHooks, PendingEvents};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use null::NullStore;
pub use policy::EvictionPolicy;
pub use stats::CacheStats;

/// Payload type held by every backend: a JSON-shaped configuration tree.
pub type CacheValue = serde_json::Value;

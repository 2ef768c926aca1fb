//! Config Cache - caching layer for configuration management
//!
//! Stores derived configuration data keyed by a fingerprint of its origin,
//! with pluggable eviction, tag invalidation, TTL expiry and memory, file or
//! null backends behind a single manager facade.
//!
//! ```
//! use config_cache::cache::{tag_set, CacheBackend, EvictionPolicy, Expiry, MemoryStore};
//! use serde_json::json;
//!
//! let store = MemoryStore::new(100, EvictionPolicy::Lru);
//! store.set("file:/etc/app.json:mtime-1", json!({"port": 8080}), Expiry::Default, tag_set(["file"]))?;
//! assert_eq!(store.get("file:/etc/app.json:mtime-1"), Some(json!({"port": 8080})));
//! # Ok::<(), config_cache::CacheError>(())
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod keys;
pub mod manager;
pub mod models;
pub mod tasks;

pub use api::{create_router, AppState};
pub use cache::{CacheBackend, CacheEvent, CacheValue, EvictionPolicy, Expiry};
pub use config::{BackendKind, CacheConfig, Config};
pub use error::{CacheError, Result};
pub use keys::{derive_key, ConfigSource, SourceCache};
pub use manager::{CacheManager, HealthReport, HealthStatus};

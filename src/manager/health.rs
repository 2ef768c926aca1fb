//! Health Check
//!
//! A set → get → delete round-trip against a private, randomly named key.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::cache::{CacheBackend, CacheStats, Expiry, TagSet};

/// Prefix of the probe key; the full key is `<prefix>:<uuid v4>`.
pub const HEALTH_KEY_PREFIX: &str = "__config_cache_health__";

/// Probe entries expire on their own if the delete step never runs.
const PROBE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    /// Caching is off (manager disabled or null backend); nothing was probed
    Disabled,
}

/// Outcome of [`CacheManager::health_check`](super::CacheManager::health_check).
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub backend: &'static str,
    pub stats: CacheStats,
    pub checked_at: DateTime<Utc>,
    pub duration_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the probe ran in a reduced form
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl HealthReport {
    /// `Disabled` counts as healthy: the subsystem is doing what it was told.
    pub fn is_healthy(&self) -> bool {
        self.status != HealthStatus::Unhealthy
    }
}

/// Runs the round-trip and takes its counts back out of the backend stats.
///
/// A store already at capacity is not written to, since the probe insert
/// would evict a real entry; it is checked with a key listing instead and
/// the returned note says so.
pub(crate) fn probe(backend: &dyn CacheBackend) -> Result<Option<String>, String> {
    let before = backend.stats();
    if before.max_size > 0 && before.current_size >= before.max_size {
        backend
            .keys(None)
            .map_err(|err| format!("probe listing failed: {err}"))?;
        return Ok(Some(format!(
            "store at capacity ({}/{}), write step skipped",
            before.current_size, before.max_size
        )));
    }

    let mut counted = CacheStats::default();
    let result = round_trip(backend, &mut counted);
    backend.discount_stats(&counted);
    result.map(|()| None)
}

/// The delete is attempted even when the read fails.
fn round_trip(backend: &dyn CacheBackend, counted: &mut CacheStats) -> Result<(), String> {
    let token = Uuid::new_v4();
    let key = format!("{HEALTH_KEY_PREFIX}:{token}");
    let value = json!({ "probe": token.to_string() });

    backend
        .set(&key, value.clone(), Expiry::After(PROBE_TTL), TagSet::new())
        .map_err(|err| format!("probe write failed: {err}"))?;
    counted.record_set();

    let found = backend.get(&key);
    if found.is_some() {
        counted.record_hit();
    } else {
        counted.record_miss();
    }
    let read = match found {
        Some(found) if found == value => Ok(()),
        Some(_) => Err("probe value did not round-trip".to_string()),
        None => Err("probe value was not readable after write".to_string()),
    };

    let deleted = backend.delete(&key);
    if deleted {
        counted.record_delete();
    }
    read?;
    if deleted {
        Ok(())
    } else {
        Err("probe entry could not be deleted".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{EvictionPolicy, MemoryStore, NullStore};

    #[test]
    fn test_probe_passes_and_leaves_nothing() {
        let store = MemoryStore::new(10, EvictionPolicy::Lru);
        assert_eq!(probe(&store), Ok(None));
        assert!(store.is_empty());
    }

    #[test]
    fn test_probe_leaves_counters_untouched() {
        let store = MemoryStore::new(10, EvictionPolicy::Lru);
        store.set("real", json!(1), Expiry::Never, TagSet::new()).unwrap();
        store.get("real");
        let before = store.stats();

        probe(&store).unwrap();

        assert_eq!(store.stats(), before);
    }

    #[test]
    fn test_probe_skips_write_on_full_store() {
        let store = MemoryStore::new(2, EvictionPolicy::Lru);
        store.set("a", json!(1), Expiry::Never, TagSet::new()).unwrap();
        store.set("b", json!(2), Expiry::Never, TagSet::new()).unwrap();

        let note = probe(&store).unwrap();

        assert!(note.unwrap().contains("capacity"));
        assert_eq!(store.keys(None).unwrap(), vec!["a", "b"]);
        assert_eq!(store.stats().evictions, 0);
        assert_eq!(store.stats().sets, 2);
    }

    #[test]
    fn test_probe_fails_on_null_store() {
        let store = NullStore::new();
        let err = probe(&store).unwrap_err();
        assert!(err.contains("not readable"));
    }

    #[test]
    fn test_probe_reports_zero_capacity_store() {
        let store = MemoryStore::new(0, EvictionPolicy::Lru);
        let err = probe(&store).unwrap_err();
        assert!(err.starts_with("probe write failed"));
    }
}

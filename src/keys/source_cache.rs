//! Source Cache
//!
//! The get-or-load loop a configuration manager runs against the cache:
//! derive a key per source, serve hits, load and store on miss. Also memoizes
//! the validated result of merging all sources.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::{tag_set, CacheValue, Expiry, TagSet};
use crate::error::Result;
use crate::keys::{derive_key, ConfigSource};
use crate::manager::CacheManager;

/// Key under which the validated, merged configuration is memoized.
pub const VALIDATED_CONFIG_KEY: &str = "validated_config";

const VALIDATED_TAG: &str = "validated";

/// Tags attached to every cached payload of `source`:
/// `source:<type>` and `source:<type>:<identity>`.
pub fn source_tags(source: &dyn ConfigSource) -> TagSet {
    tag_set([
        format!("source:{}", source.source_type()),
        source_identity_tag(source),
    ])
}

fn source_identity_tag(source: &dyn ConfigSource) -> String {
    format!("source:{}:{}", source.source_type(), source.identity())
}

#[derive(Debug, Clone)]
pub struct SourceCache {
    manager: Arc<CacheManager>,
}

impl SourceCache {
    pub fn new(manager: Arc<CacheManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<CacheManager> {
        &self.manager
    }

    /// Returns the source's payload, from cache when its current version is
    /// stored, otherwise loading it and caching the result.
    ///
    /// Storing a new version first drops older versions of the same source.
    /// A failed cache write is logged; the loaded payload is still returned.
    pub fn load(&self, source: &dyn ConfigSource) -> Result<CacheValue> {
        let derived = derive_key(source)?;

        if let Some(value) = self.manager.get(&derived.key) {
            return Ok(value);
        }

        let value = match derived.loaded {
            Some(value) => value,
            None => source.load()?,
        };

        let stale = self
            .manager
            .delete_by_tags(&tag_set([source_identity_tag(source)]));
        if stale > 0 {
            debug!(source = %source.identity(), stale, "Dropped outdated source versions");
        }

        if let Err(err) = self
            .manager
            .set(&derived.key, value.clone(), Expiry::Default, source_tags(source))
        {
            warn!(key = %derived.key, error = %err, "Failed to cache loaded source");
        }
        Ok(value)
    }

    /// Loads every source in order; stops at the first failure.
    pub fn load_all(&self, sources: &[&dyn ConfigSource]) -> Result<Vec<CacheValue>> {
        sources.iter().map(|source| self.load(*source)).collect()
    }

    /// Returns the memoized validated configuration, running `compute` and
    /// storing its result on a miss. Errors from `compute` are not cached.
    pub fn validated<F>(&self, compute: F) -> Result<CacheValue>
    where
        F: FnOnce() -> Result<CacheValue>,
    {
        if let Some(value) = self.manager.get(VALIDATED_CONFIG_KEY) {
            return Ok(value);
        }

        let value = compute()?;
        if let Err(err) = self.manager.set(
            VALIDATED_CONFIG_KEY,
            value.clone(),
            Expiry::Default,
            tag_set([VALIDATED_TAG]),
        ) {
            warn!(error = %err, "Failed to cache validated configuration");
        }
        Ok(value)
    }

    /// Drops only the validated result; per-source payloads stay cached and
    /// are revalidated by their version signals.
    pub fn reload(&self) -> bool {
        self.manager.delete(VALIDATED_CONFIG_KEY)
    }

    /// Drops every cached version of `source` and the validated result.
    pub fn invalidate_source(&self, source: &dyn ConfigSource) -> usize {
        let removed = self
            .manager
            .delete_by_tags(&tag_set([source_identity_tag(source), VALIDATED_TAG.to_string()]));
        debug!(source = %source.identity(), removed, "Invalidated source");
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::error::CacheError;
    use crate::keys::FileSource;
    use serde_json::json;
    use std::cell::Cell;
    use std::fs;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn source_cache() -> SourceCache {
        let config = CacheConfig::default().cleanup_interval(Duration::ZERO);
        SourceCache::new(Arc::new(CacheManager::new(config).unwrap()))
    }

    fn write_json(path: &std::path::Path, body: &str, mtime: SystemTime) {
        fs::write(path, body).unwrap();
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(mtime).unwrap();
    }

    #[test]
    fn test_load_caches_until_mtime_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.json");
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        write_json(&path, r#"{"v": 1}"#, t0);

        let cache = source_cache();
        let source = FileSource::new(&path);
        assert_eq!(cache.load(&source).unwrap(), json!({"v": 1}));

        // Same mtime: the stale cached payload is served
        write_json(&path, r#"{"v": 2}"#, t0);
        assert_eq!(cache.load(&source).unwrap(), json!({"v": 1}));

        write_json(&path, r#"{"v": 2}"#, t0 + Duration::from_secs(1));
        assert_eq!(cache.load(&source).unwrap(), json!({"v": 2}));
        assert_eq!(cache.manager().keys(Some("file:*")).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_load_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{").unwrap();

        let cache = source_cache();
        let err = cache.load(&FileSource::new(&path)).unwrap_err();
        assert!(matches!(err, CacheError::SourceLoad { .. }));
        assert!(cache.manager().keys(None).unwrap().is_empty());
    }

    #[test]
    fn test_validated_memoizes_and_reload_clears() {
        let cache = source_cache();
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            Ok(json!({"merged": true}))
        };

        cache.validated(compute).unwrap();
        cache.validated(compute).unwrap();
        assert_eq!(calls.get(), 1);

        assert!(cache.reload());
        assert!(!cache.reload());
        cache.validated(compute).unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_invalidate_source_drops_validated_result() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.json");
        fs::write(&path, r#"{"v": 1}"#).unwrap();

        let cache = source_cache();
        let source = FileSource::new(&path);
        cache.load(&source).unwrap();
        cache.validated(|| Ok(json!("ok"))).unwrap();

        assert_eq!(cache.invalidate_source(&source), 2);
        assert!(cache.manager().keys(None).unwrap().is_empty());
    }
}

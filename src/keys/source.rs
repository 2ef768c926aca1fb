//! Configuration sources as seen by the cache: something with a type, an
//! identity, an optional modification time and a way to load its contents.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde_json::{Map, Value};

use crate::cache::CacheValue;
use crate::error::{CacheError, Result};

/// A configuration origin whose parsed contents can be cached.
pub trait ConfigSource: Send + Sync {
    /// Short kind name, first component of the cache key (`file`, `env`).
    fn source_type(&self) -> &str;

    /// Stable identity within the source type, such as a path.
    fn identity(&self) -> String;

    /// Last modification time, if the origin has one. When present the
    /// cache key is derived from it without loading the source.
    fn modified_at(&self) -> Option<SystemTime>;

    fn load(&self) -> Result<CacheValue>;
}

// == File Source ==
/// A JSON document on disk. Versioned by its modification time.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for FileSource {
    fn source_type(&self) -> &str {
        "file"
    }

    fn identity(&self) -> String {
        self.path.display().to_string()
    }

    fn modified_at(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).and_then(|meta| meta.modified()).ok()
    }

    fn load(&self) -> Result<CacheValue> {
        let bytes =
            fs::read(&self.path).map_err(|err| CacheError::source_load(self.identity(), err))?;
        serde_json::from_slice(&bytes).map_err(|err| CacheError::source_load(self.identity(), err))
    }
}

// == Environment Source ==
/// Environment variables sharing a prefix, loaded as a flat JSON object of
/// strings. Has no modification time, so keys come from a content hash.
#[derive(Debug, Clone)]
pub struct EnvSource {
    prefix: String,
}

impl EnvSource {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl ConfigSource for EnvSource {
    fn source_type(&self) -> &str {
        "env"
    }

    fn identity(&self) -> String {
        self.prefix.clone()
    }

    fn modified_at(&self) -> Option<SystemTime> {
        None
    }

    fn load(&self) -> Result<CacheValue> {
        // Sorted so equal environments hash equally
        let vars: BTreeMap<String, String> = env::vars_os()
            .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)))
            .filter(|(name, _)| name.starts_with(&self.prefix))
            .collect();

        let object: Map<String, Value> = vars
            .into_iter()
            .map(|(name, value)| (name, Value::String(value)))
            .collect();
        Ok(Value::Object(object))
    }
}

//! Configuration Module
//!
//! Handles loading cache and admin-server configuration from environment
//! variables.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::EvictionPolicy;
use crate::error::{CacheError, Result};

// == Defaults ==
pub const DEFAULT_MAX_SIZE: usize = 1000;
pub const DEFAULT_TTL_SECS: u64 = 300;
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_CACHE_DIR: &str = ".config_cache";
pub const DEFAULT_MAX_FILES: usize = 1000;
pub const DEFAULT_LATENCY_SAMPLES: usize = 1000;
pub const DEFAULT_ADMIN_PORT: u16 = 3000;

// == Backend Kind ==
/// Which store implementation a [`CacheManager`](crate::manager::CacheManager)
/// builds. Resolved once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Memory,
    File,
    Null,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::File => "file",
            BackendKind::Null => "null",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "file" => Ok(BackendKind::File),
            "null" => Ok(BackendKind::Null),
            other => Err(CacheError::UnknownBackend(other.to_string())),
        }
    }
}

// == Cache Config ==
/// Cache engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub backend: BackendKind,
    /// Entry capacity of the memory backend
    pub max_size: usize,
    /// TTL applied when `set` is called with `Expiry::Default`; `None` never expires
    pub default_ttl: Option<Duration>,
    pub eviction_policy: EvictionPolicy,
    /// Background sweep period; zero disables the sweep
    pub cleanup_interval: Duration,
    /// Directory of the file backend
    pub cache_dir: PathBuf,
    /// Entry-file capacity of the file backend
    pub max_files: usize,
    /// When false the manager starts on the null backend
    pub enabled: bool,
    /// Size of the latency ring buffer
    pub latency_samples: usize,
}

impl CacheConfig {
    /// Loads the cache configuration from the process environment.
    ///
    /// # Environment Variables
    /// - `CACHE_BACKEND` - `memory`, `file` or `null` (default: memory)
    /// - `CACHE_MAX_SIZE` - Memory backend capacity (default: 1000)
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds, 0 for never (default: 300)
    /// - `CACHE_EVICTION_POLICY` - `lru`, `lfu`, `fifo`, `ttl` or `random` (default: lru)
    /// - `CACHE_CLEANUP_INTERVAL` - Sweep period in seconds, 0 for off (default: 60)
    /// - `CACHE_DIR` - File backend directory (default: .config_cache)
    /// - `CACHE_MAX_FILES` - File backend capacity (default: 1000)
    /// - `CACHE_ENABLED` - Start enabled (default: true)
    /// - `CACHE_LATENCY_SAMPLES` - Latency ring buffer size (default: 1000)
    ///
    /// Unknown backend or policy names are errors; numbers that fail to parse
    /// fall back to their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a caller-supplied variable
    /// lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("CACHE_BACKEND") {
            Some(name) => name.parse()?,
            None => BackendKind::default(),
        };
        let eviction_policy = match lookup("CACHE_EVICTION_POLICY") {
            Some(name) => name.parse()?,
            None => EvictionPolicy::default(),
        };

        let ttl_secs = parse_or(&lookup, "CACHE_DEFAULT_TTL", DEFAULT_TTL_SECS);
        let cleanup_secs = parse_or(&lookup, "CACHE_CLEANUP_INTERVAL", DEFAULT_CLEANUP_INTERVAL_SECS);

        Ok(Self {
            backend,
            max_size: parse_or(&lookup, "CACHE_MAX_SIZE", DEFAULT_MAX_SIZE),
            default_ttl: (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs)),
            eviction_policy,
            cleanup_interval: Duration::from_secs(cleanup_secs),
            cache_dir: lookup("CACHE_DIR")
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR)),
            max_files: parse_or(&lookup, "CACHE_MAX_FILES", DEFAULT_MAX_FILES),
            enabled: lookup("CACHE_ENABLED")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(true),
            latency_samples: parse_or(&lookup, "CACHE_LATENCY_SAMPLES", DEFAULT_LATENCY_SAMPLES),
        })
    }

    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = policy;
        self
    }

    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            max_size: DEFAULT_MAX_SIZE,
            default_ttl: Some(Duration::from_secs(DEFAULT_TTL_SECS)),
            eviction_policy: EvictionPolicy::default(),
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            max_files: DEFAULT_MAX_FILES,
            enabled: true,
            latency_samples: DEFAULT_LATENCY_SAMPLES,
        }
    }
}

// == Server Config ==
/// Configuration of the admin server binary.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub cache: CacheConfig,
    /// Admin HTTP port (`ADMIN_PORT`, default: 3000)
    pub server_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            server_port: parse_or(&lookup, "ADMIN_PORT", DEFAULT_ADMIN_PORT),
            cache: CacheConfig::from_lookup(lookup)?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            server_port: DEFAULT_ADMIN_PORT,
        }
    }
}

// == Utility Functions ==
fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(name)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies. The health
//! endpoint serializes [`HealthReport`](crate::manager::HealthReport) as is.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::manager::PerformanceStats;

/// Response body for `GET /stats`
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub backend: &'static str,
    pub enabled: bool,
    #[serde(flatten)]
    pub stats: CacheStats,
    pub hit_rate: f64,
    pub miss_rate: f64,
    pub fill_rate: f64,
    pub performance: PerformanceStats,
}

impl StatsResponse {
    pub fn new(
        backend: &'static str,
        enabled: bool,
        stats: CacheStats,
        performance: PerformanceStats,
    ) -> Self {
        Self {
            backend,
            enabled,
            hit_rate: stats.hit_rate(),
            miss_rate: stats.miss_rate(),
            fill_rate: stats.fill_rate(),
            stats,
            performance,
        }
    }
}

/// Response body for `GET /keys`
#[derive(Debug, Clone, Serialize)]
pub struct KeysResponse {
    pub count: usize,
    pub keys: Vec<String>,
}

impl KeysResponse {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            count: keys.len(),
            keys,
        }
    }
}

/// Response body for `DELETE /keys/:key`
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub key: String,
}

impl DeleteResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
        }
    }
}

/// Response body for `DELETE /keys`
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
}

impl ClearResponse {
    pub fn new() -> Self {
        Self {
            message: "Cache cleared".to_string(),
        }
    }
}

impl Default for ClearResponse {
    fn default() -> Self {
        Self::new()
    }
}

/// Response body for `POST /invalidate`
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    /// Number of entries removed
    pub removed: usize,
    pub tags: Vec<String>,
}

/// Response body for `POST /enable` and `POST /disable`
#[derive(Debug, Clone, Serialize)]
pub struct ToggleResponse {
    pub enabled: bool,
    /// Backend now serving requests
    pub backend: &'static str,
}

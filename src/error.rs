//! Error types for the configuration cache
//!
//! Provides unified error handling using thiserror. Absent or expired keys are
//! never errors: lookups report them as a miss.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the configuration cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found (admin surface only; stores report misses as `None`)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Store is at capacity and the eviction policy selected no victim
    #[error("Cache full: {0}")]
    CacheFull(String),

    /// Unknown backend name in configuration
    #[error("Unknown cache backend: {0}")]
    UnknownBackend(String),

    /// Unknown eviction policy name in configuration
    #[error("Unknown eviction policy: {0}")]
    UnknownPolicy(String),

    /// Configuration that cannot be used to build a store
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Malformed glob pattern passed to `keys`
    #[error("Invalid key pattern: {0}")]
    InvalidPattern(#[from] glob::PatternError),

    /// File backend I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File backend (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configuration source failed to load
    #[error("Failed to load source {source_id}: {reason}")]
    SourceLoad { source_id: String, reason: String },
}

impl CacheError {
    /// Builds a [`CacheError::SourceLoad`] for the given source identity.
    pub fn source_load(source_id: impl Into<String>, reason: impl ToString) -> Self {
        CacheError::SourceLoad {
            source_id: source_id.into(),
            reason: reason.to_string(),
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) | CacheError::InvalidPattern(_) => {
                StatusCode::BAD_REQUEST
            }
            CacheError::CacheFull(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::SourceLoad { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the configuration cache.
pub type Result<T> = std::result::Result<T, CacheError>;

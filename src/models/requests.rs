//! Request DTOs for the admin API
//!
//! Defines the structure of incoming query strings and request bodies.

use serde::Deserialize;

use crate::cache::{tag_set, TagSet};

/// Query string of `GET /keys`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeysQuery {
    /// Optional glob filter such as `file:*`
    #[serde(default)]
    pub pattern: Option<String>,
}

/// Request body for `POST /invalidate`
///
/// # Fields
/// - `tags`: entries carrying any of these tags are removed
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateRequest {
    pub tags: Vec<String>,
}

impl InvalidateRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.tags.is_empty() {
            return Some("At least one tag is required".to_string());
        }
        if self.tags.iter().any(|tag| tag.trim().is_empty()) {
            return Some("Tags cannot be empty".to_string());
        }
        None
    }

    pub fn tag_set(&self) -> TagSet {
        tag_set(self.tags.iter().cloned())
    }
}

//! API Handlers
//!
//! HTTP request handlers for each admin endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::manager::{CacheManager, HealthReport};
use crate::models::{
    ClearResponse, DeleteResponse, InvalidateRequest, InvalidateResponse, KeysQuery, KeysResponse,
    StatsResponse, ToggleResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<CacheManager>,
}

impl AppState {
    pub fn new(manager: Arc<CacheManager>) -> Self {
        Self { manager }
    }

    /// Builds the manager from configuration. Run inside the tokio runtime so
    /// the backend's sweep starts.
    pub fn from_config(config: CacheConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(CacheManager::new(config)?)))
    }
}

/// Handler for GET /health
///
/// Runs the round-trip probe; 503 when it fails.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let report = state.manager.health_check();
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let manager = &state.manager;
    Json(StatsResponse::new(
        manager.backend_name(),
        manager.is_enabled(),
        manager.stats(),
        manager.performance(),
    ))
}

/// Handler for GET /keys?pattern=
pub async fn keys_handler(
    State(state): State<AppState>,
    Query(query): Query<KeysQuery>,
) -> Result<Json<KeysResponse>> {
    let keys = state.manager.keys(query.pattern.as_deref())?;
    Ok(Json(KeysResponse::new(keys)))
}

/// Handler for DELETE /keys/:key
pub async fn delete_key_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if !state.manager.delete(&key) {
        return Err(CacheError::NotFound(key));
    }
    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for DELETE /keys
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    state.manager.clear();
    Json(ClearResponse::new())
}

/// Handler for POST /invalidate
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let removed = state.manager.delete_by_tags(&req.tag_set());
    Ok(Json(InvalidateResponse {
        removed,
        tags: req.tags,
    }))
}

/// Handler for POST /enable
pub async fn enable_handler(State(state): State<AppState>) -> Result<Json<ToggleResponse>> {
    state.manager.enable()?;
    Ok(Json(toggle_response(&state.manager)))
}

/// Handler for POST /disable
pub async fn disable_handler(State(state): State<AppState>) -> Json<ToggleResponse> {
    state.manager.disable();
    Json(toggle_response(&state.manager))
}

fn toggle_response(manager: &CacheManager) -> ToggleResponse {
    ToggleResponse {
        enabled: manager.is_enabled(),
        backend: manager.backend_name(),
    }
}

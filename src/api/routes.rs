//! API Routes
//!
//! Configures the Axum router with all admin endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, delete_key_handler, disable_handler, enable_handler, health_handler,
    invalidate_handler, keys_handler, stats_handler, AppState,
};

/// Creates the admin router.
///
/// # Endpoints
/// - `GET /health` - Round-trip health probe
/// - `GET /stats` - Counters, rates and latency summary
/// - `GET /keys?pattern=` - Live keys
/// - `DELETE /keys/:key` - Delete one key
/// - `DELETE /keys` - Clear the cache
/// - `POST /invalidate` - Delete by tags
/// - `POST /enable`, `POST /disable` - Toggle caching
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/keys", get(keys_handler).delete(clear_handler))
        .route("/keys/:key", delete(delete_key_handler))
        .route("/invalidate", post(invalidate_handler))
        .route("/enable", post(enable_handler))
        .route("/disable", post(disable_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

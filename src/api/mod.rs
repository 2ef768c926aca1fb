//! API Module
//!
//! Operator admin surface over a [`CacheManager`](crate::manager::CacheManager).
//!
//! # Endpoints
//! - `GET /health` - Health probe
//! - `GET /stats` - Cache statistics
//! - `GET /keys` / `DELETE /keys` - List or clear keys
//! - `DELETE /keys/:key` - Delete a key
//! - `POST /invalidate` - Delete by tags
//! - `POST /enable` / `POST /disable` - Toggle caching

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;

//! rankd-server: HTTP server for rankd.
//!
//! Provides the REST API over the query-serving core.
//! Registry, caching, ranking and build logic live in `rankd-core`.

/// REST API layer: Axum router, HTTP handlers, models, errors, metrics.
pub mod api;

//! HTTP request handlers and shared application state.
//!
//! Searches and builds are CPU-bound and synchronous in the core, so every
//! handler that touches the service runs it on the blocking pool.

use crate::api::errors::ApiError;
use crate::api::metrics;
use crate::api::models::*;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use metrics_exporter_prometheus::PrometheusHandle;
use rankd_core::ranking::RankedResult;
use rankd_core::{ErrorKind, SearchService};
use std::sync::Arc;
use std::time::Instant;

/// Shared application state passed to every handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SearchService>,
    pub prometheus_handle: PrometheusHandle,
    pub start_time: Instant,
}

/// `POST /init_searchers`
pub async fn init_searchers(State(state): State<AppState>) -> Result<&'static str, ApiError> {
    let service = Arc::clone(&state.service);
    let report = tokio::task::spawn_blocking(move || service.initialize_all()).await??;
    for (name, reason) in &report.failed {
        tracing::warn!(index = %name, "Searcher not initialized: {}", reason);
    }
    Ok("OK")
}

/// `GET /api/search/:idx_name?query=&k=`
pub async fn search(
    State(state): State<AppState>,
    Path(idx_name): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Arc<RankedResult>>, ApiError> {
    let Some(query) = params.query else {
        metrics::record_query(metrics::index_label(&state.service, &idx_name), "bad_request");
        return Err(ApiError::BadRequest("Bad query".into()));
    };

    let service = Arc::clone(&state.service);
    let index = idx_name.clone();
    let outcome =
        tokio::task::spawn_blocking(move || service.query(&index, &query, params.k.as_deref()))
            .await?;

    match outcome {
        Ok((result, lookup)) => {
            metrics::record_query(metrics::index_label(&state.service, &idx_name), "ok");
            metrics::record_cache_lookup(lookup);
            Ok(Json(result))
        }
        Err(e) => {
            let outcome = match e.kind() {
                ErrorKind::ClientError => "bad_request",
                _ => "error",
            };
            metrics::record_query(metrics::index_label(&state.service, &idx_name), outcome);
            Err(e.into())
        }
    }
}

/// `POST /api/index/:idx_name`
pub async fn build_index(
    State(state): State<AppState>,
    Path(idx_name): Path<String>,
) -> Result<&'static str, ApiError> {
    let service = Arc::clone(&state.service);
    let index = idx_name.clone();
    let outcome = tokio::task::spawn_blocking(move || service.rebuild(&index)).await?;

    match outcome {
        Ok(report) => {
            metrics::record_build(metrics::index_label(&state.service, &idx_name), "ok");
            tracing::info!(
                index = %report.name,
                documents = report.documents,
                generation = report.generation,
                elapsed_ms = report.elapsed_ms,
                "Rebuilt index"
            );
            Ok("OK")
        }
        Err(e) => {
            let outcome = match e.kind() {
                ErrorKind::Conflict => "conflict",
                _ => "failed",
            };
            metrics::record_build(metrics::index_label(&state.service, &idx_name), outcome);
            Err(e.into())
        }
    }
}

/// `GET /api/indexes`
pub async fn list_indexes(State(state): State<AppState>) -> Json<ListIndexesResponse> {
    let indexes = state
        .service
        .registry()
        .snapshot()
        .into_iter()
        .map(IndexInfo::from)
        .collect();
    Json(ListIndexesResponse {
        indexes,
        building: state.service.builds_in_progress(),
    })
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let summaries = state.service.registry().snapshot();
    let stats = state.service.cache_stats();
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.start_time.elapsed().as_secs(),
            indexes_count: summaries.len(),
            total_documents: summaries.iter().map(|s| s.documents).sum(),
            cache: CacheHealth {
                entries: stats.entries,
                capacity: stats.capacity,
                hits: stats.hits,
                misses: stats.misses,
            },
        }),
    )
}

/// `GET /metrics`
pub async fn metrics_endpoint(State(state): State<AppState>) -> String {
    state.prometheus_handle.render()
}

/// Fallback for unknown routes.
pub async fn not_found() -> ApiError {
    ApiError::NotFound("Not found".into())
}

//! Request and response data transfer objects for the REST API.
//!
//! Search responses serialize [`rankd_core::ranking::RankedResult`] directly;
//! the types here cover query parameters and the admin endpoints.

use rankd_core::registry::IndexSummary;
use serde::{Deserialize, Serialize};

// --- Search ---

/// Query string of `GET /api/search/:idx_name`.
///
/// `k` stays a raw string so that malformed values reach the core's `Bad k`
/// handling instead of an extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub k: Option<String>,
}

// --- Indexes ---

/// One entry of `GET /api/indexes`.
#[derive(Debug, Serialize)]
pub struct IndexInfo {
    pub name: String,
    pub generation: u64,
    pub documents: usize,
}

impl From<IndexSummary> for IndexInfo {
    fn from(summary: IndexSummary) -> Self {
        Self {
            name: summary.name,
            generation: summary.generation,
            documents: summary.documents,
        }
    }
}

/// Response body for `GET /api/indexes`.
#[derive(Debug, Serialize)]
pub struct ListIndexesResponse {
    pub indexes: Vec<IndexInfo>,
    pub building: Vec<String>,
}

// --- Health ---

/// Query cache counters reported by `GET /health`.
#[derive(Debug, Serialize)]
pub struct CacheHealth {
    pub entries: usize,
    /// 0 = unbounded.
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Response body for `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub indexes_count: usize,
    pub total_documents: usize,
    pub cache: CacheHealth,
}

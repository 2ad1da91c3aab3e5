//! Prometheus metrics recording and background collection.

use metrics::{counter, gauge, histogram};
use rankd_core::cache::Lookup;
use rankd_core::SearchService;
use std::time::Duration;

/// Records HTTP request metrics.
pub fn record_request(method: &str, path: &str, status: u16, duration: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];
    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());
}

/// Label used when an index name is not registered.
pub const UNKNOWN_INDEX: &str = "unknown";

/// Metric label for `name`: the name itself only once it is registered, so
/// arbitrary request paths cannot grow label cardinality.
pub fn index_label<'a>(service: &SearchService, name: &'a str) -> &'a str {
    if service.registry().contains(name) {
        name
    } else {
        UNKNOWN_INDEX
    }
}

/// Records the outcome of one query (`ok`, `bad_request`, `error`).
pub fn record_query(index: &str, outcome: &'static str) {
    counter!(
        "rankd_queries_total",
        "index" => index.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Records whether a query was served from the cache.
pub fn record_cache_lookup(lookup: Lookup) {
    let result = match lookup {
        Lookup::Hit => "hit",
        Lookup::Miss => "miss",
    };
    counter!("rankd_cache_lookups_total", "result" => result).increment(1);
}

/// Records the outcome of one build (`ok`, `conflict`, `failed`).
pub fn record_build(index: &str, outcome: &'static str) {
    counter!(
        "rankd_builds_total",
        "index" => index.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Updates registry and cache gauges.
pub fn update_service_metrics(service: &SearchService) {
    gauge!("rankd_indexes_total").set(service.registry().len() as f64);
    gauge!("rankd_cache_entries").set(service.cache_stats().entries as f64);
    for summary in service.registry().snapshot() {
        gauge!("rankd_documents_total", "index" => summary.name).set(summary.documents as f64);
    }
}

//! The four operations the service boundary exposes.
//!
//! [`SearchService`] owns the registry, the query cache and the build
//! orchestrator. The HTTP layer holds it in an `Arc` and calls it from
//! blocking tasks; nothing here is async.

use crate::build::{BuildOrchestrator, BuildReport};
use crate::cache::{CacheStats, Lookup, QueryCache, QueryKey};
use crate::config::{self, ServiceSettings, DEFAULT_K, MAX_K};
use crate::engine::lexical::{LexicalBuilder, LexicalLoader};
use crate::engine::{EngineLoader, IndexBuilder};
use crate::error::{Error, Result};
use crate::ranking::{self, RankedResult};
use crate::registry::{PopulateReport, Registry};
use std::num::IntErrorKind;
use std::sync::Arc;

pub struct SearchService {
    registry: Arc<Registry>,
    cache: QueryCache,
    builds: BuildOrchestrator,
    loader: Arc<dyn EngineLoader>,
    settings: ServiceSettings,
}

impl SearchService {
    /// Service backed by the built-in lexical engine.
    pub fn new(settings: ServiceSettings) -> Self {
        Self::with_components(settings, Arc::new(LexicalBuilder), Arc::new(LexicalLoader))
    }

    pub fn with_components(
        settings: ServiceSettings,
        builder: Arc<dyn IndexBuilder>,
        loader: Arc<dyn EngineLoader>,
    ) -> Self {
        let registry = Arc::new(Registry::new());
        let builds = BuildOrchestrator::new(
            Arc::clone(&registry),
            builder,
            Arc::clone(&loader),
            settings.clone(),
        );
        Self {
            registry,
            cache: QueryCache::new(settings.cache_capacity),
            builds,
            loader,
            settings,
        }
    }

    /// Attaches every collection under the data directory that has a built index.
    pub fn initialize_all(&self) -> Result<PopulateReport> {
        let report = self.registry.populate(&self.settings, self.loader.as_ref())?;
        tracing::info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "Initialized searchers"
        );
        Ok(report)
    }

    /// Answers `query` against `index_name`.
    ///
    /// `k` is validated before the tenant is resolved, so a bad `k` wins over an
    /// unknown or malformed index name. Results are memoized per `(query, k, index_name)` and the
    /// serving handle's generation.
    pub fn query(&self, index_name: &str, query: &str, k: Option<&str>) -> Result<(Arc<RankedResult>, Lookup)> {
        let k = parse_k(k)?;
        if !config::is_valid_index_name(index_name) {
            return Err(Error::UnknownIndex(index_name.to_string()));
        }
        let handle = self.registry.get(index_name)?;
        let key = QueryKey::new(query, k, index_name);
        self.cache
            .get_or_compute(&key, handle.generation(), || ranking::run_query(&handle, query, k))
    }

    /// Rebuilds `index_name` and replaces its handle.
    pub fn rebuild(&self, index_name: &str) -> Result<BuildReport> {
        self.builds.build(index_name)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn builds_in_progress(&self) -> Vec<String> {
        self.builds.in_progress()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }
}

/// Parses the raw `k` parameter.
///
/// Absent means [`DEFAULT_K`]. Values above [`MAX_K`] (including ones too large
/// for `usize`) are capped. Zero, negatives and non-integers are rejected.
pub fn parse_k(raw: Option<&str>) -> Result<usize> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_K);
    };
    let k = match raw.trim().parse::<usize>() {
        Ok(k) => k,
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => MAX_K,
        Err(_) => return Err(Error::BadK),
    };
    if k == 0 {
        return Err(Error::BadK);
    }
    Ok(k.min(MAX_K))
}

//! Engine collaborator traits and the per-tenant [`EngineHandle`].
//!
//! An [`Engine`] answers `search(query, k)` over a pre-built index. An
//! [`EngineLoader`] opens such an index from disk, and an [`IndexBuilder`]
//! produces one from a raw collection. The built-in lexical implementation
//! lives in [`lexical`]; other engines plug in through the same traits.

/// Quantized BM25 impact engine: builder, loader and searcher.
pub mod lexical;

use crate::collection::{Collection, DocId};
use crate::error::{CollectionError, EngineError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One scored candidate as produced by an engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub pid: DocId,
    /// 0-based position assigned by the engine.
    pub rank: usize,
    /// Raw relevance score, higher is more relevant.
    pub score: f64,
}

/// A loaded, queryable index.
pub trait Engine: Send + Sync {
    /// Returns at most `k` candidates, ordered as the engine ranks them.
    fn search(&self, query: &str, k: usize) -> Result<Vec<Candidate>, EngineError>;
}

/// Opens a pre-built index for a collection.
pub trait EngineLoader: Send + Sync {
    fn load(
        &self,
        index_path: &Path,
        collection: Arc<Collection>,
    ) -> Result<Arc<dyn Engine>, EngineError>;
}

/// Fixed parameters handed to an [`IndexBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildConfig {
    /// Documents are truncated to this many tokens.
    pub doc_maxlen: usize,
    /// Width of each quantized code in bits.
    pub quantization_bits: u8,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            doc_maxlen: crate::config::DOC_MAXLEN,
            quantization_bits: crate::config::QUANTIZATION_BITS,
        }
    }
}

/// Builds an on-disk index from a raw collection.
pub trait IndexBuilder: Send + Sync {
    /// Writes the index to `destination`, replacing whatever was there, and
    /// returns the path the loader should open.
    fn build(
        &self,
        collection: &Collection,
        checkpoint: &Path,
        config: &BuildConfig,
        destination: &Path,
    ) -> Result<PathBuf, EngineError>;
}

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// A tenant's live engine together with its collection.
///
/// Handles are immutable once constructed and shared as `Arc<EngineHandle>`;
/// a rebuild produces a new handle with a higher `generation`.
pub struct EngineHandle {
    name: String,
    engine: Arc<dyn Engine>,
    collection: Arc<Collection>,
    generation: u64,
}

impl EngineHandle {
    pub fn new(name: impl Into<String>, engine: Arc<dyn Engine>, collection: Arc<Collection>) -> Self {
        Self {
            name: name.into(),
            engine,
            collection,
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn search(&self, query: &str, k: usize) -> Result<Vec<Candidate>, EngineError> {
        self.engine.search(query, k)
    }

    pub fn lookup(&self, pid: DocId) -> Result<&str, CollectionError> {
        self.collection.text_of(pid)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn document_count(&self) -> usize {
        self.collection.len()
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("name", &self.name)
            .field("generation", &self.generation)
            .field("documents", &self.collection.len())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted engines shared by unit tests across the crate.

    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Returns fixed `(pid, score)` lists per query and counts invocations.
    #[derive(Default)]
    pub struct ScriptedEngine {
        pub responses: Mutex<HashMap<String, Vec<(DocId, f64)>>>,
        pub calls: AtomicUsize,
        pub delay: Option<Duration>,
    }

    impl ScriptedEngine {
        pub fn with(query: &str, hits: Vec<(DocId, f64)>) -> Self {
            let engine = Self::default();
            engine.responses.lock().insert(query.to_string(), hits);
            engine
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Engine for ScriptedEngine {
        fn search(&self, query: &str, k: usize) -> Result<Vec<Candidate>, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            let hits = self.responses.lock().get(query).cloned().unwrap_or_default();
            Ok(hits
                .into_iter()
                .take(k)
                .enumerate()
                .map(|(rank, (pid, score))| Candidate { pid, rank, score })
                .collect())
        }
    }

    /// Wraps a shared engine so tests can keep a handle to its counters.
    pub struct Shared(pub Arc<ScriptedEngine>);

    impl Engine for Shared {
        fn search(&self, query: &str, k: usize) -> Result<Vec<Candidate>, EngineError> {
            self.0.search(query, k)
        }
    }

    pub fn handle(
        name: &str,
        engine: Arc<ScriptedEngine>,
        passages: Vec<(DocId, &str)>,
    ) -> Arc<EngineHandle> {
        Arc::new(EngineHandle::new(
            name,
            Arc::new(Shared(engine)),
            Arc::new(Collection::from_passages(passages)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_generations_increase() {
        let engine = Arc::new(ScriptedEngine::default());
        let a = handle("t", engine.clone(), vec![(1, "a")]);
        let b = handle("t", engine, vec![(1, "a")]);
        assert!(b.generation() > a.generation());
    }

    #[test]
    fn test_handle_search_and_lookup() {
        let engine = Arc::new(ScriptedEngine::with("cat", vec![(1, 2.0), (2, 1.0)]));
        let h = handle("pets", engine.clone(), vec![(1, "cat"), (2, "dog")]);
        let hits = h.search("cat", 1).unwrap();
        assert_eq!(hits, vec![Candidate { pid: 1, rank: 0, score: 2.0 }]);
        assert_eq!(h.lookup(2).unwrap(), "dog");
        assert!(h.lookup(3).is_err());
        assert_eq!(h.name(), "pets");
        assert_eq!(h.document_count(), 2);
        assert_eq!(engine.calls(), 1);
    }
}

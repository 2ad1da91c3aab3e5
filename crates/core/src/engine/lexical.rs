//! Built-in lexical engine over quantized BM25 impacts.
//!
//! The builder tokenizes each passage (truncated to `doc_maxlen` tokens),
//! computes the BM25 impact of every posting and stores each term's impacts as
//! packed `quantization_bits`-wide codes. The index is a single checksummed
//! snapshot at `<index_path>/postings.rkx`. Search sums the dequantized impacts
//! of the query terms and keeps the top `k` documents.

use crate::bm25::{self, InvertedIndex};
use crate::collection::{Collection, DocId};
use crate::engine::{BuildConfig, Candidate, Engine, EngineLoader, IndexBuilder};
use crate::error::EngineError;
use crate::quantization::{self, QuantizedImpacts};
use crate::storage::{load_snapshot, save_snapshot};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Snapshot file name inside an index directory.
pub const INDEX_FILE: &str = "postings.rkx";

/// One term's postings: internal doc ids and their quantized impacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermPostings {
    pub docs: Vec<u32>,
    pub impacts: QuantizedImpacts,
}

/// The persisted index.
#[derive(Debug, Serialize, Deserialize)]
pub struct ImpactIndex {
    pub doc_maxlen: usize,
    pub quantization_bits: u8,
    /// Checkpoint recorded for provenance.
    pub checkpoint: String,
    /// internal id → pid.
    pub pids: Vec<DocId>,
    pub terms: HashMap<String, TermPostings>,
}

impl ImpactIndex {
    /// Builds an index over every passage of `collection`.
    pub fn build(collection: &Collection, checkpoint: &Path, config: &BuildConfig) -> Self {
        let mut inverted = InvertedIndex::new();
        let mut pids = Vec::with_capacity(collection.len());
        for (pid, text) in collection.iter() {
            inverted.add_document(text, config.doc_maxlen);
            pids.push(pid);
        }

        let terms = inverted
            .postings
            .iter()
            .map(|(term, postings)| {
                let impacts = bm25::term_impacts(&inverted, postings);
                (
                    term.clone(),
                    TermPostings {
                        docs: postings.iter().map(|p| p.doc).collect(),
                        impacts: QuantizedImpacts::quantize(&impacts, config.quantization_bits),
                    },
                )
            })
            .collect();

        Self {
            doc_maxlen: config.doc_maxlen,
            quantization_bits: config.quantization_bits,
            checkpoint: checkpoint.display().to_string(),
            pids,
            terms,
        }
    }

    /// Checks structural invariants after deserialization.
    pub fn validate(&self) -> Result<(), String> {
        let doc_count = self.pids.len();
        for (term, entry) in &self.terms {
            entry
                .impacts
                .validate()
                .map_err(|e| format!("term '{}': {}", term, e))?;
            if entry.impacts.len() != entry.docs.len() {
                return Err(format!(
                    "term '{}': {} impacts for {} postings",
                    term,
                    entry.impacts.len(),
                    entry.docs.len()
                ));
            }
            if let Some(&bad) = entry.docs.iter().find(|&&d| d as usize >= doc_count) {
                return Err(format!(
                    "term '{}': posting {} out of bounds (documents={})",
                    term, bad, doc_count
                ));
            }
        }
        Ok(())
    }

    /// Top-`k` documents by summed impact, ties broken by ascending pid.
    pub fn search(&self, query: &str, k: usize) -> Vec<Candidate> {
        let tokens = bm25::tokenize(query);
        if k == 0 || tokens.is_empty() || self.pids.is_empty() {
            return Vec::new();
        }

        let mut scores: HashMap<u32, f32> = HashMap::with_capacity(256.min(self.pids.len()));
        for token in tokens.iter() {
            if let Some(entry) = self.terms.get(token) {
                for (i, &doc) in entry.docs.iter().enumerate() {
                    *scores.entry(doc).or_insert(0.0) += entry.impacts.value(i);
                }
            }
        }

        // Min-heap of size k; among equal scores the larger pid is evicted first.
        let mut heap: BinaryHeap<Reverse<(OrderedFloat<f32>, Reverse<DocId>)>> =
            BinaryHeap::with_capacity(k + 1);
        for (doc, score) in scores {
            heap.push(Reverse((OrderedFloat(score), Reverse(self.pids[doc as usize]))));
            if heap.len() > k {
                heap.pop();
            }
        }
        let mut hits: Vec<(DocId, f32)> = heap
            .into_iter()
            .map(|Reverse((score, Reverse(pid)))| (pid, score.0))
            .collect();
        hits.sort_unstable_by(|a, b| {
            OrderedFloat(b.1)
                .cmp(&OrderedFloat(a.1))
                .then(a.0.cmp(&b.0))
        });

        hits.into_iter()
            .enumerate()
            .map(|(rank, (pid, score))| Candidate {
                pid,
                rank,
                score: score as f64,
            })
            .collect()
    }
}

/// Searches a loaded [`ImpactIndex`].
pub struct LexicalEngine {
    index: ImpactIndex,
}

impl LexicalEngine {
    pub fn new(index: ImpactIndex) -> Self {
        Self { index }
    }
}

impl Engine for LexicalEngine {
    fn search(&self, query: &str, k: usize) -> Result<Vec<Candidate>, EngineError> {
        Ok(self.index.search(query, k))
    }
}

/// Opens `<index_path>/postings.rkx`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexicalLoader;

impl EngineLoader for LexicalLoader {
    fn load(
        &self,
        index_path: &Path,
        collection: Arc<Collection>,
    ) -> Result<Arc<dyn Engine>, EngineError> {
        let path = index_path.join(INDEX_FILE);
        let index: ImpactIndex = load_snapshot(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::InvalidData {
                EngineError::Corrupt {
                    path: path.clone(),
                    reason: source.to_string(),
                }
            } else {
                EngineError::Io {
                    path: path.clone(),
                    source,
                }
            }
        })?;
        index.validate().map_err(|reason| EngineError::Corrupt {
            path: path.clone(),
            reason,
        })?;

        if index.pids.len() != collection.len() {
            tracing::warn!(
                index = %path.display(),
                indexed = index.pids.len(),
                collection = collection.len(),
                "Index and collection sizes differ; index may be stale"
            );
        }
        tracing::info!(
            index = %path.display(),
            documents = index.pids.len(),
            terms = index.terms.len(),
            bits = index.quantization_bits,
            "Loaded lexical index"
        );
        Ok(Arc::new(LexicalEngine::new(index)))
    }
}

/// Writes an [`ImpactIndex`] snapshot for a collection.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexicalBuilder;

impl IndexBuilder for LexicalBuilder {
    fn build(
        &self,
        collection: &Collection,
        checkpoint: &Path,
        config: &BuildConfig,
        destination: &Path,
    ) -> Result<PathBuf, EngineError> {
        if !quantization::is_supported(config.quantization_bits) {
            return Err(EngineError::InvalidConfig(format!(
                "quantization_bits must be one of {:?}, got {}",
                quantization::SUPPORTED_BITS,
                config.quantization_bits
            )));
        }
        if config.doc_maxlen == 0 {
            return Err(EngineError::InvalidConfig("doc_maxlen must be > 0".into()));
        }

        let index = ImpactIndex::build(collection, checkpoint, config);
        let path = destination.join(INDEX_FILE);
        let bytes = save_snapshot(&index, &path).map_err(|source| EngineError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::info!(
            index = %destination.display(),
            documents = index.pids.len(),
            terms = index.terms.len(),
            bytes,
            "Wrote lexical index"
        );
        Ok(destination.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn pets() -> Collection {
        Collection::from_passages([
            (1, "cat"),
            (2, "dog"),
            (3, "fish"),
            (4, "cat and dog play together"),
        ])
    }

    fn build(collection: &Collection) -> ImpactIndex {
        ImpactIndex::build(collection, Path::new("/ckpt"), &BuildConfig::default())
    }

    #[test]
    fn test_search_ranks_matching_documents() {
        let index = build(&pets());
        let hits = index.search("cat", 10);
        let pids: Vec<DocId> = hits.iter().map(|c| c.pid).collect();
        assert_eq!(pids.len(), 2);
        assert!(pids.contains(&1) && pids.contains(&4));
        assert_eq!(hits[0].rank, 0);
        assert_eq!(hits[1].rank, 1);
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn test_search_respects_k_and_ties_by_pid() {
        let col = Collection::from_passages([(9, "echo"), (5, "echo"), (7, "echo")]);
        let index = build(&col);
        let hits = index.search("echo", 2);
        let pids: Vec<DocId> = hits.iter().map(|c| c.pid).collect();
        assert_eq!(pids, vec![5, 7]);
    }

    #[test]
    fn test_search_no_match_or_empty_query() {
        let index = build(&pets());
        assert!(index.search("zebra", 5).is_empty());
        assert!(index.search("", 5).is_empty());
        assert!(index.search("cat", 0).is_empty());
    }

    #[test]
    fn test_doc_maxlen_truncates() {
        let col = Collection::from_passages([(1, "alpha beta gamma")]);
        let config = BuildConfig {
            doc_maxlen: 1,
            quantization_bits: 2,
        };
        let index = ImpactIndex::build(&col, Path::new("/ckpt"), &config);
        assert!(index.terms.contains_key("alpha"));
        assert!(!index.terms.contains_key("gamma"));
    }

    #[test]
    fn test_builder_and_loader_round_trip() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("experiments/pets/indexes/index");
        let col = Arc::new(pets());
        let path = LexicalBuilder
            .build(&col, Path::new("/ckpt"), &BuildConfig::default(), &destination)
            .unwrap();
        assert_eq!(path, destination);
        assert!(destination.join(INDEX_FILE).exists());

        let engine = LexicalLoader.load(&path, col).unwrap();
        let hits = engine.search("fish", 3).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].pid, 3);
    }

    #[test]
    fn test_builder_rejects_bad_config() {
        let dir = TempDir::new().unwrap();
        let config = BuildConfig {
            doc_maxlen: 300,
            quantization_bits: 3,
        };
        let err = LexicalBuilder
            .build(&pets(), Path::new("/ckpt"), &config, dir.path())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }

    #[test]
    fn test_loader_missing_index() {
        let dir = TempDir::new().unwrap();
        let err = LexicalLoader
            .load(dir.path(), Arc::new(pets()))
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::Io { .. }));
    }

    #[test]
    fn test_loader_rejects_truncated_index() {
        let dir = TempDir::new().unwrap();
        let col = Arc::new(pets());
        LexicalBuilder
            .build(&col, Path::new("/ckpt"), &BuildConfig::default(), dir.path())
            .unwrap();
        let file = dir.path().join(INDEX_FILE);
        let bytes = std::fs::read(&file).unwrap();
        std::fs::write(&file, &bytes[..bytes.len() / 2]).unwrap();

        let err = LexicalLoader.load(dir.path(), col).err().unwrap();
        assert!(matches!(err, EngineError::Corrupt { .. }));
    }

    #[test]
    fn test_validate_detects_out_of_bounds_posting() {
        let mut index = build(&pets());
        index.pids.truncate(1);
        assert!(index.validate().is_err());
    }
}

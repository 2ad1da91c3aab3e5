//! Registry mapping index names to live [`EngineHandle`]s.
//!
//! Entries live in a sharded concurrent map of `Arc<EngineHandle>`. Lookups
//! clone the `Arc` and release the shard immediately, so a replacement never
//! waits on searches and a search that already holds the old handle finishes
//! with it.

use crate::collection::Collection;
use crate::config::{ServiceSettings, COLLECTION_EXTENSION};
use crate::engine::{EngineHandle, EngineLoader};
use crate::error::{Error, Result};
use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;

/// Outcome of a [`Registry::populate`] pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PopulateReport {
    /// Names attached or replaced.
    pub loaded: Vec<String>,
    /// Names skipped, with the reason.
    pub failed: Vec<(String, String)>,
}

/// One row of [`Registry::snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSummary {
    pub name: String,
    pub generation: u64,
    pub documents: usize,
}

#[derive(Default)]
pub struct Registry {
    handles: DashMap<String, Arc<EngineHandle>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live handle for `name`.
    pub fn get(&self, name: &str) -> Result<Arc<EngineHandle>> {
        self.handles
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::UnknownIndex(name.to_string()))
    }

    /// Attaches `handle` under its name, returning the handle it replaced.
    pub fn insert(&self, handle: Arc<EngineHandle>) -> Option<Arc<EngineHandle>> {
        let name = handle.name().to_string();
        let previous = self.handles.insert(name.clone(), handle);
        if let Some(ref old) = previous {
            tracing::info!(index = %name, old_generation = old.generation(), "Replaced engine handle");
        }
        previous
    }

    /// Scans `settings.data_dir` for `*.tsv` collections and attaches one
    /// handle per collection whose index can be opened.
    ///
    /// Collections are visited in file-name order. A collection that fails to
    /// load is reported and skipped; its existing entry, if any, is kept.
    pub fn populate(&self, settings: &ServiceSettings, loader: &dyn EngineLoader) -> Result<PopulateReport> {
        let mut report = PopulateReport::default();
        let mut sources = match discover_collections(&settings.data_dir) {
            Ok(sources) => sources,
            Err(e) => {
                tracing::warn!(data_dir = %settings.data_dir.display(), "Could not scan collections: {}", e);
                return Ok(report);
            }
        };
        sources.sort();

        for (name, path) in sources {
            let attached = Collection::load(&path)
                .map_err(Error::from)
                .and_then(|collection| {
                    let collection = Arc::new(collection);
                    let engine = loader.load(&settings.index_path(&name), Arc::clone(&collection))?;
                    Ok(Arc::new(EngineHandle::new(name.clone(), engine, collection)))
                });
            match attached {
                Ok(handle) => {
                    tracing::info!(
                        index = %name,
                        documents = handle.document_count(),
                        generation = handle.generation(),
                        "Attached engine"
                    );
                    self.insert(handle);
                    report.loaded.push(name);
                }
                Err(e) => {
                    tracing::warn!(index = %name, "Skipping collection: {}", e);
                    report.failed.push((name, e.to_string()));
                }
            }
        }
        Ok(report)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handles.contains_key(name)
    }

    /// Sorted index names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handles.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Sorted summary of every registered index.
    pub fn snapshot(&self) -> Vec<IndexSummary> {
        let mut rows: Vec<IndexSummary> = self
            .handles
            .iter()
            .map(|e| IndexSummary {
                name: e.key().clone(),
                generation: e.value().generation(),
                documents: e.value().document_count(),
            })
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// `(index name, path)` for every `*.tsv` file directly under `dir`.
///
/// The index name is the file name up to its first `.`.
fn discover_collections(dir: &Path) -> std::io::Result<Vec<(String, std::path::PathBuf)>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        if path.extension().and_then(|s| s.to_str()) != Some(COLLECTION_EXTENSION) {
            continue;
        }
        let name = file_name.split('.').next().unwrap_or_default();
        if name.is_empty() {
            continue;
        }
        found.push((name.to_string(), path.clone()));
    }
    Ok(found)
}

//! Build orchestrator: raw collection → on-disk index → live engine handle.
//!
//! Builds are one-shot and overwrite any previous index for the tenant. At most
//! one build per index name runs at a time; a second request for the same name
//! is rejected with [`Error::BuildInProgress`] instead of queueing. Builds for
//! different names run in parallel.

use crate::collection::Collection;
use crate::config::{self, ServiceSettings};
use crate::engine::{BuildConfig, EngineHandle, EngineLoader, IndexBuilder};
use crate::error::{Error, Result};
use crate::registry::Registry;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Summary of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub name: String,
    pub index_path: PathBuf,
    pub documents: usize,
    /// Generation of the handle now serving the tenant.
    pub generation: u64,
    pub elapsed_ms: u64,
}

pub struct BuildOrchestrator {
    registry: Arc<Registry>,
    builder: Arc<dyn IndexBuilder>,
    loader: Arc<dyn EngineLoader>,
    settings: ServiceSettings,
    config: BuildConfig,
    in_progress: Mutex<HashSet<String>>,
}

/// Marks a name as building until dropped.
struct BuildPermit<'a> {
    in_progress: &'a Mutex<HashSet<String>>,
    name: String,
}

impl Drop for BuildPermit<'_> {
    fn drop(&mut self) {
        self.in_progress.lock().remove(&self.name);
    }
}

impl BuildOrchestrator {
    pub fn new(
        registry: Arc<Registry>,
        builder: Arc<dyn IndexBuilder>,
        loader: Arc<dyn EngineLoader>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            registry,
            builder,
            loader,
            settings,
            config: BuildConfig::default(),
            in_progress: Mutex::new(HashSet::new()),
        }
    }

    fn acquire(&self, name: &str) -> Result<BuildPermit<'_>> {
        let mut in_progress = self.in_progress.lock();
        if !in_progress.insert(name.to_string()) {
            return Err(Error::BuildInProgress(name.to_string()));
        }
        Ok(BuildPermit {
            in_progress: &self.in_progress,
            name: name.to_string(),
        })
    }

    /// Rebuilds `name` from `<data_dir>/<name>.tsv` and swaps the new handle in.
    ///
    /// On failure the registry keeps whatever it held before. Names that are
    /// not valid tenant names are rejected before anything touches disk.
    pub fn build(&self, name: &str) -> Result<BuildReport> {
        if !config::is_valid_index_name(name) {
            return Err(Error::UnknownIndex(name.to_string()));
        }
        let _permit = self.acquire(name)?;
        let started = Instant::now();
        tracing::info!(index = %name, "Starting index build");

        let (handle, index_path) = self.materialize(name).map_err(|e| {
            tracing::warn!(index = %name, "Index build failed: {}", e);
            Error::BuildFailure(e.to_string())
        })?;

        let report = BuildReport {
            name: name.to_string(),
            index_path,
            documents: handle.document_count(),
            generation: handle.generation(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        self.registry.insert(handle);
        tracing::info!(
            index = %name,
            documents = report.documents,
            generation = report.generation,
            elapsed_ms = report.elapsed_ms,
            "Index build complete"
        );
        Ok(report)
    }

    /// Returns the new handle and the directory the builder reported writing.
    fn materialize(&self, name: &str) -> Result<(Arc<EngineHandle>, PathBuf)> {
        let collection = Arc::new(Collection::load(&self.settings.collection_path(name))?);
        let index_path = self.builder.build(
            &collection,
            &self.settings.checkpoint,
            &self.config,
            &self.settings.index_path(name),
        )?;
        let engine = self.loader.load(&index_path, Arc::clone(&collection))?;
        Ok((Arc::new(EngineHandle::new(name, engine, collection)), index_path))
    }

    /// Names with a build currently running, sorted.
    pub fn in_progress(&self) -> Vec<String> {
        let mut names: Vec<String> = self.in_progress.lock().iter().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::lexical::{LexicalBuilder, LexicalLoader};
    use crate::error::EngineError;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn settings(root: &Path) -> ServiceSettings {
        ServiceSettings {
            data_dir: root.join("data"),
            index_root: root.join("experiments/{index_name}/indexes").display().to_string(),
            ..ServiceSettings::default()
        }
    }

    fn write_collection(settings: &ServiceSettings, name: &str, body: &str) {
        std::fs::create_dir_all(&settings.data_dir).unwrap();
        std::fs::write(settings.collection_path(name), body).unwrap();
    }

    fn orchestrator(settings: &ServiceSettings, builder: Arc<dyn IndexBuilder>) -> (Arc<Registry>, BuildOrchestrator) {
        let registry = Arc::new(Registry::new());
        let orchestrator = BuildOrchestrator::new(
            Arc::clone(&registry),
            builder,
            Arc::new(LexicalLoader),
            settings.clone(),
        );
        (registry, orchestrator)
    }

    struct FailingBuilder;

    impl IndexBuilder for FailingBuilder {
        fn build(&self, _: &Collection, _: &Path, _: &BuildConfig, _: &Path) -> std::result::Result<PathBuf, EngineError> {
            Err(EngineError::InvalidConfig("checkpoint unreadable".into()))
        }
    }

    /// Writes into a versioned subdirectory and reports that path.
    struct NestedBuilder;

    impl IndexBuilder for NestedBuilder {
        fn build(
            &self,
            collection: &Collection,
            checkpoint: &Path,
            config: &BuildConfig,
            destination: &Path,
        ) -> std::result::Result<PathBuf, EngineError> {
            LexicalBuilder.build(collection, checkpoint, config, &destination.join("v2"))
        }
    }

    /// Blocks inside `build` until released, and tracks peak concurrency.
    struct GateBuilder {
        started: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
        active: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    impl IndexBuilder for GateBuilder {
        fn build(
            &self,
            collection: &Collection,
            checkpoint: &Path,
            config: &BuildConfig,
            destination: &Path,
        ) -> std::result::Result<PathBuf, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.started.lock().send(()).unwrap();
            self.release.lock().recv().unwrap();
            let out = LexicalBuilder.build(collection, checkpoint, config, destination);
            self.active.fetch_sub(1, Ordering::SeqCst);
            out
        }
    }

    #[test]
    fn test_build_inserts_new_handle() {
        let dir = TempDir::new().unwrap();
        let settings = settings(dir.path());
        write_collection(&settings, "pets", "1\tcat\n2\tdog\n3\tfish\n");
        let (registry, orchestrator) = orchestrator(&settings, Arc::new(LexicalBuilder));

        let report = orchestrator.build("pets").unwrap();
        assert_eq!(report.name, "pets");
        assert_eq!(report.documents, 3);
        assert_eq!(report.index_path, settings.index_path("pets"));
        assert_eq!(registry.get("pets").unwrap().generation(), report.generation);

        let again = orchestrator.build("pets").unwrap();
        assert!(again.generation > report.generation);
        assert!(orchestrator.in_progress().is_empty());
    }

    #[test]
    fn test_report_uses_path_returned_by_builder() {
        let dir = TempDir::new().unwrap();
        let settings = settings(dir.path());
        write_collection(&settings, "pets", "1\tcat\n2\tdog\n");
        let (registry, orchestrator) = orchestrator(&settings, Arc::new(NestedBuilder));

        let report = orchestrator.build("pets").unwrap();
        assert_eq!(report.index_path, settings.index_path("pets").join("v2"));
        assert!(registry.contains("pets"));
    }

    #[test]
    fn test_path_like_names_are_rejected_before_disk() {
        let dir = TempDir::new().unwrap();
        let settings = settings(dir.path());
        std::fs::write(dir.path().join("outside.tsv"), "1\tsecret\n").unwrap();
        let (registry, orchestrator) = orchestrator(&settings, Arc::new(LexicalBuilder));

        for name in ["../outside", "..", "a/b", "a\\b", ""] {
            let err = orchestrator.build(name).unwrap_err();
            assert!(matches!(err, Error::UnknownIndex(_)), "{name:?}");
            assert_eq!(err.kind(), crate::ErrorKind::ClientError);
        }
        assert!(registry.is_empty());
        assert!(!dir.path().join("experiments").exists());
        assert!(orchestrator.in_progress().is_empty());
    }

    #[test]
    fn test_missing_collection_is_build_failure() {
        let dir = TempDir::new().unwrap();
        let settings = settings(dir.path());
        let (registry, orchestrator) = orchestrator(&settings, Arc::new(LexicalBuilder));

        let err = orchestrator.build("ghost").unwrap_err();
        assert!(matches!(err, Error::BuildFailure(_)));
        assert!(registry.is_empty());
        assert!(orchestrator.in_progress().is_empty());
    }

    #[test]
    fn test_failed_build_leaves_registry_unchanged() {
        let dir = TempDir::new().unwrap();
        let settings = settings(dir.path());
        write_collection(&settings, "pets", "1\tcat\n");
        let (registry, good) = orchestrator(&settings, Arc::new(LexicalBuilder));
        let before = good.build("pets").unwrap().generation;

        let bad = BuildOrchestrator::new(
            Arc::clone(&registry),
            Arc::new(FailingBuilder),
            Arc::new(LexicalLoader),
            settings.clone(),
        );
        let err = bad.build("pets").unwrap_err();
        assert!(err.to_string().contains("checkpoint unreadable"));
        assert_eq!(registry.get("pets").unwrap().generation(), before);

        // Retry after failure is allowed.
        assert!(good.build("pets").is_ok());
    }

    #[test]
    fn test_concurrent_builds_same_name_rejected() {
        let dir = TempDir::new().unwrap();
        let settings = settings(dir.path());
        write_collection(&settings, "t1", "1\talpha\n2\tbeta\n");

        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let gate = Arc::new(GateBuilder {
            started: Mutex::new(started_tx),
            release: Mutex::new(release_rx),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        });
        let (registry, orchestrator) = orchestrator(&settings, gate.clone());
        let orchestrator = Arc::new(orchestrator);

        let first = {
            let orchestrator = Arc::clone(&orchestrator);
            std::thread::spawn(move || orchestrator.build("t1"))
        };
        started_rx.recv().unwrap();

        assert_eq!(orchestrator.in_progress(), vec!["t1".to_string()]);
        let err = orchestrator.build("t1").unwrap_err();
        assert!(matches!(err, Error::BuildInProgress(ref n) if n == "t1"));

        release_tx.send(()).unwrap();
        let report = first.join().unwrap().unwrap();
        assert_eq!(report.documents, 2);
        assert_eq!(gate.calls.load(Ordering::SeqCst), 1);
        assert_eq!(gate.peak.load(Ordering::SeqCst), 1);
        assert!(registry.contains("t1"));
        assert!(orchestrator.in_progress().is_empty());
    }

    #[test]
    fn test_builds_for_different_names_overlap() {
        let dir = TempDir::new().unwrap();
        let settings = settings(dir.path());
        write_collection(&settings, "a", "1\talpha\n");
        write_collection(&settings, "b", "1\tbeta\n");

        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let gate = Arc::new(GateBuilder {
            started: Mutex::new(started_tx),
            release: Mutex::new(release_rx),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        });
        let (registry, orchestrator) = orchestrator(&settings, gate.clone());
        let orchestrator = Arc::new(orchestrator);

        let workers: Vec<_> = ["a", "b"]
            .into_iter()
            .map(|name| {
                let orchestrator = Arc::clone(&orchestrator);
                std::thread::spawn(move || orchestrator.build(name))
            })
            .collect();
        started_rx.recv().unwrap();
        started_rx.recv().unwrap();
        assert_eq!(orchestrator.in_progress(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(gate.peak.load(Ordering::SeqCst), 2);

        release_tx.send(()).unwrap();
        release_tx.send(()).unwrap();
        for w in workers {
            w.join().unwrap().unwrap();
        }
        assert_eq!(registry.names(), vec!["a", "b"]);
    }
}

//! Memoizing query cache with single-flight computation.
//!
//! The cache is sharded by index name. Each shard holds an LRU map of completed
//! results keyed by [`QueryKey`] (unbounded when the capacity is 0) and its own
//! in-flight table, so queries for different tenants never contend on a lock.
//! Each entry records the generation of the engine handle that produced it; a
//! lookup made against a newer handle treats an older entry as a miss.
//! Concurrent misses for the same key and generation share one `OnceCell`, so
//! the compute closure runs once and the other callers block until it
//! finishes. A successful result is committed to the LRU before any caller
//! sees it. Failures are never cached.

use crate::error::Result;
use crate::ranking::RankedResult;
use dashmap::DashMap;
use lru::LruCache;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Exact-match cache key. No normalization is applied to `query`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub query: String,
    pub k: usize,
    pub index_name: String,
}

impl QueryKey {
    pub fn new(query: impl Into<String>, k: usize, index_name: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            k,
            index_name: index_name.into(),
        }
    }
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    /// Per-index bound; 0 = unbounded.
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Whether [`QueryCache::get_or_compute`] was served from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Hit,
    Miss,
}

struct Entry {
    generation: u64,
    result: Arc<RankedResult>,
}

type Flight = Arc<OnceCell<Arc<RankedResult>>>;

/// One index's slice of the cache.
struct Shard {
    entries: Mutex<LruCache<QueryKey, Entry>>,
    in_flight: Mutex<HashMap<(QueryKey, u64), Flight>>,
}

impl Shard {
    fn new(capacity: usize) -> Self {
        let entries = match NonZeroUsize::new(capacity) {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };
        Self {
            entries: Mutex::new(entries),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    fn lookup(&self, key: &QueryKey, generation: u64) -> Option<Arc<RankedResult>> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.generation == generation => Some(Arc::clone(&entry.result)),
            _ => None,
        }
    }

    fn commit(&self, key: &QueryKey, generation: u64, result: Arc<RankedResult>) {
        let mut entries = self.entries.lock();
        // Never let a result from an older handle overwrite a newer one.
        if entries
            .peek(key)
            .is_some_and(|existing| existing.generation > generation)
        {
            return;
        }
        entries.put(key.clone(), Entry { generation, result });
    }
}

pub struct QueryCache {
    shards: DashMap<String, Arc<Shard>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl QueryCache {
    /// Creates a cache holding at most `capacity` results per index; 0 means
    /// unbounded.
    pub fn new(capacity: usize) -> Self {
        Self {
            shards: DashMap::new(),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn shard(&self, index_name: &str) -> Arc<Shard> {
        if let Some(shard) = self.shards.get(index_name) {
            return Arc::clone(shard.value());
        }
        let shard = self
            .shards
            .entry(index_name.to_string())
            .or_insert_with(|| Arc::new(Shard::new(self.capacity)));
        Arc::clone(shard.value())
    }

    /// Returns the cached result for `key` at `generation`, or runs `compute`
    /// once and caches its result.
    pub fn get_or_compute<F>(
        &self,
        key: &QueryKey,
        generation: u64,
        compute: F,
    ) -> Result<(Arc<RankedResult>, Lookup)>
    where
        F: FnOnce() -> Result<RankedResult>,
    {
        let shard = self.shard(&key.index_name);
        if let Some(result) = shard.lookup(key, generation) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok((result, Lookup::Hit));
        }

        let flight_key = (key.clone(), generation);
        let flight = {
            let mut in_flight = shard.in_flight.lock();
            // Re-check under the in-flight lock: a finished flight commits to
            // `entries` before it leaves `in_flight`.
            if let Some(result) = shard.lookup(key, generation) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok((result, Lookup::Hit));
            }
            Arc::clone(in_flight.entry(flight_key.clone()).or_default())
        };

        let mut computed_here = false;
        let outcome: Result<Arc<RankedResult>> = flight
            .get_or_try_init(|| -> Result<Arc<RankedResult>> {
                computed_here = true;
                let result = Arc::new(compute()?);
                shard.commit(key, generation, Arc::clone(&result));
                Ok(result)
            })
            .cloned();

        {
            let mut in_flight = shard.in_flight.lock();
            if in_flight
                .get(&flight_key)
                .is_some_and(|current| Arc::ptr_eq(current, &flight))
            {
                in_flight.remove(&flight_key);
            }
        }

        let result = outcome?;
        if computed_here {
            self.misses.fetch_add(1, Ordering::Relaxed);
            Ok((result, Lookup::Miss))
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
            Ok((result, Lookup::Hit))
        }
    }

    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.value().entries.lock().len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            capacity: self.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

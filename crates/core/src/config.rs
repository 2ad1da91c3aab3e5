//! Global configuration constants and runtime service settings for rankd.
//!
//! Limits, build parameters and server defaults are compile-time constants.
//! Paths that vary per deployment are collected into [`ServiceSettings`], which
//! the server fills from CLI arguments and environment variables in `main.rs`.

use std::path::PathBuf;

/// BM25 Okapi term frequency saturation parameter.
///
/// Controls how quickly term frequency saturates. Standard value is 1.2.
pub const BM25_K1: f32 = 1.2;

/// BM25 Okapi document length normalization parameter.
///
/// 0.0 = no normalization, 1.0 = full normalization. Standard value is 0.75.
pub const BM25_B: f32 = 0.75;

/// Number of results returned when a query omits `k`.
pub const DEFAULT_K: usize = 10;

/// Maximum number of results per query. Larger requests are capped, not rejected.
pub const MAX_K: usize = 100;

/// Documents are truncated to this many tokens at index build time.
pub const DOC_MAXLEN: usize = 300;

/// Width in bits of each quantized posting impact.
pub const QUANTIZATION_BITS: u8 = 2;

/// File extension of raw collections discovered by registry population.
pub const COLLECTION_EXTENSION: &str = "tsv";

/// Name of the index directory inside each tenant's index root.
pub const DEFAULT_INDEX_NAME: &str = "index";

/// Per-tenant index root. `{index_name}` is replaced with the tenant name.
pub const DEFAULT_INDEX_ROOT: &str = "./experiments/{index_name}/indexes";

/// Placeholder substituted in [`ServiceSettings::index_root`].
pub const INDEX_ROOT_PLACEHOLDER: &str = "{index_name}";

/// Default directory scanned for raw `.tsv` collections.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Default model checkpoint handed to the index builder.
pub const DEFAULT_CHECKPOINT: &str = "./checkpoint";

/// Default query cache capacity in entries. 0 = unbounded.
pub const DEFAULT_CACHE_CAPACITY: usize = 1_000_000;

/// Default HTTP server port.
pub const DEFAULT_PORT: u16 = 8893;

/// Per-request timeout in seconds. Index builds routinely exceed this, so the
/// build route is exempt.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of concurrent in-flight requests.
pub const MAX_CONCURRENT_REQUESTS: usize = 512;

/// Graceful shutdown drain timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Interval between background gauge refreshes.
pub const METRICS_REFRESH_SECS: u64 = 15;

/// Deployment paths and cache sizing for a [`crate::service::SearchService`].
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Directory holding raw `<name>.tsv` collections.
    pub data_dir: PathBuf,
    /// Index root template; see [`DEFAULT_INDEX_ROOT`].
    pub index_root: String,
    /// Index directory name under the resolved root.
    pub index_name: String,
    /// Model checkpoint passed to the index builder.
    pub checkpoint: PathBuf,
    /// Query cache capacity per index (0 = unbounded).
    pub cache_capacity: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            index_root: DEFAULT_INDEX_ROOT.to_string(),
            index_name: DEFAULT_INDEX_NAME.to_string(),
            checkpoint: PathBuf::from(DEFAULT_CHECKPOINT),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Whether `name` can be used as a tenant name.
///
/// Names are substituted into filesystem paths and must not leave the data
/// directory or the tenant's index root. A `.` is also rejected since
/// [`crate::registry::Registry::populate`] names a collection by the part of its
/// file name before the first `.`.
pub fn is_valid_index_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\', '\0', '.'])
}

impl ServiceSettings {
    /// Path of the raw collection backing `name`.
    pub fn collection_path(&self, name: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}.{}", name, COLLECTION_EXTENSION))
    }

    /// Path of the built index for `name`.
    pub fn index_path(&self, name: &str) -> PathBuf {
        PathBuf::from(self.index_root.replace(INDEX_ROOT_PLACEHOLDER, name)).join(&self.index_name)
    }
}

//! Storage layer: checksummed on-disk snapshots for built indexes.

/// Snapshot save/load with atomic writes and CRC32 verification.
pub mod persistence;

pub use persistence::{load_snapshot, save_snapshot};

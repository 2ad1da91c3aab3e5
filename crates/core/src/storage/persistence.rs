//! Checksummed bincode snapshots with atomic writes.
//!
//! Layout: `[bincode payload][magic "RKX1"][u32 CRC32 BE]`. Writes go to a
//! sibling temp file that is renamed over the target, so readers see either the
//! previous snapshot or the new one.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::Path;

/// Magic bytes placed before the CRC32 footer.
const SNAPSHOT_CRC_MAGIC: &[u8; 4] = b"RKX1";

/// Serialize `value` to `path` atomically, creating parent directories.
pub fn save_snapshot<T: Serialize>(value: &T, path: &Path) -> io::Result<u64> {
    let bytes = bincode::serialize(value).map_err(|e| io::Error::other(e.to_string()))?;
    let crc = crc32fast::hash(&bytes);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = Path::new(&tmp_name);

    let mut output = Vec::with_capacity(bytes.len() + 8);
    output.extend_from_slice(&bytes);
    output.extend_from_slice(SNAPSHOT_CRC_MAGIC);
    output.extend_from_slice(&crc.to_be_bytes());

    fs::write(tmp_path, &output)?;
    fs::rename(tmp_path, path)?;

    tracing::debug!(
        path = %path.display(),
        bytes = output.len(),
        "Saved snapshot (CRC32={:#010x})",
        crc
    );
    Ok(output.len() as u64)
}

/// Load a snapshot written by [`save_snapshot`], verifying its CRC32 footer.
pub fn load_snapshot<T: DeserializeOwned>(path: &Path) -> io::Result<T> {
    let raw = fs::read(path)?;
    if raw.len() < 8 || &raw[raw.len() - 8..raw.len() - 4] != SNAPSHOT_CRC_MAGIC {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "missing snapshot checksum footer",
        ));
    }

    let payload = &raw[..raw.len() - 8];
    let mut footer = [0u8; 4];
    footer.copy_from_slice(&raw[raw.len() - 4..]);
    let stored_crc = u32::from_be_bytes(footer);
    let computed_crc = crc32fast::hash(payload);
    if computed_crc != stored_crc {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "snapshot CRC32 mismatch: expected {:#010x}, got {:#010x}",
                stored_crc, computed_crc
            ),
        ));
    }

    bincode::deserialize(payload).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
}

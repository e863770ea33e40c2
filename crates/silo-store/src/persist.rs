//! On-disk format of the index: a single versioned JSON document holding the
//! high-water sequence and the full record list.
//!
//! Writes go to `<path>.tmp` and are renamed into place, so a crash mid-write
//! leaves either the old document or the new one, never a torn file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::models::FileRecord;

/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedIndex {
    version: u32,
    high_water: u64,
    records: Vec<FileRecord>,
}

/// Load persisted state.  `Ok(None)` on first run (no file yet); any parse
/// failure or unknown version is [`IndexError::Corrupt`].
pub fn load(path: &Path) -> Result<Option<(u64, Vec<FileRecord>)>> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(IndexError::Corrupt(format!("read failed: {e}"))),
    };

    let parsed: PersistedIndex = serde_json::from_slice(&bytes)
        .map_err(|e| IndexError::Corrupt(format!("parse failed: {e}")))?;

    if parsed.version != FORMAT_VERSION {
        return Err(IndexError::Corrupt(format!(
            "unknown format version {}",
            parsed.version
        )));
    }

    Ok(Some((parsed.high_water, parsed.records)))
}

/// Atomically replace the persisted state.
pub fn save(path: &Path, high_water: u64, records: &[FileRecord]) -> Result<()> {
    let doc = PersistedIndex {
        version: FORMAT_VERSION,
        high_water,
        records: records.to_vec(),
    };

    let json = serde_json::to_vec_pretty(&doc)
        .map_err(|e| IndexError::PersistFailed(format!("serialize failed: {e}")))?;

    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, &json)
        .map_err(|e| IndexError::PersistFailed(format!("write {}: {e}", tmp.display())))?;
    std::fs::rename(&tmp, path)
        .map_err(|e| IndexError::PersistFailed(format!("rename {}: {e}", path.display())))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use silo_shared::StorageRef;

    fn record(seq: u64) -> FileRecord {
        FileRecord {
            storage_ref: StorageRef(seq as i64),
            file_name: format!("file_{seq}.bin"),
            caption: None,
            size_bytes: seq,
            mime_type: "application/octet-stream".to_string(),
            checksum: None,
            uploaded_at: Utc::now(),
            sequence_no: seq,
            tombstoned: false,
        }
    }

    #[test]
    fn missing_file_is_first_run() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("index.json")).unwrap().is_none());
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let records = vec![record(1), record(2)];

        save(&path, 2, &records).unwrap();
        let (high_water, loaded) = load(&path).unwrap().unwrap();
        assert_eq!(high_water, 2);
        assert_eq!(loaded, records);
    }

    #[test]
    fn garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, b"{ not json").unwrap();

        assert!(matches!(load(&path), Err(IndexError::Corrupt(_))));
    }

    #[test]
    fn unknown_version_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(
            &path,
            br#"{"version": 99, "high_water": 0, "records": []}"#,
        )
        .unwrap();

        assert!(matches!(load(&path), Err(IndexError::Corrupt(_))));
    }
}

//! Periodic snapshot export for the backup collaborator.
//!
//! Each pass writes the full [`IndexSnapshot`] to a timestamped JSON file
//! (temp file + rename, same discipline as the index itself) and prunes the
//! oldest exports beyond the retention limit.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info};

use silo_store::IndexStore;

pub struct SnapshotWriter {
    store: Arc<IndexStore>,
    dir: PathBuf,
    max_keep: usize,
}

impl SnapshotWriter {
    pub fn new(store: Arc<IndexStore>, dir: PathBuf, max_keep: usize) -> Self {
        Self {
            store,
            dir,
            max_keep: max_keep.max(1),
        }
    }

    /// Export one snapshot and prune old ones.  Returns the written path.
    pub async fn run_once(&self) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating snapshot dir {}", self.dir.display()))?;

        let snapshot = self.store.export_snapshot().await;
        let stamp = snapshot.exported_at.format("%Y%m%d_%H%M%S");
        let path = self.dir.join(format!("snapshot_{stamp}.json"));

        let json = serde_json::to_vec_pretty(&snapshot).context("serializing snapshot")?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, &json)
            .with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("renaming into {}", path.display()))?;

        info!(
            path = %path.display(),
            records = snapshot.records.len(),
            high_water = snapshot.high_water,
            "snapshot exported"
        );

        self.prune().context("pruning old snapshots")?;
        Ok(path)
    }

    /// Remove the oldest snapshots beyond the retention limit.  Name order
    /// is chronological thanks to the timestamp format.
    fn prune(&self) -> anyhow::Result<()> {
        let mut snapshots: Vec<PathBuf> = std::fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("snapshot_") && n.ends_with(".json"))
            })
            .collect();
        snapshots.sort();

        while snapshots.len() > self.max_keep {
            let oldest = snapshots.remove(0);
            std::fs::remove_file(&oldest)?;
            debug!(path = %oldest.display(), "pruned old snapshot");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use silo_shared::StorageRef;
    use silo_store::{IndexSnapshot, RecordDraft, StoreOptions};

    async fn store_with_one_record(dir: &tempfile::TempDir) -> Arc<IndexStore> {
        let store = Arc::new(
            IndexStore::open(dir.path().join("index.json"), StoreOptions::default()).unwrap(),
        );
        store
            .insert(RecordDraft {
                storage_ref: StorageRef(1),
                file_name: "a.mp4".to_string(),
                caption: None,
                size_bytes: 1,
                mime_type: "video/mp4".to_string(),
                checksum: None,
                uploaded_at: Utc::now(),
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn snapshot_is_valid_and_restorable() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_one_record(&dir).await;
        let writer = SnapshotWriter::new(store, dir.path().join("backups"), 5);

        let path = writer.run_once().await.unwrap();
        let bytes = std::fs::read(&path).unwrap();
        let snapshot: IndexSnapshot = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(snapshot.high_water, 1);
        assert_eq!(snapshot.records.len(), 1);
    }

    #[tokio::test]
    async fn retention_prunes_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_one_record(&dir).await;
        let backups = dir.path().join("backups");
        let writer = SnapshotWriter::new(store, backups.clone(), 2);

        // Timestamps have second resolution; pre-seed distinct names instead
        // of sleeping through three wall-clock seconds.
        std::fs::create_dir_all(&backups).unwrap();
        std::fs::write(backups.join("snapshot_19990101_000000.json"), b"{}").unwrap();
        std::fs::write(backups.join("snapshot_19990101_000001.json"), b"{}").unwrap();

        writer.run_once().await.unwrap();

        let mut names: Vec<String> = std::fs::read_dir(&backups)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names.len(), 2);
        assert_eq!(names[0], "snapshot_19990101_000001.json");
    }
}

//! Reconciliation: re-derive index truth from the channel.
//!
//! Covers three kinds of drift: messages added to the channel behind our
//! back, crashes between forward and insert, and external deletions (which
//! become tombstones).  Also hosts the corrupt-state recovery path, where a
//! full rebuild replaces unreadable persisted state.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use silo_shared::ChannelPlatform;
use silo_store::{IndexError, IndexStore, ReconcileStats, StoreOptions};

use crate::error::ReconcileError;

/// Periodic / on-demand channel re-scan.
pub struct Reconciler {
    platform: Arc<dyn ChannelPlatform>,
    store: Arc<IndexStore>,
}

impl Reconciler {
    pub fn new(platform: Arc<dyn ChannelPlatform>, store: Arc<IndexStore>) -> Self {
        Self { platform, store }
    }

    /// One full pass: scan the channel, apply the rebuild.
    pub async fn run_once(&self) -> Result<ReconcileStats, ReconcileError> {
        let messages = self.platform.scan_channel_messages().await?;
        let stats = self.store.rebuild(&messages).await?;
        Ok(stats)
    }
}

/// Open the index at `path`; if persisted state is corrupt, start empty and
/// rebuild from a channel scan (the channel is the source of truth).
pub async fn open_or_rebuild(
    path: &Path,
    options: StoreOptions,
    platform: Arc<dyn ChannelPlatform>,
) -> Result<(IndexStore, Option<ReconcileStats>), ReconcileError> {
    match IndexStore::open(path, options.clone()) {
        Ok(store) => Ok((store, None)),
        Err(IndexError::Corrupt(reason)) => {
            warn!(reason = %reason, "index corrupt, rebuilding from channel");
            let store = IndexStore::create_empty(path, options);
            let messages = platform.scan_channel_messages().await?;
            let stats = store.rebuild(&messages).await?;
            info!(added = stats.added, "index rebuilt from channel");
            Ok((store, Some(stats)))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use silo_shared::memory::InMemoryChannel;
    use silo_shared::{FileMessage, StorageRef};

    fn file_msg(storage_ref: i64, name: &str) -> FileMessage {
        FileMessage {
            storage_ref: StorageRef(storage_ref),
            file_name: name.to_string(),
            caption: None,
            size_bytes: 1,
            mime_type: "video/mp4".to_string(),
            checksum: None,
            posted_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn externally_added_messages_are_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        let channel = Arc::new(InMemoryChannel::new());
        let store = Arc::new(
            IndexStore::open(dir.path().join("index.json"), StoreOptions::default()).unwrap(),
        );

        channel.post(file_msg(1, "a.mp4")).await;
        channel.post(file_msg(2, "b.mp4")).await;

        let reconciler = Reconciler::new(channel.clone(), store.clone());
        let stats = reconciler.run_once().await.unwrap();
        assert_eq!(stats.added, 2);
        assert_eq!(store.stats().await.record_count, 2);

        // External deletion becomes a tombstone on the next pass.
        channel.delete(StorageRef(1)).await;
        let stats = reconciler.run_once().await.unwrap();
        assert_eq!(stats.tombstoned, 1);
        assert!(store.lookup(StorageRef(1)).await.unwrap().tombstoned);
    }

    #[tokio::test]
    async fn corrupt_index_is_rebuilt_from_channel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, b"garbage").unwrap();

        let channel = Arc::new(InMemoryChannel::new());
        channel.post(file_msg(1, "a.mp4")).await;
        channel.post(file_msg(2, "b.mp4")).await;

        let (store, stats) = open_or_rebuild(&path, StoreOptions::default(), channel)
            .await
            .unwrap();
        let stats = stats.expect("rebuild must have run");
        assert_eq!(stats.added, 2);
        assert_eq!(store.stats().await.record_count, 2);

        // The rebuilt state is durable: a plain reopen succeeds now.
        drop(store);
        let reopened = IndexStore::open(&path, StoreOptions::default()).unwrap();
        assert_eq!(reopened.stats().await.record_count, 2);
    }
}

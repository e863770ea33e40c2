//! Batched re-delivery of matched objects.
//!
//! The platform imposes throughput limits, so copies go out in bounded
//! batches with a pause between them.  Reports are per-item: a tombstoned or
//! since-deleted reference is `Missing` for that item only, never a
//! page-level abort.  The run is pull-based; dropping it between batches
//! cancels the remainder, and already-delivered items stay delivered
//! (re-surfacing an immutable stored object is idempotent for the
//! requester).

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use silo_shared::{ChannelPlatform, ChatId, PlatformError, StorageRef};
use silo_store::FileRecord;

/// Per-item delivery outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// Copied; `copy_ref` is the reference of the new message in `dest`.
    Delivered { copy_ref: StorageRef },
    /// Tombstoned in the index or gone from the channel.
    Missing,
    /// Platform failed the copy in a way that is not "gone".
    PlatformError(PlatformError),
}

/// One item's report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub storage_ref: StorageRef,
    pub file_name: String,
    pub status: DeliveryStatus,
}

/// Hands out [`DeliveryRun`]s over a platform handle.
pub struct DeliveryCoordinator {
    platform: Arc<dyn ChannelPlatform>,
    batch_size: usize,
    batch_delay: Duration,
}

impl DeliveryCoordinator {
    pub fn new(
        platform: Arc<dyn ChannelPlatform>,
        batch_size: usize,
        batch_delay: Duration,
    ) -> Self {
        Self {
            platform,
            batch_size: batch_size.max(1),
            batch_delay,
        }
    }

    /// Start delivering `matches` to `dest`.  Nothing is copied until the
    /// caller pulls the first batch.
    pub fn deliver(&self, dest: ChatId, matches: Vec<FileRecord>) -> DeliveryRun {
        DeliveryRun {
            platform: self.platform.clone(),
            dest,
            remaining: matches.into(),
            batch_size: self.batch_size,
            batch_delay: self.batch_delay,
            started: false,
        }
    }
}

/// Lazy sequence of delivery batches.
pub struct DeliveryRun {
    platform: Arc<dyn ChannelPlatform>,
    dest: ChatId,
    remaining: VecDeque<FileRecord>,
    batch_size: usize,
    batch_delay: Duration,
    started: bool,
}

impl DeliveryRun {
    /// Items not yet attempted.
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }

    /// Deliver the next batch, pausing first if this is not the first one.
    /// `None` once everything was attempted.  The await before the copies is
    /// the cancellation point: drop the run there and nothing further goes
    /// out.
    pub async fn next_batch(&mut self) -> Option<Vec<DeliveryReport>> {
        if self.remaining.is_empty() {
            return None;
        }
        if self.started {
            tokio::time::sleep(self.batch_delay).await;
        }
        self.started = true;

        let mut reports = Vec::with_capacity(self.batch_size);
        for _ in 0..self.batch_size {
            let Some(record) = self.remaining.pop_front() else {
                break;
            };
            let status = self.deliver_one(&record).await;
            if let DeliveryStatus::PlatformError(e) = &status {
                warn!(storage_ref = %record.storage_ref, error = %e, "copy failed");
            }
            reports.push(DeliveryReport {
                storage_ref: record.storage_ref,
                file_name: record.file_name,
                status,
            });
        }
        debug!(
            dest = %self.dest,
            delivered = reports.len(),
            remaining = self.remaining.len(),
            "delivery batch done"
        );
        Some(reports)
    }

    /// Drain every batch.  Convenience for callers without their own pull
    /// loop.
    pub async fn run_to_completion(mut self) -> Vec<DeliveryReport> {
        let mut all = Vec::new();
        while let Some(batch) = self.next_batch().await {
            all.extend(batch);
        }
        all
    }

    async fn deliver_one(&self, record: &FileRecord) -> DeliveryStatus {
        if record.tombstoned {
            return DeliveryStatus::Missing;
        }
        match self.platform.copy_object(record.storage_ref, self.dest).await {
            Ok(copy_ref) => DeliveryStatus::Delivered { copy_ref },
            Err(PlatformError::NotFound) => DeliveryStatus::Missing,
            Err(e) => DeliveryStatus::PlatformError(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use silo_shared::memory::InMemoryChannel;
    use silo_shared::FileMessage;

    fn record(storage_ref: i64, seq: u64, tombstoned: bool) -> FileRecord {
        FileRecord {
            storage_ref: StorageRef(storage_ref),
            file_name: format!("file_{storage_ref}.mp4"),
            caption: None,
            size_bytes: 1,
            mime_type: "video/mp4".to_string(),
            checksum: None,
            uploaded_at: Utc::now(),
            sequence_no: seq,
            tombstoned,
        }
    }

    async fn channel_with(refs: &[i64]) -> Arc<InMemoryChannel> {
        let channel = Arc::new(InMemoryChannel::new());
        for &r in refs {
            channel
                .post(FileMessage {
                    storage_ref: StorageRef(r),
                    file_name: format!("file_{r}.mp4"),
                    caption: None,
                    size_bytes: 1,
                    mime_type: "video/mp4".to_string(),
                    checksum: None,
                    posted_at: Utc::now(),
                })
                .await;
        }
        channel
    }

    fn coordinator(channel: Arc<InMemoryChannel>, batch_size: usize) -> DeliveryCoordinator {
        DeliveryCoordinator::new(channel, batch_size, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn batches_respect_the_configured_size() {
        let channel = channel_with(&[1, 2, 3, 4, 5]).await;
        let coord = coordinator(channel.clone(), 2);

        let mut run = coord.deliver(
            ChatId(7),
            vec![
                record(1, 1, false),
                record(2, 2, false),
                record(3, 3, false),
                record(4, 4, false),
                record(5, 5, false),
            ],
        );

        let sizes = [2, 2, 1];
        for expected in sizes {
            let batch = run.next_batch().await.unwrap();
            assert_eq!(batch.len(), expected);
            assert!(batch
                .iter()
                .all(|r| matches!(r.status, DeliveryStatus::Delivered { .. })));
        }
        assert!(run.next_batch().await.is_none());
        assert_eq!(channel.copies().await.len(), 5);
    }

    #[tokio::test]
    async fn missing_items_do_not_abort_the_batch() {
        let channel = channel_with(&[1, 3]).await;
        let coord = coordinator(channel.clone(), 10);

        // 2 was deleted externally, 4 is tombstoned in the index.
        let reports = coord
            .deliver(
                ChatId(7),
                vec![
                    record(1, 1, false),
                    record(2, 2, false),
                    record(3, 3, false),
                    record(4, 4, true),
                ],
            )
            .run_to_completion()
            .await;

        let statuses: Vec<&DeliveryStatus> = reports.iter().map(|r| &r.status).collect();
        assert!(matches!(statuses[0], DeliveryStatus::Delivered { .. }));
        assert_eq!(*statuses[1], DeliveryStatus::Missing);
        assert!(matches!(statuses[2], DeliveryStatus::Delivered { .. }));
        assert_eq!(*statuses[3], DeliveryStatus::Missing);

        // The tombstoned record never reached the platform.
        assert_eq!(channel.copies().await.len(), 2);
    }

    #[tokio::test]
    async fn platform_errors_are_per_item() {
        let channel = channel_with(&[1, 2]).await;
        channel.fail_next_copy(PlatformError::RateLimited).await;
        let coord = coordinator(channel.clone(), 10);

        let reports = coord
            .deliver(ChatId(7), vec![record(1, 1, false), record(2, 2, false)])
            .run_to_completion()
            .await;

        assert_eq!(
            reports[0].status,
            DeliveryStatus::PlatformError(PlatformError::RateLimited)
        );
        assert!(matches!(reports[1].status, DeliveryStatus::Delivered { .. }));
    }

    #[tokio::test]
    async fn dropping_the_run_cancels_the_remainder() {
        let channel = channel_with(&[1, 2, 3, 4]).await;
        let coord = coordinator(channel.clone(), 2);

        let mut run = coord.deliver(
            ChatId(7),
            vec![
                record(1, 1, false),
                record(2, 2, false),
                record(3, 3, false),
                record(4, 4, false),
            ],
        );
        let first = run.next_batch().await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(run.remaining(), 2);
        drop(run);

        // Only the first batch went out; delivered items stay delivered.
        assert_eq!(channel.copies().await.len(), 2);
    }
}

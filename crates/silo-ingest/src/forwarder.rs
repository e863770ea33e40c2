//! Moves accepted uploads into the permanent storage channel.
//!
//! Dedupe comes first: if the index already holds a live record with the
//! upload's checksum, the existing storage reference is returned and the
//! platform is never touched.  Transient platform failures are retried with
//! jittered exponential backoff so concurrent workers do not hammer the rate
//! limiter in lockstep.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use silo_shared::{ChannelPlatform, PlatformError, StorageRef, Upload};
use silo_store::IndexStore;

use crate::error::ForwardError;

/// Bounded retry schedule with jittered exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), jittered to 50–150%
    /// of the exponential step.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16));
        let capped = exp.min(self.max_delay);
        let jitter: f64 = rand::thread_rng().gen_range(0.5..1.5);
        capped.mul_f64(jitter)
    }
}

/// Forwards uploads into the storage channel.
pub struct Forwarder {
    platform: Arc<dyn ChannelPlatform>,
    store: Arc<IndexStore>,
    retry: RetryPolicy,
}

impl Forwarder {
    pub fn new(
        platform: Arc<dyn ChannelPlatform>,
        store: Arc<IndexStore>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            platform,
            store,
            retry,
        }
    }

    /// Forward an upload, returning its durable storage reference.
    ///
    /// Idempotent per content checksum: a second call with identical content
    /// returns the first call's reference without re-forwarding.  Note that
    /// forwarding alone does not make the file searchable; the index insert
    /// is a separate explicit step (and the reconciler covers a crash
    /// between the two).
    pub async fn forward(&self, upload: &Upload) -> Result<StorageRef, ForwardError> {
        let checksum = upload.checksum();
        if let Some(existing) = self.store.find_by_checksum(&checksum).await {
            debug!(
                checksum = checksum.short(),
                storage_ref = %existing.storage_ref,
                "duplicate content, skipping forward"
            );
            return Ok(existing.storage_ref);
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.platform.submit_object(upload).await {
                Ok(storage_ref) => {
                    debug!(
                        storage_ref = %storage_ref,
                        file = %upload.metadata.file_name,
                        attempt,
                        "forwarded upload"
                    );
                    return Ok(storage_ref);
                }
                Err(e) if e.is_transient() => {
                    if attempt >= self.retry.max_attempts {
                        return Err(ForwardError::Unavailable {
                            attempts: attempt,
                            last: e,
                        });
                    }
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "transient platform error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(PlatformError::Rejected(reason)) => {
                    return Err(ForwardError::Rejected(reason));
                }
                Err(e) => return Err(ForwardError::Rejected(e.to_string())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use silo_shared::memory::InMemoryChannel;
    use silo_shared::UploadMetadata;
    use silo_store::{RecordDraft, StoreOptions};

    fn upload(name: &str, content: &[u8]) -> Upload {
        Upload::new(
            UploadMetadata {
                file_name: name.to_string(),
                caption: None,
                size_bytes: content.len() as u64,
                mime_type: "video/mp4".to_string(),
            },
            content.to_vec(),
        )
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    async fn setup() -> (Arc<InMemoryChannel>, Arc<IndexStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            IndexStore::open(dir.path().join("index.json"), StoreOptions::default()).unwrap(),
        );
        (Arc::new(InMemoryChannel::new()), store, dir)
    }

    #[tokio::test]
    async fn forward_returns_fresh_reference() {
        let (channel, store, _dir) = setup().await;
        let forwarder = Forwarder::new(channel.clone(), store, fast_retry());

        let r = forwarder.forward(&upload("a.mp4", b"content")).await.unwrap();
        assert_eq!(channel.len().await, 1);
        assert_eq!(r, StorageRef(1));
    }

    #[tokio::test]
    async fn duplicate_checksum_skips_platform() {
        let (channel, store, _dir) = setup().await;

        // Index already knows this content.
        let existing = upload("a.mp4", b"same bytes");
        store
            .insert(RecordDraft {
                storage_ref: StorageRef(42),
                file_name: "a.mp4".to_string(),
                caption: None,
                size_bytes: 10,
                mime_type: "video/mp4".to_string(),
                checksum: Some(existing.checksum()),
                uploaded_at: chrono::Utc::now(),
            })
            .await
            .unwrap();

        let forwarder = Forwarder::new(channel.clone(), store, fast_retry());
        let r = forwarder
            .forward(&upload("renamed.mp4", b"same bytes"))
            .await
            .unwrap();

        assert_eq!(r, StorageRef(42));
        assert!(channel.is_empty().await, "platform must not be touched");
    }

    #[tokio::test]
    async fn transient_errors_are_retried_then_succeed() {
        let (channel, store, _dir) = setup().await;
        channel.fail_next_submit(PlatformError::RateLimited).await;
        channel
            .fail_next_submit(PlatformError::Unavailable("timeout".into()))
            .await;

        let forwarder = Forwarder::new(channel.clone(), store, fast_retry());
        let r = forwarder.forward(&upload("a.mp4", b"x")).await.unwrap();
        assert_eq!(r, StorageRef(1));
    }

    #[tokio::test]
    async fn retry_budget_is_bounded() {
        let (channel, store, _dir) = setup().await;
        for _ in 0..3 {
            channel.fail_next_submit(PlatformError::RateLimited).await;
        }

        let forwarder = Forwarder::new(channel.clone(), store, fast_retry());
        let err = forwarder.forward(&upload("a.mp4", b"x")).await.unwrap_err();
        assert!(matches!(
            err,
            ForwardError::Unavailable { attempts: 3, .. }
        ));
    }

    #[tokio::test]
    async fn rejection_is_not_retried() {
        let (channel, store, _dir) = setup().await;
        channel
            .fail_next_submit(PlatformError::Rejected("quota exceeded".into()))
            .await;

        let forwarder = Forwarder::new(channel.clone(), store, fast_retry());
        let err = forwarder.forward(&upload("a.mp4", b"x")).await.unwrap_err();
        assert_eq!(err, ForwardError::Rejected("quota exceeded".into()));

        // The scripted rejection was the only fault; had the forwarder
        // retried, this second call would have consumed nothing.
        assert!(channel.is_empty().await);
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
        };
        for attempt in 1..=8 {
            let d = policy.delay_for(attempt);
            assert!(d >= Duration::from_millis(50), "attempt {attempt}: {d:?}");
            assert!(d <= Duration::from_millis(1_500), "attempt {attempt}: {d:?}");
        }
    }
}

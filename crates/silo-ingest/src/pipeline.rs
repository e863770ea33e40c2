//! Bounded ingestion pipeline.
//!
//! Producers push uploads through an [`IngestHandle`] into a bounded queue
//! and block (backpressure) when it is full; the [`IngestWorker`] pulls,
//! runs filter → caption cleaning → forward → index insert, and answers on a
//! per-upload oneshot.
//!
//! Forward and insert are deliberately separate steps: a crash between them
//! leaves a stored message without a record, which the next reconcile pass
//! picks up.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use silo_shared::{StorageRef, Upload};
use silo_store::{IndexError, IndexStore, RecordDraft};

use crate::caption::clean_caption;
use crate::error::IngestError;
use crate::filter::FilterPolicy;
use crate::forwarder::{Forwarder, RetryPolicy};

/// What ingestion did with an accepted upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub storage_ref: StorageRef,
    pub sequence_no: u64,
    /// The content was already stored; no new forward happened.
    pub deduplicated: bool,
}

struct IngestRequest {
    upload: Upload,
    respond: oneshot::Sender<Result<IngestOutcome, IngestError>>,
}

/// Producer side of the ingestion queue.  Cheap to clone.
#[derive(Clone)]
pub struct IngestHandle {
    tx: mpsc::Sender<IngestRequest>,
}

impl IngestHandle {
    /// Queue an upload and wait for its outcome.  Blocks while the queue is
    /// full.
    pub async fn submit(&self, upload: Upload) -> Result<IngestOutcome, IngestError> {
        let (respond, rx) = oneshot::channel();
        self.tx
            .send(IngestRequest { upload, respond })
            .await
            .map_err(|_| IngestError::QueueClosed)?;
        rx.await.map_err(|_| IngestError::QueueClosed)?
    }
}

/// Consumer side: single worker loop over the queue.
pub struct IngestWorker {
    rx: mpsc::Receiver<IngestRequest>,
    filter: FilterPolicy,
    forwarder: Forwarder,
    store: Arc<IndexStore>,
    insert_retry: RetryPolicy,
    shutdown: watch::Receiver<bool>,
}

impl IngestWorker {
    pub fn new(
        queue_depth: usize,
        filter: FilterPolicy,
        forwarder: Forwarder,
        store: Arc<IndexStore>,
        insert_retry: RetryPolicy,
        shutdown: watch::Receiver<bool>,
    ) -> (IngestHandle, Self) {
        let (tx, rx) = mpsc::channel(queue_depth);
        (
            IngestHandle { tx },
            Self {
                rx,
                filter,
                forwarder,
                store,
                insert_retry,
                shutdown,
            },
        )
    }

    /// Run until shutdown is signalled or every producer is gone.  In-flight
    /// index writes are atomic, so stopping mid-upload never corrupts
    /// persisted state.
    pub async fn run(mut self) {
        info!("ingest worker started");
        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        info!("ingest worker stopping");
                        break;
                    }
                }
                req = self.rx.recv() => {
                    let Some(req) = req else { break };
                    let file = req.upload.metadata.file_name.clone();
                    let result = self.handle(req.upload).await;
                    match &result {
                        Ok(outcome) => debug!(
                            file = %file,
                            storage_ref = %outcome.storage_ref,
                            seq = outcome.sequence_no,
                            deduplicated = outcome.deduplicated,
                            "upload ingested"
                        ),
                        Err(e) => warn!(file = %file, error = %e, "upload failed"),
                    }
                    let _ = req.respond.send(result);
                }
            }
        }
    }

    async fn handle(&self, mut upload: Upload) -> Result<IngestOutcome, IngestError> {
        self.filter.accept(&upload.metadata)?;

        if let Some(caption) = &upload.metadata.caption {
            let cleaned = clean_caption(caption);
            upload.metadata.caption = (!cleaned.is_empty()).then_some(cleaned);
        }

        let checksum = upload.checksum();
        let storage_ref = self.forwarder.forward(&upload).await?;

        // A racing worker may have committed the same checksum while we were
        // forwarding.  The store's single writer makes this deterministic:
        // whoever committed first wins, and we return their record.
        if let Some(existing) = self.store.find_by_checksum(&checksum).await {
            if existing.storage_ref != storage_ref {
                debug!(
                    checksum = checksum.short(),
                    winner = %existing.storage_ref,
                    loser = %storage_ref,
                    "duplicate committed concurrently, skipping insert"
                );
            }
            return Ok(IngestOutcome {
                storage_ref: existing.storage_ref,
                sequence_no: existing.sequence_no,
                deduplicated: true,
            });
        }

        let draft = RecordDraft {
            storage_ref,
            file_name: upload.metadata.file_name.clone(),
            caption: upload.metadata.caption.clone(),
            size_bytes: upload.content.len() as u64,
            mime_type: upload.metadata.mime_type.clone(),
            checksum: Some(checksum),
            uploaded_at: Utc::now(),
        };
        let sequence_no = self.insert_with_retry(draft).await?;

        Ok(IngestOutcome {
            storage_ref,
            sequence_no,
            deduplicated: false,
        })
    }

    /// Busy and PersistFailed are retryable per the store contract; anything
    /// else is surfaced as-is.
    async fn insert_with_retry(&self, draft: RecordDraft) -> Result<u64, IngestError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.store.insert(draft.clone()).await {
                Ok(seq) => return Ok(seq),
                Err(e @ (IndexError::Busy | IndexError::PersistFailed(_))) => {
                    if attempt >= self.insert_retry.max_attempts {
                        return Err(IngestError::Index(e));
                    }
                    let delay = self.insert_retry.delay_for(attempt);
                    warn!(
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "index write failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(IngestError::Index(e)),
            }
        }
    }
}

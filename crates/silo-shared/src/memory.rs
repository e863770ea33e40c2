//! In-process [`ChannelPlatform`] implementation.
//!
//! Backs the test suites and lets a node run end-to-end without platform
//! credentials.  Failures can be scripted per call to exercise retry and
//! reconciliation paths.

use std::collections::{BTreeMap, VecDeque};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::platform::{ChannelPlatform, PlatformError};
use crate::types::{ChannelMessage, ChatId, FileMessage, StorageRef, Upload};

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    messages: BTreeMap<i64, ChannelMessage>,
    /// Scripted failures consumed by successive `submit_object` calls.
    submit_faults: VecDeque<PlatformError>,
    /// Scripted failures consumed by successive `copy_object` calls.
    copy_faults: VecDeque<PlatformError>,
    /// Every successful copy, in order.
    copies: Vec<(StorageRef, ChatId)>,
}

/// An in-memory storage channel.
#[derive(Debug, Default)]
pub struct InMemoryChannel {
    inner: Mutex<Inner>,
}

impl InMemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a message as if an external writer posted it directly to the
    /// channel (bypassing the forwarder).
    pub async fn post(&self, message: FileMessage) -> StorageRef {
        let mut inner = self.inner.lock().await;
        inner.next_id = inner.next_id.max(message.storage_ref.0);
        let storage_ref = message.storage_ref;
        inner
            .messages
            .insert(storage_ref.0, ChannelMessage::File(message));
        storage_ref
    }

    /// Simulate an external deletion of a stored message.
    pub async fn delete(&self, storage_ref: StorageRef) -> bool {
        self.inner.lock().await.messages.remove(&storage_ref.0).is_some()
    }

    /// Queue an error to be returned by the next `submit_object` call.
    pub async fn fail_next_submit(&self, err: PlatformError) {
        self.inner.lock().await.submit_faults.push_back(err);
    }

    /// Queue an error to be returned by the next `copy_object` call.
    pub async fn fail_next_copy(&self, err: PlatformError) {
        self.inner.lock().await.copy_faults.push_back(err);
    }

    /// Successful copies so far, in call order.
    pub async fn copies(&self) -> Vec<(StorageRef, ChatId)> {
        self.inner.lock().await.copies.clone()
    }

    /// Number of messages currently in the channel.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.messages.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ChannelPlatform for InMemoryChannel {
    async fn submit_object(&self, upload: &Upload) -> Result<StorageRef, PlatformError> {
        let mut inner = self.inner.lock().await;
        if let Some(err) = inner.submit_faults.pop_front() {
            return Err(err);
        }

        inner.next_id += 1;
        let storage_ref = StorageRef(inner.next_id);
        let message = FileMessage {
            storage_ref,
            file_name: upload.metadata.file_name.clone(),
            caption: upload.metadata.caption.clone(),
            size_bytes: upload.content.len() as u64,
            mime_type: upload.metadata.mime_type.clone(),
            checksum: Some(upload.checksum()),
            posted_at: Utc::now(),
        };
        inner.messages.insert(storage_ref.0, ChannelMessage::File(message));
        Ok(storage_ref)
    }

    async fn copy_object(
        &self,
        storage_ref: StorageRef,
        dest: ChatId,
    ) -> Result<StorageRef, PlatformError> {
        let mut inner = self.inner.lock().await;
        if let Some(err) = inner.copy_faults.pop_front() {
            return Err(err);
        }
        if !inner.messages.contains_key(&storage_ref.0) {
            return Err(PlatformError::NotFound);
        }

        inner.next_id += 1;
        let copy_ref = StorageRef(inner.next_id);
        inner.copies.push((storage_ref, dest));
        Ok(copy_ref)
    }

    async fn scan_channel_messages(&self) -> Result<Vec<ChannelMessage>, PlatformError> {
        Ok(self.inner.lock().await.messages.values().cloned().collect())
    }
}

//! The messaging-platform boundary.
//!
//! The core never talks to the real platform directly; everything goes
//! through [`ChannelPlatform`], which classifies every failure into one of
//! four [`PlatformError`] cases so callers can decide between retry and
//! surface.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{ChannelMessage, ChatId, StorageRef, Upload};

/// Classified platform failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The platform asked us to slow down.  Transient.
    #[error("Rate limited by platform")]
    RateLimited,

    /// Timeout, connection loss, 5xx.  Transient.
    #[error("Platform unavailable: {0}")]
    Unavailable(String),

    /// Quota exceeded, banned content, permission revoked.  Permanent.
    #[error("Rejected by platform: {0}")]
    Rejected(String),

    /// The referenced message no longer exists.
    #[error("Message not found on platform")]
    NotFound,
}

impl PlatformError {
    /// Whether a retry with backoff is worthwhile.
    pub fn is_transient(&self) -> bool {
        matches!(self, PlatformError::RateLimited | PlatformError::Unavailable(_))
    }
}

/// Capability set the core requires from the messaging platform.
#[async_trait]
pub trait ChannelPlatform: Send + Sync {
    /// Place an upload into the permanent storage channel, returning its
    /// durable reference.
    async fn submit_object(&self, upload: &Upload) -> Result<StorageRef, PlatformError>;

    /// Re-surface a stored object into `dest` (copy, not move).  Returns the
    /// reference of the copy.
    async fn copy_object(&self, storage_ref: StorageRef, dest: ChatId)
        -> Result<StorageRef, PlatformError>;

    /// Walk every message currently observable in the storage channel.
    async fn scan_channel_messages(&self) -> Result<Vec<ChannelMessage>, PlatformError>;
}

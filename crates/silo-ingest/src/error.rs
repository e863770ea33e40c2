use thiserror::Error;

use silo_shared::PlatformError;
use silo_store::IndexError;

/// Why the filter turned an upload away.  Non-retryable and user-facing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterRejection {
    #[error("File too large: {size} bytes (max {max})")]
    TooLarge { size: u64, max: u64 },

    #[error("File type not allowed: {0}")]
    DisallowedType(String),

    #[error("Blocked by policy: matched pattern {0}")]
    PolicyBlocked(String),
}

/// Failure to place an upload into the storage channel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ForwardError {
    /// Transient platform trouble that outlived the retry budget.
    #[error("Platform unavailable after {attempts} attempts: {last}")]
    Unavailable { attempts: u32, last: PlatformError },

    /// Permanent rejection (quota, banned content).  Never retried.
    #[error("Forward rejected: {0}")]
    Rejected(String),
}

/// Anything the ingestion pipeline can surface to an uploader.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Filter(#[from] FilterRejection),

    #[error(transparent)]
    Forward(#[from] ForwardError),

    /// Index write failed after the bounded retry budget.
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    /// The pipeline shut down before the upload was handled.
    #[error("Ingestion queue closed")]
    QueueClosed,
}

/// Failure of a reconcile pass or of corrupt-state recovery.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Channel scan failed: {0}")]
    Platform(#[from] PlatformError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),
}

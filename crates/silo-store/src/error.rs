use thiserror::Error;

/// Errors produced by the index store.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Writing the record list to disk failed.  The in-memory state was not
    /// mutated and the high-water sequence did not advance; the caller
    /// should retry the whole insert.
    #[error("Failed to persist index: {0}")]
    PersistFailed(String),

    /// The writer could not acquire exclusive access within the bounded
    /// wait.  Retry with backoff.
    #[error("Index busy: writer timed out waiting for exclusive access")]
    Busy,

    /// Persisted state failed to parse or carries an unknown format version.
    /// The channel is the source of truth; rebuild from a scan.
    #[error("Index state corrupt: {0}")]
    Corrupt(String),

    /// No record under the given storage reference.
    #[error("Record not found")]
    NotFound,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, IndexError>;

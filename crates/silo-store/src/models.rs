//! Domain model structs persisted in the index.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be written
//! straight into the on-disk record list and handed to API consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use silo_shared::{Checksum, FileMessage, StorageRef};

// ---------------------------------------------------------------------------
// FileRecord
// ---------------------------------------------------------------------------

/// The atomic indexed unit: one stored file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRecord {
    /// Durable reference of the stored message.  Unique across the index.
    pub storage_ref: StorageRef,
    /// Original file name; searched.
    pub file_name: String,
    /// Free-text caption; searched.
    pub caption: Option<String>,
    pub size_bytes: u64,
    pub mime_type: String,
    /// Content digest, when known.  Drives ingestion-time dedupe.
    pub checksum: Option<Checksum>,
    pub uploaded_at: DateTime<Utc>,
    /// Locally assigned, strictly increasing.  The stable sort key.
    pub sequence_no: u64,
    /// Set when the underlying message is no longer observed in the channel.
    /// Tombstoned records are kept so sequence ordering stays stable.
    #[serde(default)]
    pub tombstoned: bool,
}

impl FileRecord {
    /// Case-normalized search haystack: file name plus caption, with every
    /// non-alphanumeric run collapsed to a single space.
    pub fn haystack(&self) -> String {
        let mut text = self.file_name.clone();
        if let Some(caption) = &self.caption {
            text.push(' ');
            text.push_str(caption);
        }
        normalize(&text)
    }

    /// AND-substring match: every token must occur in the haystack.
    pub fn matches_tokens(&self, tokens: &[String]) -> bool {
        let haystack = self.haystack();
        tokens.iter().all(|t| haystack.contains(t.as_str()))
    }
}

/// Lowercase `text` and collapse every non-alphanumeric run into one space.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(c.to_lowercase());
        } else {
            pending_space = true;
        }
    }
    out
}

// ---------------------------------------------------------------------------
// RecordDraft
// ---------------------------------------------------------------------------

/// Everything the caller supplies for an insert; the store itself assigns
/// `sequence_no`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDraft {
    pub storage_ref: StorageRef,
    pub file_name: String,
    pub caption: Option<String>,
    pub size_bytes: u64,
    pub mime_type: String,
    pub checksum: Option<Checksum>,
    pub uploaded_at: DateTime<Utc>,
}

impl From<&FileMessage> for RecordDraft {
    fn from(msg: &FileMessage) -> Self {
        Self {
            storage_ref: msg.storage_ref,
            file_name: msg.file_name.clone(),
            caption: msg.caption.clone(),
            size_bytes: msg.size_bytes,
            mime_type: msg.mime_type.clone(),
            checksum: msg.checksum.clone(),
            uploaded_at: msg.posted_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot & stats
// ---------------------------------------------------------------------------

/// Point-in-time materialization of the whole index.  The unit of backup
/// and of crash recovery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexSnapshot {
    /// On-disk format version of the record list.
    pub version: u32,
    /// Largest sequence number ever assigned.
    pub high_water: u64,
    pub exported_at: DateTime<Utc>,
    pub records: Vec<FileRecord>,
}

/// Outcome of one reconcile pass over the channel.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Messages observed in the channel scan.
    pub scanned: usize,
    /// Records synthesized for previously unknown storage refs.
    pub added: usize,
    /// Records whose message is no longer observed.
    pub tombstoned: usize,
    /// Tombstoned records whose message reappeared.
    pub revived: usize,
}

/// Read-only aggregate exposed to the dashboard collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStats {
    /// Live (non-tombstoned) records.
    pub record_count: usize,
    pub tombstone_count: usize,
    /// High-water sequence; 0 when nothing was ever inserted.
    pub last_insert_sequence: u64,
    /// Bumped on every committed mutation.
    pub revision: u64,
    pub last_reconcile: Option<ReconcileStats>,
}

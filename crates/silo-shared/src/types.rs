use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Durable identifier of a message in the permanent storage channel.
///
/// Opaque to everything except the platform boundary; the core only compares
/// and stores it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StorageRef(pub i64);

impl std::fmt::Display for StorageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A chat (user or group) that delivered files are copied into.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Checksum
// ---------------------------------------------------------------------------

/// BLAKE3 content digest, stored as hex.  Used as the ingestion-time
/// deduplication key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Checksum(String);

impl Checksum {
    /// Hash raw file content.
    pub fn of(content: &[u8]) -> Self {
        Self(blake3::hash(content).to_hex().to_string())
    }

    /// Wrap an already-computed hex digest (e.g. read back from the index).
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 hex chars, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Uploads
// ---------------------------------------------------------------------------

/// Metadata attached to an incoming upload, as reported by the platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadMetadata {
    /// Original file name (may be empty for unnamed media).
    pub file_name: String,
    /// Free-text caption, if any.
    pub caption: Option<String>,
    /// Declared size in bytes.
    pub size_bytes: u64,
    /// MIME type as reported by the platform (not trusted, only filtered on).
    pub mime_type: String,
}

/// An upload in flight: metadata plus the raw content.
#[derive(Debug, Clone)]
pub struct Upload {
    pub metadata: UploadMetadata,
    pub content: Bytes,
}

impl Upload {
    pub fn new(metadata: UploadMetadata, content: impl Into<Bytes>) -> Self {
        Self {
            metadata,
            content: content.into(),
        }
    }

    /// Content digest used for deduplication.
    pub fn checksum(&self) -> Checksum {
        Checksum::of(&self.content)
    }
}

// ---------------------------------------------------------------------------
// Channel messages
// ---------------------------------------------------------------------------

/// A file-bearing message observed in the storage channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileMessage {
    pub storage_ref: StorageRef,
    pub file_name: String,
    pub caption: Option<String>,
    pub size_bytes: u64,
    pub mime_type: String,
    /// Content digest, when the platform (or our own forwarder) knows it.
    pub checksum: Option<Checksum>,
    pub posted_at: DateTime<Utc>,
}

/// Tagged view over the message shapes the platform can hand us.
///
/// Extraction is total: every variant answers [`storage_ref`](Self::storage_ref)
/// and [`as_file`](Self::as_file); non-file messages simply yield `None`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChannelMessage {
    /// A message carrying an indexable file.
    File(FileMessage),
    /// A plain text message (service notices, pinned text, ...).
    Text {
        storage_ref: StorageRef,
        body: String,
        posted_at: DateTime<Utc>,
    },
    /// Anything we do not recognize; kept so scans stay total.
    Unknown { storage_ref: StorageRef },
}

impl ChannelMessage {
    pub fn storage_ref(&self) -> StorageRef {
        match self {
            ChannelMessage::File(f) => f.storage_ref,
            ChannelMessage::Text { storage_ref, .. } => *storage_ref,
            ChannelMessage::Unknown { storage_ref } => *storage_ref,
        }
    }

    /// The file payload, if this message carries one.
    pub fn as_file(&self) -> Option<&FileMessage> {
        match self {
            ChannelMessage::File(f) => Some(f),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_stable() {
        let a = Checksum::of(b"hello");
        let b = Checksum::of(b"hello");
        let c = Checksum::of(b"world");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.short().len(), 8);
    }

    #[test]
    fn extraction_is_total() {
        let text = ChannelMessage::Text {
            storage_ref: StorageRef(7),
            body: "pinned".into(),
            posted_at: Utc::now(),
        };
        let unknown = ChannelMessage::Unknown {
            storage_ref: StorageRef(8),
        };
        assert_eq!(text.storage_ref(), StorageRef(7));
        assert!(text.as_file().is_none());
        assert!(unknown.as_file().is_none());
    }
}

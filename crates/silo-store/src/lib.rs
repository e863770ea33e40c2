//! # silo-store
//!
//! The searchable index over the storage channel: a persistent, versioned
//! record list keyed by storage reference, guarded by a single-writer /
//! shared-reader discipline.
//!
//! Durability model: every committed mutation rewrites the full record list
//! to a temp file and renames it into place, so on-disk state is always a
//! complete, parseable document.  The sequence-number high-water mark lives
//! in the same document and is therefore crash-safe: a sequence number is
//! never reused across restarts.

pub mod models;
pub mod persist;
pub mod store;

mod error;

pub use error::{IndexError, Result};
pub use models::{FileRecord, IndexSnapshot, IndexStats, ReconcileStats, RecordDraft};
pub use store::{IndexStore, StoreOptions};

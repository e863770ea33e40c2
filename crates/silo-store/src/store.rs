//! The [`IndexStore`]: single shared mutable resource of the whole system.
//!
//! Concurrency discipline: one writer, many readers.  Mutations
//! ([`insert`](IndexStore::insert), [`rebuild`](IndexStore::rebuild),
//! [`tombstone`](IndexStore::tombstone), [`load_snapshot`](IndexStore::load_snapshot))
//! take the write half of an async `RwLock` with a bounded wait that
//! escalates to [`IndexError::Busy`]; reads observe a consistent revision and
//! never a partially applied mutation.
//!
//! Durability discipline: the full record list is persisted *before* the
//! in-memory commit.  If persistence fails the call returns
//! [`IndexError::PersistFailed`] and nothing — including the high-water
//! sequence — has changed.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::{RwLock, RwLockWriteGuard};
use tokio::time::timeout;
use tracing::{debug, info};

use silo_shared::{ChannelMessage, Checksum, StorageRef};

use crate::error::{IndexError, Result};
use crate::models::{FileRecord, IndexSnapshot, IndexStats, ReconcileStats, RecordDraft};
use crate::persist;

/// Tuning knobs for the store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// How long a writer waits for exclusive access before giving up with
    /// [`IndexError::Busy`].
    pub write_wait: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            write_wait: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    high_water: u64,
    revision: u64,
    /// Records ordered by sequence number.
    by_seq: BTreeMap<u64, FileRecord>,
    /// Storage-ref lookup into `by_seq`.
    by_ref: HashMap<StorageRef, u64>,
    last_reconcile: Option<ReconcileStats>,
}

impl State {
    fn record_list(&self) -> Vec<FileRecord> {
        self.by_seq.values().cloned().collect()
    }

    fn from_records(high_water: u64, records: Vec<FileRecord>) -> Self {
        let mut state = State::default();
        for record in records {
            state.high_water = state.high_water.max(record.sequence_no);
            state.by_ref.insert(record.storage_ref, record.sequence_no);
            state.by_seq.insert(record.sequence_no, record);
        }
        state.high_water = state.high_water.max(high_water);
        state
    }
}

/// Persistent mapping from storage reference to file metadata.
#[derive(Debug)]
pub struct IndexStore {
    path: PathBuf,
    options: StoreOptions,
    state: RwLock<State>,
}

impl IndexStore {
    /// Open (or create) the index at `path`.
    ///
    /// A missing file is a first run and yields an empty store.  Malformed
    /// persisted state is [`IndexError::Corrupt`]; the caller is expected to
    /// fall back to a rebuild from a channel scan.
    pub fn open(path: impl Into<PathBuf>, options: StoreOptions) -> Result<Self> {
        let path = path.into();
        let state = match persist::load(&path)? {
            Some((high_water, records)) => {
                info!(
                    path = %path.display(),
                    records = records.len(),
                    high_water,
                    "opened index"
                );
                State::from_records(high_water, records)
            }
            None => {
                info!(path = %path.display(), "no index on disk, starting empty");
                State::default()
            }
        };

        Ok(Self {
            path,
            options,
            state: RwLock::new(state),
        })
    }

    /// Create an empty store at `path`, ignoring whatever is on disk.  Used
    /// by the corrupt-state recovery path before a rebuild.
    pub fn create_empty(path: impl Into<PathBuf>, options: StoreOptions) -> Self {
        Self {
            path: path.into(),
            options,
            state: RwLock::new(State::default()),
        }
    }

    async fn write_state(&self) -> Result<RwLockWriteGuard<'_, State>> {
        timeout(self.options.write_wait, self.state.write())
            .await
            .map_err(|_| IndexError::Busy)
    }

    /// Insert (or upsert by storage ref) a record, assigning the next
    /// sequence number.  Durable before returning.
    ///
    /// A second insert with an already-known `storage_ref` never creates a
    /// second row: the existing record keeps its sequence number, metadata is
    /// refreshed, and its tombstone (if any) is cleared.
    pub async fn insert(&self, draft: RecordDraft) -> Result<u64> {
        let mut state = self.write_state().await?;

        if let Some(&seq) = state.by_ref.get(&draft.storage_ref) {
            let existing = state
                .by_seq
                .get(&seq)
                .cloned()
                .ok_or(IndexError::NotFound)?;

            let updated = FileRecord {
                storage_ref: draft.storage_ref,
                file_name: draft.file_name,
                caption: draft.caption,
                size_bytes: draft.size_bytes,
                mime_type: draft.mime_type,
                checksum: draft.checksum,
                uploaded_at: existing.uploaded_at,
                sequence_no: seq,
                tombstoned: false,
            };
            if updated == existing {
                return Ok(seq);
            }

            let list: Vec<FileRecord> = state
                .by_seq
                .values()
                .map(|r| if r.sequence_no == seq { &updated } else { r })
                .cloned()
                .collect();
            persist::save(&self.path, state.high_water, &list)?;

            state.by_seq.insert(seq, updated);
            state.revision += 1;
            debug!(storage_ref = %draft.storage_ref, seq, "refreshed existing record");
            return Ok(seq);
        }

        let seq = state.high_water + 1;
        let record = FileRecord {
            storage_ref: draft.storage_ref,
            file_name: draft.file_name,
            caption: draft.caption,
            size_bytes: draft.size_bytes,
            mime_type: draft.mime_type,
            checksum: draft.checksum,
            uploaded_at: draft.uploaded_at,
            sequence_no: seq,
            tombstoned: false,
        };

        let mut list = state.record_list();
        list.push(record.clone());
        persist::save(&self.path, seq, &list)?;

        state.high_water = seq;
        state.by_ref.insert(record.storage_ref, seq);
        state.by_seq.insert(seq, record);
        state.revision += 1;
        debug!(storage_ref = %draft.storage_ref, seq, "inserted record");
        Ok(seq)
    }

    /// Fetch a record by storage reference.
    pub async fn lookup(&self, storage_ref: StorageRef) -> Result<FileRecord> {
        let state = self.state.read().await;
        state
            .by_ref
            .get(&storage_ref)
            .and_then(|seq| state.by_seq.get(seq))
            .cloned()
            .ok_or(IndexError::NotFound)
    }

    /// Earliest non-tombstoned record with the given content digest, if any.
    /// Backs ingestion-time dedupe.
    pub async fn find_by_checksum(&self, checksum: &Checksum) -> Option<FileRecord> {
        let state = self.state.read().await;
        state
            .by_seq
            .values()
            .find(|r| !r.tombstoned && r.checksum.as_ref() == Some(checksum))
            .cloned()
    }

    /// Every non-tombstoned record whose haystack contains all `tokens`, in
    /// descending sequence order, strictly below the `below` cursor when
    /// given, truncated to `limit`.
    ///
    /// Because the cursor is a sequence number (not an offset), pages stay
    /// correct even if unrelated records are tombstoned between calls.
    pub async fn scan_tokens(
        &self,
        tokens: &[String],
        below: Option<u64>,
        limit: Option<usize>,
    ) -> Vec<FileRecord> {
        let state = self.state.read().await;
        let iter = state
            .by_seq
            .values()
            .rev()
            .filter(|r| below.map_or(true, |cursor| r.sequence_no < cursor))
            .filter(|r| !r.tombstoned && r.matches_tokens(tokens))
            .cloned();
        match limit {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        }
    }

    /// Reconcile the index against a full channel scan.
    ///
    /// - unseen file messages get fresh records (total extraction, so text
    ///   and unknown messages are skipped, never an error);
    /// - indexed refs no longer observed are tombstoned;
    /// - tombstoned refs that reappear are revived.
    ///
    /// One exclusive mutation phase, one persist.
    pub async fn rebuild(&self, messages: &[ChannelMessage]) -> Result<ReconcileStats> {
        let mut state = self.write_state().await?;

        let seen: HashSet<StorageRef> = messages.iter().map(|m| m.storage_ref()).collect();
        let mut stats = ReconcileStats {
            scanned: messages.len(),
            ..Default::default()
        };

        let mut by_seq = state.by_seq.clone();
        let mut by_ref = state.by_ref.clone();
        let mut high_water = state.high_water;

        for msg in messages {
            let Some(file) = msg.as_file() else { continue };
            match by_ref.get(&file.storage_ref).copied() {
                Some(seq) => {
                    if let Some(record) = by_seq.get_mut(&seq) {
                        if record.tombstoned {
                            record.tombstoned = false;
                            stats.revived += 1;
                        }
                    }
                }
                None => {
                    high_water += 1;
                    let draft = RecordDraft::from(file);
                    let record = FileRecord {
                        storage_ref: draft.storage_ref,
                        file_name: draft.file_name,
                        caption: draft.caption,
                        size_bytes: draft.size_bytes,
                        mime_type: draft.mime_type,
                        checksum: draft.checksum,
                        uploaded_at: draft.uploaded_at,
                        sequence_no: high_water,
                        tombstoned: false,
                    };
                    by_ref.insert(record.storage_ref, high_water);
                    by_seq.insert(high_water, record);
                    stats.added += 1;
                }
            }
        }

        for record in by_seq.values_mut() {
            if !record.tombstoned && !seen.contains(&record.storage_ref) {
                record.tombstoned = true;
                stats.tombstoned += 1;
            }
        }

        if stats.added + stats.tombstoned + stats.revived > 0 {
            let list: Vec<FileRecord> = by_seq.values().cloned().collect();
            persist::save(&self.path, high_water, &list)?;
            state.by_seq = by_seq;
            state.by_ref = by_ref;
            state.high_water = high_water;
            state.revision += 1;
        }
        state.last_reconcile = Some(stats);

        info!(
            scanned = stats.scanned,
            added = stats.added,
            tombstoned = stats.tombstoned,
            revived = stats.revived,
            "reconcile pass applied"
        );
        Ok(stats)
    }

    /// Mark a record tombstoned.  Returns `false` if it already was.
    pub async fn tombstone(&self, storage_ref: StorageRef) -> Result<bool> {
        let mut state = self.write_state().await?;
        let seq = *state.by_ref.get(&storage_ref).ok_or(IndexError::NotFound)?;
        let record = state.by_seq.get(&seq).cloned().ok_or(IndexError::NotFound)?;
        if record.tombstoned {
            return Ok(false);
        }

        let list: Vec<FileRecord> = state
            .by_seq
            .values()
            .map(|r| {
                let mut r = r.clone();
                if r.sequence_no == seq {
                    r.tombstoned = true;
                }
                r
            })
            .collect();
        persist::save(&self.path, state.high_water, &list)?;

        if let Some(r) = state.by_seq.get_mut(&seq) {
            r.tombstoned = true;
        }
        state.revision += 1;
        debug!(storage_ref = %storage_ref, seq, "tombstoned record");
        Ok(true)
    }

    /// Point-in-time consistent copy of the whole index.  The unit of
    /// backup.
    pub async fn export_snapshot(&self) -> IndexSnapshot {
        let state = self.state.read().await;
        IndexSnapshot {
            version: persist::FORMAT_VERSION,
            high_water: state.high_water,
            exported_at: chrono::Utc::now(),
            records: state.record_list(),
        }
    }

    /// Replace the store contents with a previously exported snapshot.
    /// Restore path for the backup collaborator; the caller should run a
    /// reconcile afterwards to catch drift since snapshot time.
    pub async fn load_snapshot(&self, snapshot: IndexSnapshot) -> Result<()> {
        let mut state = self.write_state().await?;
        let incoming = State::from_records(snapshot.high_water, snapshot.records);

        persist::save(&self.path, incoming.high_water, &incoming.record_list())?;

        let revision = state.revision + 1;
        let last_reconcile = state.last_reconcile;
        *state = incoming;
        state.revision = revision;
        state.last_reconcile = last_reconcile;
        info!(high_water = state.high_water, "loaded snapshot");
        Ok(())
    }

    /// Read-only aggregate for the dashboard collaborator.
    pub async fn stats(&self) -> IndexStats {
        let state = self.state.read().await;
        let tombstone_count = state.by_seq.values().filter(|r| r.tombstoned).count();
        IndexStats {
            record_count: state.by_seq.len() - tombstone_count,
            tombstone_count,
            last_insert_sequence: state.high_water,
            revision: state.revision,
            last_reconcile: state.last_reconcile,
        }
    }

    /// Path of the persisted record list.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Test hook: hold the write half for `duration` so callers can observe
    /// [`IndexError::Busy`].
    #[cfg(test)]
    async fn hold_write_for(&self, duration: Duration) {
        let _guard = self.state.write().await;
        tokio::time::sleep(duration).await;
    }
}

//! # silo-ingest
//!
//! The write side of Silo: policy filtering, caption cleaning, forwarding
//! into the storage channel with dedupe and jittered backoff, the bounded
//! ingestion queue, and the reconciler that repairs index drift from a full
//! channel scan.

pub mod caption;
pub mod filter;
pub mod forwarder;
pub mod pipeline;
pub mod reconcile;

mod error;

pub use error::{FilterRejection, ForwardError, IngestError, ReconcileError};
pub use filter::FilterPolicy;
pub use forwarder::{Forwarder, RetryPolicy};
pub use pipeline::{IngestHandle, IngestOutcome, IngestWorker};
pub use reconcile::Reconciler;

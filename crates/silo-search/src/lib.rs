//! # silo-search
//!
//! The read side of Silo: keyword queries against the index with opaque
//! cursor pagination, and batched re-delivery of matched objects through the
//! platform boundary.

pub mod deliver;
pub mod engine;

mod error;

pub use deliver::{DeliveryCoordinator, DeliveryReport, DeliveryRun, DeliveryStatus};
pub use engine::{tokenize, SearchEngine, SearchQuery, SearchResult, END_CURSOR};
pub use error::SearchError;

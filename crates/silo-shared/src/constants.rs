/// Application name
pub const APP_NAME: &str = "Silo";

/// Maximum upload size accepted by the default filter policy (2 GiB, the
/// platform's own per-file ceiling)
pub const MAX_UPLOAD_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Number of copy operations issued per delivery batch
pub const DEFAULT_DELIVERY_BATCH_SIZE: usize = 5;

/// Pause between delivery batches, in milliseconds
pub const DEFAULT_DELIVERY_BATCH_DELAY_MS: u64 = 2_000;

/// Largest page a single search call may request
pub const DEFAULT_MAX_PAGE_SIZE: usize = 50;

/// Interval between channel reconcile passes, in seconds (5 minutes)
pub const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 300;

/// Interval between index snapshot exports, in seconds (6 hours)
pub const DEFAULT_SNAPSHOT_INTERVAL_SECS: u64 = 6 * 3600;

/// Snapshots retained on disk before the oldest is pruned
pub const DEFAULT_MAX_SNAPSHOTS: usize = 10;

/// Default HTTP status API port
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Bounded ingestion queue depth
pub const DEFAULT_INGEST_QUEUE_DEPTH: usize = 64;

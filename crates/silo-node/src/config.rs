//! Node configuration loaded from environment variables.
//!
//! All settings have sensible defaults so a node can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use silo_shared::constants::{
    DEFAULT_DELIVERY_BATCH_DELAY_MS, DEFAULT_DELIVERY_BATCH_SIZE, DEFAULT_HTTP_PORT,
    DEFAULT_INGEST_QUEUE_DEPTH, DEFAULT_MAX_PAGE_SIZE, DEFAULT_MAX_SNAPSHOTS,
    DEFAULT_RECONCILE_INTERVAL_SECS, DEFAULT_SNAPSHOT_INTERVAL_SECS, MAX_UPLOAD_SIZE,
};

/// Node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Path of the persisted record list.
    /// Env: `SILO_INDEX_PATH`.  Default: `./data/index.json`
    pub index_path: PathBuf,

    /// Directory for periodic snapshot exports.
    /// Env: `SILO_SNAPSHOT_DIR`.  Default: `./backups`
    pub snapshot_dir: PathBuf,

    /// Socket address for the HTTP status/search API.
    /// Env: `SILO_HTTP_ADDR`.  Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Ingestion queue depth (producers block when full).
    /// Env: `SILO_QUEUE_DEPTH`
    pub queue_depth: usize,

    /// Accepted file extensions, comma-separated, empty for all.
    /// Env: `SILO_ALLOWED_EXTENSIONS`
    pub allowed_extensions: Vec<String>,

    /// Hard upload size ceiling in bytes.
    /// Env: `SILO_MAX_UPLOAD_SIZE`
    pub max_upload_size: u64,

    /// Banned caption/filename patterns (regex), comma-separated.
    /// Env: `SILO_BANNED_PATTERNS`
    pub banned_patterns: Vec<String>,

    /// Largest page a search call may request.
    /// Env: `SILO_MAX_PAGE_SIZE`
    pub max_page_size: usize,

    /// Copy operations per delivery batch.
    /// Env: `SILO_DELIVERY_BATCH_SIZE`
    pub delivery_batch_size: usize,

    /// Pause between delivery batches.
    /// Env: `SILO_DELIVERY_BATCH_DELAY_MS`
    pub delivery_batch_delay: Duration,

    /// Interval between reconcile passes.
    /// Env: `SILO_RECONCILE_INTERVAL_SECS`
    pub reconcile_interval: Duration,

    /// Interval between snapshot exports.
    /// Env: `SILO_SNAPSHOT_INTERVAL_SECS`
    pub snapshot_interval: Duration,

    /// Snapshots kept before pruning the oldest.
    /// Env: `SILO_MAX_SNAPSHOTS`
    pub max_snapshots: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("./data/index.json"),
            snapshot_dir: PathBuf::from("./backups"),
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            queue_depth: DEFAULT_INGEST_QUEUE_DEPTH,
            allowed_extensions: Vec::new(),
            max_upload_size: MAX_UPLOAD_SIZE,
            banned_patterns: Vec::new(),
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            delivery_batch_size: DEFAULT_DELIVERY_BATCH_SIZE,
            delivery_batch_delay: Duration::from_millis(DEFAULT_DELIVERY_BATCH_DELAY_MS),
            reconcile_interval: Duration::from_secs(DEFAULT_RECONCILE_INTERVAL_SECS),
            snapshot_interval: Duration::from_secs(DEFAULT_SNAPSHOT_INTERVAL_SECS),
            max_snapshots: DEFAULT_MAX_SNAPSHOTS,
        }
    }
}

impl NodeConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.  Invalid values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("SILO_INDEX_PATH") {
            config.index_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("SILO_SNAPSHOT_DIR") {
            config.snapshot_dir = PathBuf::from(path);
        }
        if let Ok(addr) = std::env::var("SILO_HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid SILO_HTTP_ADDR, using default"),
            }
        }
        if let Some(n) = env_parse::<usize>("SILO_QUEUE_DEPTH") {
            config.queue_depth = n.max(1);
        }
        if let Ok(list) = std::env::var("SILO_ALLOWED_EXTENSIONS") {
            config.allowed_extensions = split_list(&list);
        }
        if let Some(n) = env_parse::<u64>("SILO_MAX_UPLOAD_SIZE") {
            config.max_upload_size = n;
        }
        if let Ok(list) = std::env::var("SILO_BANNED_PATTERNS") {
            config.banned_patterns = split_list(&list);
        }
        if let Some(n) = env_parse::<usize>("SILO_MAX_PAGE_SIZE") {
            config.max_page_size = n.max(1);
        }
        if let Some(n) = env_parse::<usize>("SILO_DELIVERY_BATCH_SIZE") {
            config.delivery_batch_size = n.max(1);
        }
        if let Some(ms) = env_parse::<u64>("SILO_DELIVERY_BATCH_DELAY_MS") {
            config.delivery_batch_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = env_parse::<u64>("SILO_RECONCILE_INTERVAL_SECS") {
            config.reconcile_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = env_parse::<u64>("SILO_SNAPSHOT_INTERVAL_SECS") {
            config.snapshot_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(n) = env_parse::<usize>("SILO_MAX_SNAPSHOTS") {
            config.max_snapshots = n.max(1);
        }

        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Invalid value, using default");
            None
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let config = NodeConfig::default();
        assert!(config.queue_depth > 0);
        assert!(config.max_page_size > 0);
        assert!(config.allowed_extensions.is_empty());
    }

    #[test]
    fn split_list_trims_and_drops_empties() {
        assert_eq!(split_list("mp4, mkv ,,jpg"), vec!["mp4", "mkv", "jpg"]);
        assert!(split_list("").is_empty());
    }
}

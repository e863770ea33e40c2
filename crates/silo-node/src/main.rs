//! # silo-node
//!
//! Long-running worker that turns a messaging-platform channel into a
//! searchable object store:
//! - **Ingestion** — filter, caption cleaning, forward into the channel with
//!   dedupe and backoff, index insert, all behind a bounded queue
//! - **Reconciliation** — periodic channel re-scan repairing index drift
//! - **Snapshots** — periodic export of the full index for the backup
//!   scheduler
//! - **HTTP API** (axum) — liveness, stats, upload, search and delivery
//!
//! The node runs over the in-process channel implementation; a production
//! deployment substitutes a real platform adapter behind the same
//! `ChannelPlatform` boundary.

mod api;
mod config;
mod health;
mod snapshot;

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use silo_ingest::{FilterPolicy, Forwarder, IngestWorker, Reconciler, RetryPolicy};
use silo_search::{DeliveryCoordinator, SearchEngine};
use silo_shared::memory::InMemoryChannel;
use silo_store::StoreOptions;

use crate::api::AppState;
use crate::config::NodeConfig;
use crate::health::Health;
use crate::snapshot::SnapshotWriter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,silo_node=debug")),
        )
        .init();

    info!("Starting Silo node v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = NodeConfig::from_env();
    info!(?config, "Loaded configuration");

    if let Some(parent) = config.index_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let platform = Arc::new(InMemoryChannel::new());

    // Index store; corrupt persisted state falls back to a channel rebuild.
    let (store, rebuilt) = silo_ingest::reconcile::open_or_rebuild(
        &config.index_path,
        StoreOptions::default(),
        platform.clone(),
    )
    .await?;
    let store = Arc::new(store);
    if let Some(stats) = rebuilt {
        warn!(added = stats.added, "index was rebuilt from channel scan");
    }

    let filter = FilterPolicy::new(
        config.allowed_extensions.clone(),
        config.max_upload_size,
        &config.banned_patterns,
    )?;
    let forwarder = Forwarder::new(platform.clone(), store.clone(), RetryPolicy::default());
    let engine = Arc::new(SearchEngine::new(store.clone(), config.max_page_size));
    let coordinator = Arc::new(DeliveryCoordinator::new(
        platform.clone(),
        config.delivery_batch_size,
        config.delivery_batch_delay,
    ));
    let reconciler = Reconciler::new(platform.clone(), store.clone());
    let snapshots = SnapshotWriter::new(
        store.clone(),
        config.snapshot_dir.clone(),
        config.max_snapshots,
    );

    let health = Arc::new(Health::default());
    let (stop_tx, stop_rx) = watch::channel(false);

    // -----------------------------------------------------------------------
    // 4. Spawn background workers
    // -----------------------------------------------------------------------
    let (ingest_handle, worker) = IngestWorker::new(
        config.queue_depth,
        filter,
        forwarder,
        store.clone(),
        RetryPolicy::default(),
        stop_rx.clone(),
    );
    let ingest_task = {
        let health = health.clone();
        tokio::spawn(async move {
            health.set_ingest(true);
            worker.run().await;
            health.set_ingest(false);
        })
    };

    // Periodic reconcile pass.
    {
        let health = health.clone();
        let mut stop = stop_rx.clone();
        let interval = config.reconcile_interval;
        tokio::spawn(async move {
            health.set_reconcile(true);
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // immediate first tick consumed at startup
            loop {
                tokio::select! {
                    _ = ticker.tick() => match reconciler.run_once().await {
                        Ok(_) => health.set_reconcile(true),
                        Err(e) => {
                            warn!(error = %e, "reconcile pass failed");
                            health.set_reconcile(false);
                        }
                    },
                    _ = stop.changed() => break,
                }
            }
        });
    }

    // Periodic snapshot export.
    {
        let health = health.clone();
        let mut stop = stop_rx.clone();
        let interval = config.snapshot_interval;
        tokio::spawn(async move {
            health.set_snapshot(true);
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => match snapshots.run_once().await {
                        Ok(_) => health.set_snapshot(true),
                        Err(e) => {
                            warn!(error = %e, "snapshot export failed");
                            health.set_snapshot(false);
                        }
                    },
                    _ = stop.changed() => break,
                }
            }
        });
    }

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API until shutdown
    // -----------------------------------------------------------------------
    let state = AppState {
        store,
        engine,
        coordinator,
        ingest: ingest_handle,
        health,
    };

    tokio::select! {
        result = api::serve(state, config.http_addr, config.max_upload_size) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    // In-flight index writes are atomic; tell the workers to stop and wait
    // for the ingest loop to drain.
    let _ = stop_tx.send(true);
    let _ = ingest_task.await;
    info!("Silo node stopped");
    Ok(())
}

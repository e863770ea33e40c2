//! Worker liveness for the supervisor collaborator.
//!
//! Each background worker flips its flag on start and clears it when its
//! loop exits; periodic tasks re-assert theirs every tick.  The aggregate
//! answers the supervisor's liveness probe.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct Health {
    ingest: AtomicBool,
    reconcile: AtomicBool,
    snapshot: AtomicBool,
}

impl Health {
    pub fn set_ingest(&self, up: bool) {
        self.ingest.store(up, Ordering::Relaxed);
    }

    pub fn set_reconcile(&self, up: bool) {
        self.reconcile.store(up, Ordering::Relaxed);
    }

    pub fn set_snapshot(&self, up: bool) {
        self.snapshot.store(up, Ordering::Relaxed);
    }

    /// Liveness probe: every worker is up.
    pub fn is_healthy(&self) -> bool {
        self.ingest.load(Ordering::Relaxed)
            && self.reconcile.load(Ordering::Relaxed)
            && self.snapshot.load(Ordering::Relaxed)
    }
}

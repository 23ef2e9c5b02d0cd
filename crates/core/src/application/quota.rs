// Quota Tracker - running count of nodes believed to exist remotely

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use crate::domain::AdmissionReason;

/// Tracks cumulative node usage against the workspace ceiling
///
/// `admit` is a side-effect-free read: a denied request never perturbs the
/// count. `commit` is the only increasing path and is called by the worker
/// only after the transport reported a confirmed creation count. `seed` is
/// the single externally-writable mutation, intended for startup
/// reconciliation against the remote store's actual count.
pub struct QuotaTracker {
    ceiling: u64,
    current: AtomicU64,
}

impl QuotaTracker {
    pub fn new(ceiling: u64) -> Self {
        Self {
            ceiling,
            current: AtomicU64::new(0),
        }
    }

    /// Check whether `estimated_new_nodes` more nodes would fit
    ///
    /// Deterministic: denies whenever `current + estimated > ceiling`.
    pub fn admit(&self, estimated_new_nodes: u64) -> Result<(), AdmissionReason> {
        let current = self.current.load(Ordering::SeqCst);
        if current.saturating_add(estimated_new_nodes) > self.ceiling {
            debug!(
                current = current,
                requested = estimated_new_nodes,
                ceiling = self.ceiling,
                "Quota admission denied"
            );
            return Err(AdmissionReason::QuotaExceeded {
                current,
                requested: estimated_new_nodes,
                ceiling: self.ceiling,
            });
        }
        Ok(())
    }

    /// Record nodes the transport confirmed were actually created
    pub fn commit(&self, confirmed_new_nodes: u64) {
        let previous = self.current.fetch_add(confirmed_new_nodes, Ordering::SeqCst);
        debug!(
            confirmed = confirmed_new_nodes,
            total = previous + confirmed_new_nodes,
            "Quota committed"
        );
    }

    /// Re-seed from an out-of-band count (startup reconciliation)
    pub fn seed(&self, count: u64) {
        self.current.store(count, Ordering::SeqCst);
        info!(count = count, ceiling = self.ceiling, "Quota seeded");
    }

    pub fn reset(&self) {
        self.seed(0);
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }
}

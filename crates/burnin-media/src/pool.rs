//! Bounded pool for encode jobs.
//!
//! Heavy FFmpeg encodes run behind a fair semaphore: at most `capacity` run at
//! once, and waiters are admitted in the order they arrived.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Gauge of encodes currently holding a pool slot.
pub const METRIC_POOL_ACTIVE: &str = "burnin_encode_pool_active";
/// Gauge of encodes waiting for a pool slot.
pub const METRIC_POOL_QUEUED: &str = "burnin_encode_pool_queued";

/// FIFO-fair concurrency limiter for encode jobs.
#[derive(Clone)]
pub struct EncodePool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    active: Arc<AtomicUsize>,
    queued: Arc<AtomicUsize>,
}

impl EncodePool {
    /// Create a pool admitting `capacity` concurrent jobs (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            active: Arc::new(AtomicUsize::new(0)),
            queued: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wait for a slot, then run `job` to completion while holding it.
    pub async fn run<F, T>(&self, job: F) -> MediaResult<T>
    where
        F: Future<Output = T>,
    {
        self.queued.fetch_add(1, Ordering::SeqCst);
        metrics::gauge!(METRIC_POOL_QUEUED).increment(1.0);

        let acquired = self.semaphore.acquire().await;

        self.queued.fetch_sub(1, Ordering::SeqCst);
        metrics::gauge!(METRIC_POOL_QUEUED).decrement(1.0);

        let _permit =
            acquired.map_err(|_| MediaError::ResourceLimit("Encode pool closed".to_string()))?;

        let slot = ActiveSlot::enter(Arc::clone(&self.active));
        debug!(active = slot.current(), capacity = self.capacity, "Encode slot acquired");

        Ok(job.await)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.capacity,
            active: self.active.load(Ordering::SeqCst),
            queued: self.queued.load(Ordering::SeqCst),
        }
    }
}

impl Default for EncodePool {
    fn default() -> Self {
        Self::new(2)
    }
}

/// Keeps the active counter right even if the job future is dropped.
struct ActiveSlot {
    active: Arc<AtomicUsize>,
}

impl ActiveSlot {
    fn enter(active: Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        metrics::gauge!(METRIC_POOL_ACTIVE).increment(1.0);
        Self { active }
    }

    fn current(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        metrics::gauge!(METRIC_POOL_ACTIVE).decrement(1.0);
    }
}

/// Pool statistics for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub capacity: usize,
    pub active: usize,
    pub queued: usize,
}

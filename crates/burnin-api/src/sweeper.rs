//! Background removal of exports nobody downloaded.
//!
//! Delivered files are removed right after delivery. Files whose download
//! never started, or stopped after an early byte range, are swept here once
//! they are older than the export record TTL. When records are kept in
//! process memory, expired ones are purged on the same tick.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use burnin_media::{remove_stale_files, MediaResult};
use burnin_store::MemoryStore;

use crate::metrics;

/// Periodic sweeper for the export output directory.
pub struct OutputSweeper {
    output_dir: PathBuf,
    max_age: Duration,
    interval: Duration,
    memory_store: Option<Arc<MemoryStore>>,
}

impl OutputSweeper {
    pub fn new(output_dir: impl Into<PathBuf>, max_age: Duration, interval: Duration) -> Self {
        Self {
            output_dir: output_dir.into(),
            max_age,
            interval,
            memory_store: None,
        }
    }

    /// Also purge expired records from an in-memory progress store.
    pub fn with_memory_store(mut self, store: Arc<MemoryStore>) -> Self {
        self.memory_store = Some(store);
        self
    }

    /// Start the sweep loop.
    ///
    /// This function runs indefinitely and should be spawned as a background task.
    pub async fn run(&self) {
        info!(
            dir = %self.output_dir.display(),
            max_age_secs = self.max_age.as_secs(),
            "Starting output sweeper (interval: {:?})",
            self.interval
        );

        let mut ticker = interval(self.interval.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if let Err(e) = self.sweep_once().await {
                warn!("Output sweep failed: {}", e);
            }
            self.purge_expired_records().await;
        }
    }

    /// Drop expired records from the in-memory store, if one is attached.
    pub async fn purge_expired_records(&self) -> usize {
        let Some(store) = &self.memory_store else {
            return 0;
        };
        let purged = store.purge_expired().await;
        if purged > 0 {
            debug!(purged, "Purged expired progress records");
        }
        purged
    }

    /// Run a single sweep and return how many files were removed.
    pub async fn sweep_once(&self) -> MediaResult<usize> {
        let removed = remove_stale_files(&self.output_dir, self.max_age).await?;
        if removed > 0 {
            info!(removed, "Swept stale export outputs");
            metrics::record_outputs_swept(removed);
        } else {
            debug!("No stale export outputs");
        }
        Ok(removed)
    }
}

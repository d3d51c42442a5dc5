//! Application state.

use std::sync::Arc;

use burnin_export::{DownloadHandoff, ExportConfig, ExportOrchestrator};
use burnin_store::{MemoryStore, ProgressStore, RedisStore};
use tracing::{info, warn};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub orchestrator: ExportOrchestrator,
    pub handoff: DownloadHandoff,
    /// Set when records live in process memory and need periodic purging
    pub memory_store: Option<Arc<MemoryStore>>,
}

impl AppState {
    /// Wrap an already assembled orchestrator.
    pub fn with_orchestrator(config: ApiConfig, orchestrator: ExportOrchestrator) -> Self {
        let handoff = DownloadHandoff::new(orchestrator.clone());
        Self {
            config,
            orchestrator,
            handoff,
            memory_store: None,
        }
    }

    /// Build state from the environment: progress store, directories, orchestrator.
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let export_config = ExportConfig::from_env();

        for dir in [
            &export_config.upload_dir,
            &export_config.work_dir,
            &export_config.output_dir,
        ] {
            tokio::fs::create_dir_all(dir).await?;
        }

        let mut memory_store = None;
        let store: Arc<dyn ProgressStore> = match &config.redis_url {
            Some(url) => {
                let store = RedisStore::connect(url).await?;
                info!("Using Redis progress store");
                Arc::new(store)
            }
            None => {
                warn!("REDIS_URL not set, using in-memory progress store (single instance only)");
                let store = Arc::new(MemoryStore::new());
                memory_store = Some(Arc::clone(&store));
                store
            }
        };

        info!(
            upload_dir = %export_config.upload_dir.display(),
            output_dir = %export_config.output_dir.display(),
            max_concurrent_encodes = export_config.max_concurrent_encodes,
            hw_enabled = export_config.hw_enabled,
            "Export config loaded"
        );

        let orchestrator = ExportOrchestrator::new(export_config, store);
        Ok(Self {
            memory_store,
            ..Self::with_orchestrator(config, orchestrator)
        })
    }
}

//! Optional hand-off of finished exports to a project library.

use async_trait::async_trait;
use std::path::Path;

use crate::error::ExportResult;

/// Receives finished exports that belong to a user's project.
///
/// Called after the job is already `complete`; failures are logged and never
/// affect the export.
#[async_trait]
pub trait ProjectSink: Send + Sync {
    async fn save(&self, user_id: &str, output_path: &Path, project_id: &str) -> ExportResult<()>;
}

/// Sink for deployments without a project library.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProjectSink;

#[async_trait]
impl ProjectSink for NoopProjectSink {
    async fn save(&self, user_id: &str, output_path: &Path, project_id: &str) -> ExportResult<()> {
        tracing::debug!(
            user_id,
            project_id,
            output = %output_path.display(),
            "No project sink configured, skipping save"
        );
        Ok(())
    }
}

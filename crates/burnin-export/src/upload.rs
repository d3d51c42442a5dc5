//! Resolution of upload ids to files on disk.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

use crate::error::{ExportError, ExportResult};

/// Maps an upload id to the source video path.
#[async_trait]
pub trait UploadResolver: Send + Sync {
    async fn resolve(&self, upload_id: &str) -> ExportResult<PathBuf>;
}

/// Uploads stored as `<upload_dir>/<upload_id>` or `<upload_dir>/<upload_id>.<ext>`.
#[derive(Debug, Clone)]
pub struct DirUploadResolver {
    upload_dir: PathBuf,
}

impl DirUploadResolver {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
        }
    }
}

/// Upload ids are plain names; anything that could walk the filesystem is rejected.
fn is_safe_upload_id(upload_id: &str) -> bool {
    !upload_id.is_empty()
        && upload_id.len() <= 128
        && !upload_id.starts_with('.')
        && upload_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[async_trait]
impl UploadResolver for DirUploadResolver {
    async fn resolve(&self, upload_id: &str) -> ExportResult<PathBuf> {
        if !is_safe_upload_id(upload_id) {
            return Err(ExportError::upload_not_found(upload_id));
        }

        let exact = self.upload_dir.join(upload_id);
        if fs::metadata(&exact).await.map(|m| m.is_file()).unwrap_or(false) {
            return Ok(exact);
        }

        let mut entries = match fs::read_dir(&self.upload_dir).await {
            Ok(entries) => entries,
            Err(_) => return Err(ExportError::upload_not_found(upload_id)),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let stem_matches = path
                .file_stem()
                .map(|stem| stem == upload_id)
                .unwrap_or(false);
            if stem_matches && entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                return Ok(path);
            }
        }

        Err(ExportError::upload_not_found(upload_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_resolves_exact_and_extension() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("raw"), b"x").await.unwrap();
        fs::write(dir.path().join("clip42.mov"), b"x").await.unwrap();
        let resolver = DirUploadResolver::new(dir.path());

        assert_eq!(resolver.resolve("raw").await.unwrap(), dir.path().join("raw"));
        assert_eq!(
            resolver.resolve("clip42").await.unwrap(),
            dir.path().join("clip42.mov")
        );
    }

    #[tokio::test]
    async fn test_missing_and_unsafe_ids() {
        let dir = TempDir::new().unwrap();
        let resolver = DirUploadResolver::new(dir.path());

        assert!(matches!(
            resolver.resolve("nope").await,
            Err(ExportError::UploadNotFound(_))
        ));
        assert!(matches!(
            resolver.resolve("../etc/passwd").await,
            Err(ExportError::UploadNotFound(_))
        ));
        assert!(matches!(
            resolver.resolve("").await,
            Err(ExportError::UploadNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_upload_dir() {
        let resolver = DirUploadResolver::new("/nonexistent/burnin/uploads");
        assert!(matches!(
            resolver.resolve("abc").await,
            Err(ExportError::UploadNotFound(_))
        ));
    }
}

//! Per-export scratch directories.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::runtime::Handle;

use burnin_models::ExportToken;

use crate::error::ExportResult;

/// Scratch directory for one export.
///
/// Call [`WorkDir::remove`] when done. A directory that is dropped without it
/// (a cancelled or panicking export) is removed on the blocking pool.
#[derive(Debug)]
pub struct WorkDir {
    path: PathBuf,
    removed: bool,
}

impl WorkDir {
    /// Create `<base>/<token>`.
    pub async fn create(base: &Path, token: &ExportToken) -> ExportResult<Self> {
        let path = base.join(token.as_str());
        fs::create_dir_all(&path).await?;
        Ok(Self {
            path,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory and everything in it.
    pub async fn remove(mut self) -> io::Result<()> {
        self.removed = true;
        match fs::remove_dir_all(&self.path).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        let path = std::mem::take(&mut self.path);
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || remove_blocking(&path));
            }
            Err(_) => remove_blocking(&path),
        }
    }
}

fn remove_blocking(path: &Path) {
    if let Err(e) = std::fs::remove_dir_all(path) {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove work dir {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_remove() {
        let base = tempfile::TempDir::new().unwrap();
        let token = ExportToken::new();

        let dir = WorkDir::create(base.path(), &token).await.unwrap();
        let path = dir.path().to_path_buf();
        fs::write(path.join("captions.ass"), b"[Script Info]").await.unwrap();
        assert!(path.exists());

        dir.remove().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_removed_in_background_on_drop() {
        let base = tempfile::TempDir::new().unwrap();
        let token = ExportToken::new();

        let dir = WorkDir::create(base.path(), &token).await.unwrap();
        let path = dir.path().to_path_buf();
        fs::write(path.join("output.mp4"), b"partial").await.unwrap();

        drop(dir);
        for _ in 0..100 {
            if !path.exists() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("work dir still present: {}", path.display());
    }

    #[test]
    fn test_drop_outside_runtime() {
        let base = tempfile::TempDir::new().unwrap();
        let path = base.path().join("scratch");
        std::fs::create_dir_all(&path).unwrap();

        drop(WorkDir {
            path: path.clone(),
            removed: false,
        });
        assert!(!path.exists());
    }
}

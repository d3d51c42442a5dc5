//! Shared fakes for export integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::mpsc;

use burnin_export::{ExportConfig, ExportOrchestrator, ExportResult, ProjectSink};
use burnin_media::{
    CapabilityDetector, EncodeEngine, EncodeInvocation, EngineEvent, HardwareCapability,
    MediaError, MediaResult, MetadataProber,
};
use burnin_models::{ExportRequest, VideoMetadata};
use burnin_store::{MemoryStore, ProgressStore, StoreError, StoreResult};

pub const SEGMENTS: &str = "0:00.0 - 0:01.5\nHallo Welt\n\n0:01.5 - 0:03.0 [HIGHLIGHT]\nbig moment";

/// Engine that writes a fake MP4 and replays a fixed progress script.
pub struct FakeEngine {
    pub progress: Vec<u8>,
    pub delay: Duration,
    pub fail_with: Option<String>,
    pub invocations: Mutex<Vec<EncodeInvocation>>,
    running: AtomicUsize,
    pub peak: AtomicUsize,
}

impl FakeEngine {
    pub fn new(progress: Vec<u8>) -> Self {
        Self {
            progress,
            delay: Duration::ZERO,
            fail_with: None,
            invocations: Mutex::new(Vec::new()),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::new(vec![10, 30])
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(vec![50])
        }
    }

    pub fn last_invocation(&self) -> EncodeInvocation {
        self.invocations
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("engine was never invoked")
    }
}

#[async_trait]
impl EncodeEngine for FakeEngine {
    async fn encode(
        &self,
        invocation: EncodeInvocation,
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> MediaResult<()> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.invocations.lock().unwrap().push(invocation.clone());

        // Subtitle asset must exist while the encoder runs
        assert!(invocation.subtitle.path.exists());

        tokio::fs::write(&invocation.output, b"partial").await?;
        for percent in &self.progress {
            let _ = events.send(EngineEvent::Progress {
                percent: *percent,
                eta_secs: Some(1.0),
            });
            tokio::task::yield_now().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.running.fetch_sub(1, Ordering::SeqCst);

        match &self.fail_with {
            Some(message) => Err(MediaError::ffmpeg_failed(message.clone(), None, Some(1))),
            None => {
                tokio::fs::write(&invocation.output, b"\x00\x00\x00\x18ftypmp42").await?;
                Ok(())
            }
        }
    }
}

pub struct FixedProber(pub VideoMetadata);

#[async_trait]
impl MetadataProber for FixedProber {
    async fn probe(&self, _path: &Path) -> MediaResult<VideoMetadata> {
        Ok(self.0.clone())
    }
}

pub struct FixedDetector {
    pub available: bool,
    pub calls: AtomicUsize,
}

impl FixedDetector {
    pub fn new(available: bool) -> Self {
        Self {
            available,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CapabilityDetector for FixedDetector {
    async fn detect(&self) -> HardwareCapability {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.available {
            HardwareCapability::available()
        } else {
            HardwareCapability::unavailable()
        }
    }

    async fn reset(&self) {}

    fn device(&self) -> Option<&Path> {
        Some(Path::new("/dev/dri/renderD128"))
    }
}

/// Wraps a [`MemoryStore`], recording progress values and failing on demand.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_writes: AtomicBool,
    pub written_progress: Mutex<Vec<u64>>,
}

#[async_trait]
impl ProgressStore for FlakyStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::connection_failed("store offline"));
        }
        if key.starts_with("export:") {
            let record: serde_json::Value = serde_json::from_str(value)?;
            if let Some(progress) = record["progress"].as_u64() {
                self.written_progress.lock().unwrap().push(progress);
            }
        }
        self.inner.set(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.inner.delete(key).await
    }

    async fn take(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.take(key).await
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub saved: Mutex<Vec<(String, PathBuf, String)>>,
}

#[async_trait]
impl ProjectSink for RecordingSink {
    async fn save(&self, user_id: &str, output_path: &Path, project_id: &str) -> ExportResult<()> {
        self.saved.lock().unwrap().push((
            user_id.to_string(),
            output_path.to_path_buf(),
            project_id.to_string(),
        ));
        Ok(())
    }
}

/// Temp directories plus one uploaded file named `upload-1.mp4`.
pub struct Harness {
    pub root: TempDir,
    pub config: ExportConfig,
    pub store: Arc<FlakyStore>,
}

impl Harness {
    pub async fn new() -> Self {
        let root = TempDir::new().unwrap();
        let config = ExportConfig {
            max_concurrent_encodes: 2,
            ..ExportConfig::rooted_at(root.path())
        };
        tokio::fs::create_dir_all(&config.upload_dir).await.unwrap();
        tokio::fs::write(config.upload_dir.join("upload-1.mp4"), b"source video")
            .await
            .unwrap();

        Self {
            root,
            config,
            store: Arc::new(FlakyStore::default()),
        }
    }

    pub fn orchestrator(&self, engine: Arc<FakeEngine>) -> ExportOrchestrator {
        ExportOrchestrator::new(self.config.clone(), self.store.clone())
            .with_engine(engine)
            .with_prober(Arc::new(FixedProber(VideoMetadata {
                duration: 3.0,
                ..VideoMetadata::with_dimensions(1920, 1080)
            })))
            .with_detector(Arc::new(FixedDetector::new(false)))
    }

    pub fn request(&self) -> ExportRequest {
        ExportRequest::new("upload-1", SEGMENTS)
    }
}

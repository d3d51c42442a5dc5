//! Router harness with a fake encoder.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;

use burnin_api::{create_router, ApiConfig, AppState};
use burnin_export::{ExportConfig, ExportOrchestrator};
use burnin_media::{
    DisabledDetector, EncodeEngine, EncodeInvocation, EngineEvent, MediaResult, MetadataProber,
};
use burnin_models::VideoMetadata;
use burnin_store::MemoryStore;

pub const SEGMENTS: &str = "0:00.0 - 0:01.5\nHallo Welt\n\n0:01.5 - 0:03.0\nzweite Zeile";

/// Bytes the fake encoder writes; spans several delivery chunks.
pub fn payload() -> Vec<u8> {
    (0..200_000u32).map(|i| (i % 251) as u8).collect()
}

pub struct PayloadEngine {
    pub delay: Duration,
}

#[async_trait]
impl EncodeEngine for PayloadEngine {
    async fn encode(
        &self,
        invocation: EncodeInvocation,
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> MediaResult<()> {
        for percent in [25, 75] {
            let _ = events.send(EngineEvent::Progress {
                percent,
                eta_secs: None,
            });
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        tokio::fs::write(&invocation.output, payload()).await?;
        Ok(())
    }
}

struct FixedProber;

#[async_trait]
impl MetadataProber for FixedProber {
    async fn probe(&self, _path: &Path) -> MediaResult<VideoMetadata> {
        Ok(VideoMetadata {
            duration: 3.0,
            ..VideoMetadata::with_dimensions(1080, 1920)
        })
    }
}

pub struct TestApp {
    pub root: TempDir,
    pub router: Router,
    pub output_dir: PathBuf,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_engine(PayloadEngine {
            delay: Duration::ZERO,
        })
        .await
    }

    pub async fn with_engine(engine: PayloadEngine) -> Self {
        let root = TempDir::new().unwrap();
        let export_config = ExportConfig::rooted_at(root.path());
        tokio::fs::create_dir_all(&export_config.upload_dir)
            .await
            .unwrap();
        tokio::fs::write(export_config.upload_dir.join("upload-1.mp4"), b"source")
            .await
            .unwrap();
        let output_dir = export_config.output_dir.clone();

        let orchestrator = ExportOrchestrator::new(export_config, Arc::new(MemoryStore::new()))
            .with_engine(Arc::new(engine))
            .with_prober(Arc::new(FixedProber))
            .with_detector(Arc::new(DisabledDetector));

        let config = ApiConfig {
            cleanup_grace: Duration::from_millis(50),
            ..ApiConfig::default()
        };
        let router = create_router(AppState::with_orchestrator(config, orchestrator), None);

        Self {
            root,
            router,
            output_dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> Response<Body> {
        self.send(
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Start an export and poll until it is complete.
    pub async fn completed_export(&self) -> String {
        let response = self
            .post_json("/api/exports", export_body("upload-1"))
            .await;
        assert_eq!(response.status(), 202);
        let token = json(response).await["token"].as_str().unwrap().to_string();

        for _ in 0..200 {
            let status = json(self.get(&format!("/api/exports/{}", token)).await).await;
            match status["status"].as_str() {
                Some("complete") => return token,
                Some("error") => panic!("export failed: {}", status),
                _ => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        }
        panic!("export did not complete");
    }

    pub fn output_file(&self, token: &str) -> PathBuf {
        self.output_dir.join(format!("{}.mp4", token))
    }
}

pub fn export_body(upload_id: &str) -> serde_json::Value {
    serde_json::json!({
        "uploadId": upload_id,
        "segments": SEGMENTS,
        "filename": "Mein Urlaub.mp4",
    })
}

pub async fn bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&bytes(response).await).unwrap()
}

/// Wait for deferred cleanup to remove `path`.
pub async fn wait_removed(path: &Path) -> bool {
    for _ in 0..100 {
        if !path.exists() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

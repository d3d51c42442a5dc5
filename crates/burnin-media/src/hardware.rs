//! Hardware encoder capability detection.
//!
//! Probing launches a short FFmpeg test encode, so results are cached for the
//! life of the detector. Concurrent first callers share a single probe.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::command::check_ffmpeg;

/// Default VAAPI render node.
pub const DEFAULT_VAAPI_DEVICE: &str = "/dev/dri/renderD128";

/// Result of a hardware capability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareCapability {
    pub available: bool,
    pub probed_at: DateTime<Utc>,
}

impl HardwareCapability {
    pub fn available() -> Self {
        Self {
            available: true,
            probed_at: Utc::now(),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            probed_at: Utc::now(),
        }
    }
}

/// Answers "can this host encode on the GPU?".
#[async_trait]
pub trait CapabilityDetector: Send + Sync {
    /// Cached capability, probing on first use.
    async fn detect(&self) -> HardwareCapability;

    /// Forget the cached result so the next `detect` probes again.
    async fn reset(&self);

    /// VAAPI device passed to FFmpeg on the hardware path.
    fn device(&self) -> Option<&Path> {
        None
    }
}

/// A single uncached capability check.
#[async_trait]
pub trait HardwareProbe: Send + Sync {
    async fn probe(&self) -> bool;

    fn device(&self) -> Option<&Path> {
        None
    }
}

/// Caches the result of a [`HardwareProbe`].
pub struct CachedDetector<P> {
    probe: P,
    cached: Mutex<Option<HardwareCapability>>,
    probe_count: AtomicUsize,
}

impl<P: HardwareProbe> CachedDetector<P> {
    pub fn new(probe: P) -> Self {
        Self {
            probe,
            cached: Mutex::new(None),
            probe_count: AtomicUsize::new(0),
        }
    }

    /// Number of probes actually run.
    pub fn probe_count(&self) -> usize {
        self.probe_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<P: HardwareProbe> CapabilityDetector for CachedDetector<P> {
    async fn detect(&self) -> HardwareCapability {
        // Held across the probe so waiters see the first caller's result
        let mut cached = self.cached.lock().await;
        if let Some(capability) = *cached {
            return capability;
        }

        self.probe_count.fetch_add(1, Ordering::SeqCst);
        let capability = if self.probe.probe().await {
            HardwareCapability::available()
        } else {
            HardwareCapability::unavailable()
        };
        info!(available = capability.available, "Hardware encoder capability probed");

        *cached = Some(capability);
        capability
    }

    async fn reset(&self) {
        *self.cached.lock().await = None;
    }

    fn device(&self) -> Option<&Path> {
        self.probe.device()
    }
}

/// Probes VAAPI by opening the render node and running a tiny test encode.
#[derive(Debug, Clone)]
pub struct VaapiProbe {
    device: PathBuf,
    timeout: Duration,
}

impl VaapiProbe {
    pub fn new(device: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            device: device.into(),
            timeout,
        }
    }

    fn test_encode_args(&self) -> Vec<String> {
        let device = self.device.to_string_lossy();
        [
            "-hide_banner",
            "-v",
            "error",
            "-vaapi_device",
            device.as_ref(),
            "-f",
            "lavfi",
            "-i",
            "color=black:s=256x256:d=0.1",
            "-vf",
            "format=nv12,hwupload",
            "-c:v",
            "h264_vaapi",
            "-f",
            "null",
            "-",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

impl Default for VaapiProbe {
    fn default() -> Self {
        Self::new(DEFAULT_VAAPI_DEVICE, Duration::from_secs(10))
    }
}

#[async_trait]
impl HardwareProbe for VaapiProbe {
    async fn probe(&self) -> bool {
        if !tokio::fs::try_exists(&self.device).await.unwrap_or(false) {
            info!(device = %self.device.display(), "VAAPI device not present");
            return false;
        }

        if let Err(e) = tokio::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.device)
            .await
        {
            info!(device = %self.device.display(), "VAAPI device not accessible: {}", e);
            return false;
        }

        let ffmpeg = match check_ffmpeg() {
            Ok(path) => path,
            Err(e) => {
                info!("Hardware probe skipped: {}", e);
                return false;
            }
        };

        let args = self.test_encode_args();
        debug!("Running VAAPI test encode: ffmpeg {}", args.join(" "));

        let run = Command::new(ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(output)) if output.status.success() => true,
            Ok(Ok(output)) => {
                info!(
                    exit_code = ?output.status.code(),
                    "VAAPI test encode failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                false
            }
            Ok(Err(e)) => {
                info!("VAAPI test encode could not start: {}", e);
                false
            }
            Err(_) => {
                info!("VAAPI test encode timed out after {:?}", self.timeout);
                false
            }
        }
    }

    fn device(&self) -> Option<&Path> {
        Some(&self.device)
    }
}

/// Always reports no hardware, for hosts where GPU encoding is switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledDetector;

#[async_trait]
impl CapabilityDetector for DisabledDetector {
    async fn detect(&self) -> HardwareCapability {
        HardwareCapability::unavailable()
    }

    async fn reset(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct SlowProbe {
        answer: bool,
    }

    #[async_trait]
    impl HardwareProbe for SlowProbe {
        async fn probe(&self) -> bool {
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.answer
        }
    }

    #[tokio::test]
    async fn test_result_is_cached() {
        let detector = CachedDetector::new(SlowProbe { answer: true });
        assert!(detector.detect().await.available);
        assert!(detector.detect().await.available);
        assert_eq!(detector.probe_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_callers_share_probe() {
        let detector = Arc::new(CachedDetector::new(SlowProbe { answer: false }));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let detector = Arc::clone(&detector);
                tokio::spawn(async move { detector.detect().await })
            })
            .collect();

        for handle in handles {
            assert!(!handle.await.unwrap().available);
        }
        assert_eq!(detector.probe_count(), 1);
    }

    #[tokio::test]
    async fn test_reset_forces_reprobe() {
        let detector = CachedDetector::new(SlowProbe { answer: true });
        detector.detect().await;
        detector.reset().await;
        detector.detect().await;
        assert_eq!(detector.probe_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_device_is_unavailable() {
        let dir = tempfile::TempDir::new().unwrap();
        let probe = VaapiProbe::new(dir.path().join("renderD999"), Duration::from_secs(1));
        assert!(!probe.probe().await);
        assert_eq!(probe.device(), Some(dir.path().join("renderD999").as_path()));
    }

    #[tokio::test]
    async fn test_unopenable_device_is_unavailable() {
        // A directory exists but cannot be opened read-write
        let dir = tempfile::TempDir::new().unwrap();
        let probe = VaapiProbe::new(dir.path(), Duration::from_secs(1));
        assert!(!probe.probe().await);
    }

    #[test]
    fn test_probe_command_shape() {
        let args = VaapiProbe::default().test_encode_args();
        assert!(args.contains(&"h264_vaapi".to_string()));
        assert!(args.contains(&DEFAULT_VAAPI_DEVICE.to_string()));
        assert_eq!(args.last().map(String::as_str), Some("-"));
    }

    #[tokio::test]
    async fn test_disabled_detector() {
        assert!(!DisabledDetector.detect().await.available);
    }
}

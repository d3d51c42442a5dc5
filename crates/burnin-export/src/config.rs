//! Export pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use burnin_media::DEFAULT_VAAPI_DEVICE;
use burnin_models::{DOWNLOAD_HANDOFF_TTL_SECS, EXPORT_PROGRESS_TTL_SECS};

/// Export pipeline configuration.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Directory holding uploaded source videos
    pub upload_dir: PathBuf,
    /// Scratch space for per-export subtitle and font files
    pub work_dir: PathBuf,
    /// Finished exports awaiting download
    pub output_dir: PathBuf,
    /// Encodes allowed to run at once
    pub max_concurrent_encodes: usize,
    /// TTL of export records; also the age at which unclaimed outputs are swept
    pub export_ttl: Duration,
    /// TTL of one-time download handoffs
    pub download_ttl: Duration,
    /// Font file staged for libass
    pub font_path: Option<PathBuf>,
    pub font_name: String,
    /// Kill encodes running longer than this
    pub encode_timeout: Option<Duration>,
    pub hw_enabled: bool,
    pub hw_device: PathBuf,
    pub hw_probe_timeout: Duration,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("/tmp/burnin/uploads"),
            work_dir: PathBuf::from("/tmp/burnin/work"),
            output_dir: PathBuf::from("/tmp/burnin/exports"),
            max_concurrent_encodes: 2,
            export_ttl: Duration::from_secs(EXPORT_PROGRESS_TTL_SECS),
            download_ttl: Duration::from_secs(DOWNLOAD_HANDOFF_TTL_SECS),
            font_path: None,
            font_name: "Arial".to_string(),
            encode_timeout: None,
            hw_enabled: true,
            hw_device: PathBuf::from(DEFAULT_VAAPI_DEVICE),
            hw_probe_timeout: Duration::from_secs(10),
        }
    }
}

impl ExportConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            upload_dir: env_path("BURNIN_UPLOAD_DIR").unwrap_or(defaults.upload_dir),
            work_dir: env_path("BURNIN_WORK_DIR").unwrap_or(defaults.work_dir),
            output_dir: env_path("BURNIN_OUTPUT_DIR").unwrap_or(defaults.output_dir),
            max_concurrent_encodes: env_parse("BURNIN_MAX_CONCURRENT_ENCODES")
                .unwrap_or(defaults.max_concurrent_encodes),
            export_ttl: env_parse("BURNIN_EXPORT_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.export_ttl),
            download_ttl: env_parse("BURNIN_DOWNLOAD_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.download_ttl),
            font_path: env_path("BURNIN_FONT_PATH"),
            font_name: std::env::var("BURNIN_FONT_NAME").unwrap_or(defaults.font_name),
            encode_timeout: env_parse("BURNIN_ENCODE_TIMEOUT_SECS").map(Duration::from_secs),
            hw_enabled: std::env::var("BURNIN_HW_ENABLED")
                .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no" | "off"))
                .unwrap_or(defaults.hw_enabled),
            hw_device: env_path("BURNIN_HW_DEVICE").unwrap_or(defaults.hw_device),
            hw_probe_timeout: env_parse("BURNIN_HW_PROBE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.hw_probe_timeout),
        }
    }

    /// Config with all directories under `root`, for tests and local runs.
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            upload_dir: root.join("uploads"),
            work_dir: root.join("work"),
            output_dir: root.join("exports"),
            ..Self::default()
        }
    }

    /// Final location of an export's output file.
    pub fn output_path_for(&self, token: &str) -> PathBuf {
        self.output_dir.join(format!("{}.mp4", token))
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExportConfig::default();
        assert_eq!(config.max_concurrent_encodes, 2);
        assert_eq!(config.export_ttl, Duration::from_secs(3600));
        assert_eq!(config.download_ttl, Duration::from_secs(300));
        assert!(config.hw_enabled);
    }

    #[test]
    fn test_rooted_paths() {
        let config = ExportConfig::rooted_at("/srv/burnin");
        assert_eq!(config.upload_dir, PathBuf::from("/srv/burnin/uploads"));
        assert_eq!(
            config.output_path_for("abc"),
            PathBuf::from("/srv/burnin/exports/abc.mp4")
        );
    }
}

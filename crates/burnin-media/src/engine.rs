//! Burn-in encode engine.

use async_trait::async_trait;
use burnin_models::QualitySettings;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::subtitle::SubtitleAsset;

/// Events emitted while an encode runs.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Progress { percent: u8, eta_secs: Option<f64> },
}

/// Everything needed to run one burn-in encode.
#[derive(Debug, Clone)]
pub struct EncodeInvocation {
    pub input: PathBuf,
    pub output: PathBuf,
    pub subtitle: SubtitleAsset,
    pub quality: QualitySettings,
    /// Source duration in seconds, used to turn output time into a percentage
    pub duration_secs: f64,
    /// VAAPI device for the hardware path
    pub hw_device: Option<PathBuf>,
}

impl EncodeInvocation {
    /// Assemble the FFmpeg command for this invocation.
    pub fn to_command(&self) -> FfmpegCommand {
        let mut filter = format!(
            "subtitles={}:fontsdir={}",
            escape_filter_path(&self.subtitle.path),
            escape_filter_path(&self.subtitle.fonts_dir)
        );

        let mut cmd = FfmpegCommand::new(&self.input, &self.output);

        if self.quality.hardware {
            if let Some(device) = &self.hw_device {
                cmd = cmd.input_args(["-vaapi_device".to_string(), device.to_string_lossy().to_string()]);
            }
            // Subtitles are drawn in software, then frames go up to the GPU
            filter.push_str(",format=nv12,hwupload");
        }

        cmd.video_filter(filter)
            .map("0:v:0")
            .map("0:a?")
            .output_args(self.quality.to_ffmpeg_args())
            .faststart()
    }
}

/// Runs a burn-in encode, reporting progress on `events`.
#[async_trait]
pub trait EncodeEngine: Send + Sync {
    async fn encode(
        &self,
        invocation: EncodeInvocation,
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> MediaResult<()>;
}

/// [`EncodeEngine`] backed by the FFmpeg CLI.
#[derive(Debug, Clone, Default)]
pub struct FfmpegBurnEngine {
    timeout_secs: Option<u64>,
}

impl FfmpegBurnEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

#[async_trait]
impl EncodeEngine for FfmpegBurnEngine {
    async fn encode(
        &self,
        invocation: EncodeInvocation,
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> MediaResult<()> {
        let cmd = invocation.to_command();
        let total_ms = (invocation.duration_secs * 1000.0).round() as i64;

        let mut runner = FfmpegRunner::new();
        if let Some(secs) = self.timeout_secs {
            runner = runner.with_timeout(secs);
        }

        info!(
            codec = %invocation.quality.video_codec,
            hardware = invocation.quality.hardware,
            output = %invocation.output.display(),
            "Starting burn-in encode"
        );

        runner
            .run_with_progress(&cmd, move |progress| {
                let event = EngineEvent::Progress {
                    percent: progress.percent(total_ms),
                    eta_secs: progress.eta_secs(total_ms),
                };
                // Receiver gone means nobody is listening any more
                if events.send(event).is_err() {
                    debug!("Progress listener dropped");
                }
            })
            .await
    }
}

/// Quote a path for use inside an FFmpeg filter argument.
fn escape_filter_path(path: &Path) -> String {
    let escaped = path
        .to_string_lossy()
        .replace('\\', r"\\")
        .replace('\'', r"\'")
        .replace(':', r"\:");
    format!("'{}'", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burnin_models::RateControl;

    fn invocation(quality: QualitySettings, hw_device: Option<PathBuf>) -> EncodeInvocation {
        EncodeInvocation {
            input: PathBuf::from("/uploads/in.mp4"),
            output: PathBuf::from("/work/out.mp4"),
            subtitle: SubtitleAsset {
                path: PathBuf::from("/work/captions.ass"),
                fonts_dir: PathBuf::from("/work/fonts"),
            },
            quality,
            duration_secs: 10.0,
            hw_device,
        }
    }

    #[test]
    fn test_software_command() {
        let args = invocation(QualitySettings::default(), None).to_command().build_args();
        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(
            args[vf + 1],
            "subtitles='/work/captions.ass':fontsdir='/work/fonts'"
        );
        assert!(args.windows(2).any(|w| w == ["-map", "0:v:0"]));
        assert!(args.windows(2).any(|w| w == ["-map", "0:a?"]));
        assert!(args.windows(2).any(|w| w == ["-movflags", "+faststart"]));
        assert!(args.windows(2).any(|w| w == ["-c:v", "libx264"]));
        assert!(!args.contains(&"-vaapi_device".to_string()));
    }

    #[test]
    fn test_hardware_command() {
        let quality = QualitySettings {
            video_codec: "h264_vaapi".to_string(),
            rate_control: RateControl::Qp(24),
            preset: None,
            tune: None,
            hardware: true,
            ..Default::default()
        };
        let args = invocation(quality, Some(PathBuf::from("/dev/dri/renderD128")))
            .to_command()
            .build_args();

        let device = args.iter().position(|a| a == "-vaapi_device").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(device < input);
        assert!(args.iter().any(|a| a.ends_with(",format=nv12,hwupload")));
        assert!(args.windows(2).any(|w| w == ["-qp", "24"]));
    }

    #[test]
    fn test_escape_filter_path() {
        assert_eq!(escape_filter_path(Path::new("/tmp/a:b.ass")), r"'/tmp/a\:b.ass'");
        assert_eq!(escape_filter_path(Path::new("/tmp/it's.ass")), r"'/tmp/it\'s.ass'");
    }
}

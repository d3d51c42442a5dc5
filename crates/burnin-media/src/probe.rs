//! FFprobe video information.

use async_trait::async_trait;
use burnin_models::VideoMetadata;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Video file information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Duration in seconds
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub codec: String,
    /// Display rotation in degrees, normalised to 0..360
    pub rotation: i32,
    pub audio_codec: Option<String>,
    /// Audio bitrate in bits/second
    pub audio_bitrate: Option<u64>,
    /// File size in bytes
    pub size: u64,
}

impl From<VideoInfo> for VideoMetadata {
    fn from(info: VideoInfo) -> Self {
        VideoMetadata {
            width: info.width,
            height: info.height,
            duration: info.duration,
            rotation: info.rotation,
            source_codec: (!info.codec.is_empty()).then_some(info.codec),
            source_audio_codec: info.audio_codec,
            source_audio_bitrate: info.audio_bitrate,
            size_bytes: info.size,
        }
        .normalized()
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    bit_rate: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    side_data_list: Vec<SideData>,
}

#[derive(Debug, Deserialize)]
struct SideData {
    rotation: Option<f64>,
}

/// Source of video metadata for uploaded files.
#[async_trait]
pub trait MetadataProber: Send + Sync {
    async fn probe(&self, path: &Path) -> MediaResult<VideoMetadata>;
}

/// [`MetadataProber`] backed by the `ffprobe` CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfprobeProber;

#[async_trait]
impl MetadataProber for FfprobeProber {
    async fn probe(&self, path: &Path) -> MediaResult<VideoMetadata> {
        Ok(probe_video(path).await?.into())
    }
}

/// Probe a video file for information.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let ffprobe = check_ffprobe()?;

    let output = Command::new(ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: "FFprobe failed".to_string(),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

fn parse_probe_output(stdout: &[u8]) -> MediaResult<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::InvalidVideo("No video stream found".to_string()))?;
    let audio_stream = probe.streams.iter().find(|s| s.codec_type == "audio");

    let duration = probe
        .format
        .duration
        .as_ref()
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let size = probe
        .format
        .size
        .as_ref()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let fps = video_stream
        .avg_frame_rate
        .as_ref()
        .or(video_stream.r_frame_rate.as_ref())
        .and_then(|r| parse_frame_rate(r))
        .unwrap_or(30.0);

    Ok(VideoInfo {
        duration,
        width: video_stream.width.unwrap_or(0),
        height: video_stream.height.unwrap_or(0),
        fps,
        codec: video_stream.codec_name.clone().unwrap_or_default(),
        rotation: stream_rotation(video_stream),
        audio_codec: audio_stream.and_then(|s| s.codec_name.clone()),
        audio_bitrate: audio_stream
            .and_then(|s| s.bit_rate.as_ref())
            .and_then(|b| b.parse::<u64>().ok()),
        size,
    })
}

/// Rotation from the legacy `rotate` tag or the display matrix side data.
fn stream_rotation(stream: &FfprobeStream) -> i32 {
    let degrees = stream
        .tags
        .get("rotate")
        .and_then(|r| r.parse::<f64>().ok())
        .or_else(|| stream.side_data_list.iter().find_map(|sd| sd.rotation))
        .unwrap_or(0.0);

    (degrees.round() as i32).rem_euclid(360)
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
    }
    s.parse().ok()
}

//! Video encoding configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default software video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Audio codec value that passes the source stream through
pub const AUDIO_COPY: &str = "copy";

/// Resolution bucket keyed by the shorter display side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionTier {
    Sd,
    Hd720,
    Hd1080,
    Qhd1440,
    Uhd2160,
}

impl ResolutionTier {
    /// Pick the tier for a given shorter-side length in pixels.
    pub fn from_short_side(short_side: u32) -> Self {
        match short_side {
            s if s >= 2160 => ResolutionTier::Uhd2160,
            s if s >= 1440 => ResolutionTier::Qhd1440,
            s if s >= 1080 => ResolutionTier::Hd1080,
            s if s >= 720 => ResolutionTier::Hd720,
            _ => ResolutionTier::Sd,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionTier::Sd => "sd",
            ResolutionTier::Hd720 => "720p",
            ResolutionTier::Hd1080 => "1080p",
            ResolutionTier::Qhd1440 => "1440p",
            ResolutionTier::Uhd2160 => "4k",
        }
    }
}

impl fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Encoder quality control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case", tag = "mode", content = "value")]
pub enum RateControl {
    /// Constant rate factor (software encoders)
    Crf(u8),
    /// Constant quantizer (hardware encoders)
    Qp(u8),
}

impl RateControl {
    pub fn value(&self) -> u8 {
        match self {
            RateControl::Crf(v) | RateControl::Qp(v) => *v,
        }
    }
}

/// Concrete codec and quality parameters for one export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QualitySettings {
    /// Video codec (e.g. "libx264", "h264_vaapi")
    pub video_codec: String,
    pub rate_control: RateControl,
    /// Encoder preset; hardware encoders have none
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub tune: Option<String>,
    /// Audio codec, `copy` for passthrough
    pub audio_codec: String,
    /// Audio bitrate, `None` for passthrough
    #[serde(default)]
    pub audio_bitrate: Option<String>,
    /// Whether the hardware (VAAPI) path is used
    #[serde(default)]
    pub hardware: bool,
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            video_codec: DEFAULT_VIDEO_CODEC.to_string(),
            rate_control: RateControl::Crf(21),
            preset: Some("medium".to_string()),
            tune: Some("film".to_string()),
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: Some("192k".to_string()),
            hardware: false,
        }
    }
}

impl QualitySettings {
    /// Whether the audio stream is passed through untouched.
    pub fn audio_passthrough(&self) -> bool {
        self.audio_codec == AUDIO_COPY
    }

    /// Convert to FFmpeg output arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = vec!["-c:v".to_string(), self.video_codec.clone()];

        match self.rate_control {
            RateControl::Crf(crf) => args.extend(["-crf".to_string(), crf.to_string()]),
            RateControl::Qp(qp) => args.extend(["-qp".to_string(), qp.to_string()]),
        }

        if let Some(preset) = &self.preset {
            args.extend(["-preset".to_string(), preset.clone()]);
        }
        if let Some(tune) = &self.tune {
            args.extend(["-tune".to_string(), tune.clone()]);
        }

        args.extend(["-c:a".to_string(), self.audio_codec.clone()]);
        if !self.audio_passthrough() {
            if let Some(bitrate) = &self.audio_bitrate {
                args.extend(["-b:a".to_string(), bitrate.clone()]);
            }
        }

        args
    }
}

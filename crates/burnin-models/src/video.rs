//! Source video metadata.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Width assumed when metadata does not report one.
pub const DEFAULT_WIDTH: u32 = 1920;
/// Height assumed when metadata does not report one.
pub const DEFAULT_HEIGHT: u32 = 1080;

/// Frame orientation as displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// Metadata of an uploaded source video.
///
/// Missing fields fall back to 1920x1080 with rotation 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Duration in seconds
    #[serde(default)]
    pub duration: f64,
    /// Display rotation in degrees (0, 90, 180, 270)
    #[serde(default)]
    pub rotation: i32,
    /// Video codec name as reported by ffprobe (e.g. "h264", "hevc")
    #[serde(default)]
    pub source_codec: Option<String>,
    /// Audio codec name, `None` when the source has no audio stream
    #[serde(default)]
    pub source_audio_codec: Option<String>,
    /// Audio bitrate in bits/second
    #[serde(default)]
    pub source_audio_bitrate: Option<u64>,
    /// Source file size in bytes
    #[serde(default)]
    pub size_bytes: u64,
}

fn default_width() -> u32 {
    DEFAULT_WIDTH
}
fn default_height() -> u32 {
    DEFAULT_HEIGHT
}

impl Default for VideoMetadata {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            duration: 0.0,
            rotation: 0,
            source_codec: None,
            source_audio_codec: None,
            source_audio_bitrate: None,
            size_bytes: 0,
        }
    }
}

impl VideoMetadata {
    /// Create metadata with just dimensions.
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Replace zero dimensions with the defaults.
    pub fn normalized(mut self) -> Self {
        if self.width == 0 || self.height == 0 {
            self.width = DEFAULT_WIDTH;
            self.height = DEFAULT_HEIGHT;
        }
        self
    }

    /// Dimensions as displayed, with 90/270 degree rotation applied.
    pub fn display_dimensions(&self) -> (u32, u32) {
        let (w, h) = if self.width == 0 || self.height == 0 {
            (DEFAULT_WIDTH, DEFAULT_HEIGHT)
        } else {
            (self.width, self.height)
        };

        if self.rotation.rem_euclid(180) == 90 {
            (h, w)
        } else {
            (w, h)
        }
    }

    /// Orientation as displayed.
    pub fn orientation(&self) -> Orientation {
        let (w, h) = self.display_dimensions();
        if w < h {
            Orientation::Vertical
        } else {
            Orientation::Horizontal
        }
    }

    /// Length of the shorter display side, used for resolution tiers.
    pub fn short_side(&self) -> u32 {
        let (w, h) = self.display_dimensions();
        w.min(h)
    }

    /// Duration in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        (self.duration * 1000.0).round() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_fields_missing() {
        let meta: VideoMetadata = serde_json::from_str("{}").unwrap();
        assert_eq!(meta.width, 1920);
        assert_eq!(meta.height, 1080);
        assert_eq!(meta.rotation, 0);
    }

    #[test]
    fn test_rotation_swaps_display_dimensions() {
        let meta = VideoMetadata {
            rotation: 90,
            ..VideoMetadata::with_dimensions(1920, 1080)
        };
        assert_eq!(meta.display_dimensions(), (1080, 1920));
        assert_eq!(meta.orientation(), Orientation::Vertical);

        let meta = VideoMetadata {
            rotation: -90,
            ..VideoMetadata::with_dimensions(1920, 1080)
        };
        assert_eq!(meta.display_dimensions(), (1080, 1920));
    }

    #[test]
    fn test_zero_dimensions_fall_back() {
        let meta = VideoMetadata::with_dimensions(0, 0).normalized();
        assert_eq!((meta.width, meta.height), (1920, 1080));
        assert_eq!(VideoMetadata::with_dimensions(0, 720).short_side(), 1080);
    }
}

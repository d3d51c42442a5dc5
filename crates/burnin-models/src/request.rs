//! Export requests and user preferences.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::style::Alignment;
use crate::video::VideoMetadata;

/// Lower bound for the user font scale.
pub const MIN_FONT_SCALE: f64 = 0.5;
/// Upper bound for the user font scale.
pub const MAX_FONT_SCALE: f64 = 2.0;

/// Vertical caption placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubtitlePosition {
    #[default]
    Bottom,
    Middle,
    Top,
}

impl SubtitlePosition {
    pub fn alignment(&self) -> Alignment {
        match self {
            SubtitlePosition::Bottom => Alignment::BottomCenter,
            SubtitlePosition::Middle => Alignment::MiddleCenter,
            SubtitlePosition::Top => Alignment::TopCenter,
        }
    }
}

/// User-facing styling and encoding preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportPreferences {
    #[serde(default)]
    pub position: SubtitlePosition,
    /// Multiplier on the computed font size (0.5 - 2.0)
    #[serde(default = "default_font_scale")]
    pub font_scale: f64,
    /// Primary text colour as `#RRGGBB`
    #[serde(default = "default_font_color")]
    pub font_color: String,
    /// Colour of highlighted segments as `#RRGGBB`
    #[serde(default = "default_highlight_color")]
    pub highlight_color: String,
    #[serde(default = "default_outline_color")]
    pub outline_color: String,
    #[serde(default = "default_outline_width")]
    pub outline_width: f64,
    /// Font family override; the configured font is used otherwise
    #[serde(default)]
    pub font_name: Option<String>,
    /// Allow the hardware encode path when available
    #[serde(default = "default_true")]
    pub hardware_acceleration: bool,
}

fn default_font_scale() -> f64 {
    1.0
}
fn default_font_color() -> String {
    "#FFFFFF".to_string()
}
fn default_highlight_color() -> String {
    "#FFD700".to_string()
}
fn default_outline_color() -> String {
    "#000000".to_string()
}
fn default_outline_width() -> f64 {
    2.0
}
fn default_true() -> bool {
    true
}

impl Default for ExportPreferences {
    fn default() -> Self {
        Self {
            position: SubtitlePosition::default(),
            font_scale: default_font_scale(),
            font_color: default_font_color(),
            highlight_color: default_highlight_color(),
            outline_color: default_outline_color(),
            outline_width: default_outline_width(),
            font_name: None,
            hardware_acceleration: true,
        }
    }
}

impl ExportPreferences {
    /// Font scale clamped to the supported range; non-finite values become 1.0.
    pub fn effective_font_scale(&self) -> f64 {
        if self.font_scale.is_finite() {
            self.font_scale.clamp(MIN_FONT_SCALE, MAX_FONT_SCALE)
        } else {
            1.0
        }
    }

    /// Reject colours that are not `#RRGGBB`.
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("fontColor", &self.font_color),
            ("highlightColor", &self.highlight_color),
            ("outlineColor", &self.outline_color),
        ] {
            if !is_hex_color(value) {
                return Err(format!("Invalid colour for {}: {}", field, value));
            }
        }
        Ok(())
    }
}

/// `#RRGGBB`, with the leading `#` optional.
pub fn is_hex_color(value: &str) -> bool {
    let digits = value.trim().trim_start_matches('#');
    digits.len() == 6 && digits.chars().all(|c| c.is_ascii_hexdigit())
}

/// A request to burn captions into an uploaded video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub upload_id: String,
    /// Raw caption block, parsed by [`crate::segment::parse_segments`]
    pub segments: String,
    #[serde(default)]
    pub preferences: ExportPreferences,
    /// Caller-supplied metadata; probed from the file when absent
    #[serde(default)]
    pub metadata: Option<VideoMetadata>,
    /// Download filename suggestion
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

impl ExportRequest {
    pub fn new(upload_id: impl Into<String>, segments: impl Into<String>) -> Self {
        Self {
            upload_id: upload_id.into(),
            segments: segments.into(),
            preferences: ExportPreferences::default(),
            metadata: None,
            filename: None,
            user_id: None,
            project_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request: ExportRequest =
            serde_json::from_str(r#"{"uploadId":"u1","segments":"0:01.0 - 0:02.0\nhi"}"#).unwrap();
        assert_eq!(request.upload_id, "u1");
        assert_eq!(request.preferences, ExportPreferences::default());
        assert!(request.metadata.is_none());
        assert!(request.preferences.hardware_acceleration);
    }

    #[test]
    fn test_font_scale_clamped() {
        let mut prefs = ExportPreferences::default();
        prefs.font_scale = 5.0;
        assert_eq!(prefs.effective_font_scale(), 2.0);
        prefs.font_scale = f64::NAN;
        assert_eq!(prefs.effective_font_scale(), 1.0);
    }

    #[test]
    fn test_preference_colours_validated() {
        assert!(ExportPreferences::default().validate().is_ok());

        let prefs = ExportPreferences {
            highlight_color: "gold".to_string(),
            ..ExportPreferences::default()
        };
        let err = prefs.validate().unwrap_err();
        assert!(err.contains("highlightColor"));

        assert!(is_hex_color("ffd700"));
        assert!(!is_hex_color("#FFD70"));
    }

    #[test]
    fn test_position_alignment() {
        assert_eq!(SubtitlePosition::Top.alignment(), Alignment::TopCenter);
    }
}

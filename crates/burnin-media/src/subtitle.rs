//! ASS subtitle asset rendering for the FFmpeg `subtitles` filter.

use async_trait::async_trait;
use burnin_models::{is_hex_color, ExportPreferences, StyleParams, SubtitleSegment};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Fade in/out applied to non-static captions, in milliseconds.
const FADE_MS: u32 = 120;

/// Files produced for one burn-in encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleAsset {
    /// The subtitle script
    pub path: PathBuf,
    /// Directory handed to libass as `fontsdir`
    pub fonts_dir: PathBuf,
}

/// Turns parsed segments and a style into a subtitle file on disk.
#[async_trait]
pub trait SubtitleRenderer: Send + Sync {
    async fn render(
        &self,
        segments: &[SubtitleSegment],
        style: &StyleParams,
        prefs: &ExportPreferences,
        play_res: (u32, u32),
        work_dir: &Path,
    ) -> MediaResult<SubtitleAsset>;
}

/// Writes an ASS v4+ script and stages the configured font next to it.
#[derive(Debug, Clone)]
pub struct AssRenderer {
    font_name: String,
    font_path: Option<PathBuf>,
}

impl AssRenderer {
    pub fn new(font_name: impl Into<String>, font_path: Option<PathBuf>) -> Self {
        Self {
            font_name: font_name.into(),
            font_path,
        }
    }
}

impl Default for AssRenderer {
    fn default() -> Self {
        Self::new("Arial", None)
    }
}

#[async_trait]
impl SubtitleRenderer for AssRenderer {
    async fn render(
        &self,
        segments: &[SubtitleSegment],
        style: &StyleParams,
        prefs: &ExportPreferences,
        play_res: (u32, u32),
        work_dir: &Path,
    ) -> MediaResult<SubtitleAsset> {
        let fonts_dir = work_dir.join("fonts");
        fs::create_dir_all(&fonts_dir).await?;

        if let Some(font_path) = &self.font_path {
            match font_path.file_name() {
                Some(file_name) => {
                    if let Err(e) = fs::copy(font_path, fonts_dir.join(file_name)).await {
                        // libass falls back to fontconfig lookup by name
                        warn!(font = %font_path.display(), "Failed to stage font: {}", e);
                    }
                }
                None => warn!(font = %font_path.display(), "Font path has no file name"),
            }
        }

        let font_name = prefs.font_name.as_deref().unwrap_or(&self.font_name);
        let script = build_ass_script(segments, style, prefs, font_name, play_res)?;

        let path = work_dir.join("captions.ass");
        fs::write(&path, script).await?;
        debug!(path = %path.display(), segments = segments.len(), "Wrote subtitle script");

        Ok(SubtitleAsset { path, fonts_dir })
    }
}

/// Render the complete ASS document.
pub fn build_ass_script(
    segments: &[SubtitleSegment],
    style: &StyleParams,
    prefs: &ExportPreferences,
    font_name: &str,
    (play_x, play_y): (u32, u32),
) -> MediaResult<String> {
    let primary = ass_color(&prefs.font_color)?;
    let outline = ass_color(&prefs.outline_color)?;
    let highlight = ass_color(&prefs.highlight_color)?;
    let outline_width = if prefs.outline_width.is_finite() {
        prefs.outline_width.clamp(0.0, 10.0)
    } else {
        2.0
    };

    let mut out = String::new();
    // Writes to a String cannot fail
    let _ = writeln!(out, "[Script Info]");
    let _ = writeln!(out, "ScriptType: v4.00+");
    let _ = writeln!(out, "PlayResX: {}", play_x);
    let _ = writeln!(out, "PlayResY: {}", play_y);
    let _ = writeln!(out, "WrapStyle: 0");
    let _ = writeln!(out, "ScaledBorderAndShadow: yes");
    let _ = writeln!(out);
    let _ = writeln!(out, "[V4+ Styles]");
    let _ = writeln!(
        out,
        "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, \
         Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, \
         Shadow, Alignment, MarginL, MarginR, MarginV, Encoding"
    );
    let _ = writeln!(
        out,
        "Style: Default,{font},{size},{primary},{primary},{outline},&H80000000,-1,0,0,0,100,100,{spacing:.2},0,1,{ow:.1},0,{align},{ml},{mr},{mv},1",
        font = font_name.replace(',', " "),
        size = style.font_size,
        spacing = style.spacing,
        ow = outline_width,
        align = style.alignment.ass_code(),
        ml = style.margin_left,
        mr = style.margin_right,
        mv = style.margin_vertical,
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "[Events]");
    let _ = writeln!(
        out,
        "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text"
    );

    for segment in segments {
        let mut text = String::new();
        if !segment.is_static {
            let _ = write!(text, "{{\\fad({},{})}}", FADE_MS, FADE_MS);
        }
        text.push_str(&dialogue_text(segment, &highlight, &primary));

        let _ = writeln!(
            out,
            "Dialogue: 0,{},{},Default,,0,0,0,,{}",
            ass_time(segment.start_time),
            ass_time(segment.end_time),
            text
        );
    }

    Ok(out)
}

fn dialogue_text(segment: &SubtitleSegment, highlight: &str, primary: &str) -> String {
    if !segment.is_highlight {
        return escape_text(&segment.text);
    }

    match segment.word_index {
        Some(index) => {
            let mut word_no = 0u32;
            let lines: Vec<String> = segment
                .text
                .lines()
                .map(|line| {
                    line.split_whitespace()
                        .map(|word| {
                            let word = escape_text(word);
                            let rendered = if word_no == index {
                                format!("{{\\c{}}}{}{{\\c{}}}", highlight, word, primary)
                            } else {
                                word
                            };
                            word_no += 1;
                            rendered
                        })
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect();
            lines.join("\\N")
        }
        None => format!("{{\\c{}}}{}", highlight, escape_text(&segment.text)),
    }
}

/// Make caption text safe for an ASS `Text` field.
fn escape_text(text: &str) -> String {
    text.replace('\\', "/")
        .replace('{', "(")
        .replace('}', ")")
        .replace("\r\n", "\n")
        .replace('\n', "\\N")
}

/// `#RRGGBB` to ASS `&H00BBGGRR`.
pub fn ass_color(hex: &str) -> MediaResult<String> {
    if !is_hex_color(hex) {
        return Err(MediaError::subtitle_render(format!("Invalid colour: {}", hex)));
    }
    let digits = hex.trim().trim_start_matches('#');
    let (r, g, b) = (&digits[0..2], &digits[2..4], &digits[4..6]);
    Ok(format!("&H00{}{}{}", b, g, r).to_uppercase())
}

/// Seconds to ASS `H:MM:SS.cc`.
pub fn ass_time(seconds: f64) -> String {
    let total_cs = (seconds.max(0.0) * 100.0).round() as u64;
    let cs = total_cs % 100;
    let total_secs = total_cs / 100;
    format!(
        "{}:{:02}:{:02}.{:02}",
        total_secs / 3600,
        (total_secs / 60) % 60,
        total_secs % 60,
        cs
    )
}

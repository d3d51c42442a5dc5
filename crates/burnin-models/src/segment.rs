//! Timed caption segments and the caption block parser.
//!
//! Input is a text block made of entries separated by blank lines. Each entry
//! starts with a header line of the form
//!
//! ```text
//! M:SS.f - M:SS.f [HIGHLIGHT|HIGHLIGHT:<word>|STATIC]
//! ```
//!
//! followed by one or more lines of caption text.

use std::sync::OnceLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Result type for segment parsing.
pub type SegmentResult<T> = Result<T, SegmentError>;

/// Errors produced while parsing caption blocks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SegmentError {
    #[error("No valid subtitle segments found")]
    NoValidSegments,

    #[error("Invalid timecode: {0}")]
    InvalidTimecode(String),
}

/// A single caption entry on the video timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleSegment {
    /// Start time in seconds
    pub start_time: f64,
    /// End time in seconds (always greater than `start_time`)
    pub end_time: f64,
    /// Caption text, lines joined with `\n`
    pub text: String,
    /// Rendered with the highlight colour
    #[serde(default)]
    pub is_highlight: bool,
    /// Rendered without entry/exit animation
    #[serde(default)]
    pub is_static: bool,
    /// Index of the highlighted word for word-level highlights
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_index: Option<u32>,
}

impl SubtitleSegment {
    /// Create a plain segment.
    pub fn new(start_time: f64, end_time: f64, text: impl Into<String>) -> Self {
        Self {
            start_time,
            end_time,
            text: text.into(),
            is_highlight: false,
            is_static: false,
            word_index: None,
        }
    }

    /// Segment duration in seconds.
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Number of characters in the caption text.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// Number of whitespace separated words in the caption text.
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

fn header_regex() -> &'static Regex {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    HEADER.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*(\d+):(\d+)(?:\.(\d{1,3}))?\s*-\s*(\d+):(\d+)(?:\.(\d{1,3}))?\s*(?:\[(HIGHLIGHT|STATIC)(?::(\d+))?\])?\s*$",
        )
        .expect("segment header pattern is valid")
    })
}

/// Convert `minutes`, `seconds` and an optional fraction into milliseconds.
///
/// Seconds of 60 or more carry into minutes, so `1:75.0` equals `2:15.0`.
fn timecode_millis(minutes: &str, seconds: &str, fraction: Option<&str>) -> SegmentResult<u64> {
    let invalid = || SegmentError::InvalidTimecode(format!("{}:{}", minutes, seconds));

    let minutes: u64 = minutes.parse().map_err(|_| invalid())?;
    let seconds: u64 = seconds.parse().map_err(|_| invalid())?;
    let fraction_ms: u64 = match fraction {
        Some(f) => {
            let padded = format!("{:0<3}", f);
            padded.parse().map_err(|_| invalid())?
        }
        None => 0,
    };

    minutes
        .checked_mul(60_000)
        .and_then(|m| seconds.checked_mul(1000).and_then(|s| m.checked_add(s)))
        .and_then(|ms| ms.checked_add(fraction_ms))
        .ok_or_else(invalid)
}

/// Parse one header line into `(start_ms, end_ms, highlight, static, word_index)`.
fn parse_header(line: &str) -> Option<(u64, u64, bool, bool, Option<u32>)> {
    let caps = header_regex().captures(line)?;

    let start = timecode_millis(&caps[1], &caps[2], caps.get(3).map(|m| m.as_str())).ok()?;
    let end = timecode_millis(&caps[4], &caps[5], caps.get(6).map(|m| m.as_str())).ok()?;

    let marker = caps.get(7).map(|m| m.as_str().to_ascii_uppercase());
    let is_highlight = marker.as_deref() == Some("HIGHLIGHT");
    let is_static = marker.as_deref() == Some("STATIC");
    let word_index = if is_highlight {
        caps.get(8).and_then(|m| m.as_str().parse().ok())
    } else {
        None
    };

    Some((start, end, is_highlight, is_static, word_index))
}

/// Split the raw block on blank lines.
fn split_blocks(raw: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();

    for line in raw.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
}

/// Parse a raw caption block into ordered, validated segments.
///
/// Entries with a malformed header, `start >= end`, or empty text are skipped.
/// The result is sorted ascending by start time and highlighted segments never
/// overlap each other.
pub fn parse_segments(raw: &str) -> SegmentResult<Vec<SubtitleSegment>> {
    let mut segments = Vec::new();

    for block in split_blocks(raw) {
        let Some((header, body)) = block.split_first() else {
            continue;
        };

        let Some((start_ms, end_ms, is_highlight, is_static, word_index)) = parse_header(header)
        else {
            debug!(header = %header.trim(), "Skipping caption block with malformed header");
            continue;
        };

        if start_ms >= end_ms {
            debug!(header = %header.trim(), "Skipping caption block with start >= end");
            continue;
        }

        let text = body
            .iter()
            .map(|l| l.trim())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string();
        if text.is_empty() {
            debug!(header = %header.trim(), "Skipping caption block without text");
            continue;
        }

        segments.push(SubtitleSegment {
            start_time: start_ms as f64 / 1000.0,
            end_time: end_ms as f64 / 1000.0,
            text,
            is_highlight,
            is_static,
            word_index,
        });
    }

    segments.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
    let segments = resolve_highlight_overlaps(segments);

    if segments.is_empty() {
        return Err(SegmentError::NoValidSegments);
    }

    Ok(segments)
}

/// Clip highlighted segments so that no two of them overlap.
///
/// Expects input sorted by start time. A highlighted segment that would become
/// empty after clipping is dropped.
fn resolve_highlight_overlaps(segments: Vec<SubtitleSegment>) -> Vec<SubtitleSegment> {
    let mut out: Vec<SubtitleSegment> = Vec::with_capacity(segments.len());
    let mut last_highlight: Option<usize> = None;

    for segment in segments {
        if segment.is_highlight {
            if let Some(idx) = last_highlight {
                if out[idx].end_time > segment.start_time {
                    out[idx].end_time = segment.start_time;
                    if out[idx].end_time <= out[idx].start_time {
                        out.remove(idx);
                    }
                }
            }
            out.push(segment);
            last_highlight = Some(out.len() - 1);
        } else {
            out.push(segment);
        }
    }

    out
}

/// Format seconds as `M:SS.f`.
pub fn format_timecode(total_secs: f64) -> String {
    let tenths = (total_secs * 10.0).round().max(0.0) as u64;
    let minutes = tenths / 600;
    let seconds = (tenths % 600) / 10;
    let fraction = tenths % 10;
    format!("{}:{:02}.{}", minutes, seconds, fraction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_segment() {
        let segments = parse_segments("0:01.0 - 0:03.5\nHallo Welt").unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start_time, 1.0);
        assert_eq!(segments[0].end_time, 3.5);
        assert_eq!(segments[0].text, "Hallo Welt");
        assert!(!segments[0].is_highlight);
    }

    #[test]
    fn test_minute_overflow_is_lossless() {
        let overflow = parse_segments("1:75.0 - 1:80.0\nText").unwrap();
        let normal = parse_segments("2:15.0 - 2:20.0\nText").unwrap();
        assert_eq!(overflow[0].start_time, normal[0].start_time);
        assert_eq!(overflow[0].end_time, normal[0].end_time);
        assert_eq!(overflow[0].start_time, 135.0);
    }

    #[test]
    fn test_sorted_by_start() {
        let raw = "0:10.0 - 0:12.0\nsecond\n\n0:01.0 - 0:02.0\nfirst\n\n0:05.0 - 0:06.0\nmiddle";
        let segments = parse_segments(raw).unwrap();
        let texts: Vec<_> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "middle", "second"]);
        assert!(segments.iter().all(|s| s.start_time < s.end_time));
    }

    #[test]
    fn test_rejects_invalid_entries() {
        let raw = "0:05.0 - 0:05.0\nzero length\n\n0:06.0 - 0:04.0\nbackwards\n\n0:01.0 - 0:02.0\n   \n\nnot a header\ntext\n\n0:07.0 - 0:08.0\nkept";
        let segments = parse_segments(raw).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "kept");
    }

    #[test]
    fn test_no_valid_segments() {
        assert_eq!(parse_segments(""), Err(SegmentError::NoValidSegments));
        assert_eq!(
            parse_segments("0:03.0 - 0:01.0\nbackwards"),
            Err(SegmentError::NoValidSegments)
        );
    }

    #[test]
    fn test_markers() {
        let raw = "0:01.0 - 0:02.0 [HIGHLIGHT]\nwow\n\n0:03.0 - 0:04.0 [static]\ncalm\n\n0:05.0 - 0:06.0 [HIGHLIGHT:2]\nthird word";
        let segments = parse_segments(raw).unwrap();
        assert!(segments[0].is_highlight);
        assert_eq!(segments[0].word_index, None);
        assert!(segments[1].is_static);
        assert!(!segments[1].is_highlight);
        assert_eq!(segments[2].word_index, Some(2));
    }

    #[test]
    fn test_multiline_text_and_extra_blank_lines() {
        let raw = "\n\n0:01.0 - 0:02.0\nline one\nline two\n\n\n\n0:03.0 - 0:04.0\nnext\n";
        let segments = parse_segments(raw).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "line one\nline two");
    }

    #[test]
    fn test_highlight_overlaps_resolved() {
        let raw = "0:01.0 - 0:03.0 [HIGHLIGHT:0]\none\n\n0:02.0 - 0:04.0 [HIGHLIGHT:1]\ntwo\n\n0:02.0 - 0:05.0\nplain";
        let segments = parse_segments(raw).unwrap();
        let highlights: Vec<_> = segments.iter().filter(|s| s.is_highlight).collect();
        assert_eq!(highlights.len(), 2);
        assert_eq!(highlights[0].end_time, 2.0);
        for pair in highlights.windows(2) {
            assert!(pair[0].end_time <= pair[1].start_time);
        }
        // Plain segments may overlap highlights.
        assert!(segments.iter().any(|s| s.text == "plain" && s.end_time == 5.0));
    }

    #[test]
    fn test_fraction_digits() {
        let segments = parse_segments("0:01.25 - 0:01.5\nx").unwrap();
        assert_eq!(segments[0].start_time, 1.25);
        assert_eq!(segments[0].end_time, 1.5);
    }

    #[test]
    fn test_format_timecode() {
        assert_eq!(format_timecode(135.0), "2:15.0");
        assert_eq!(format_timecode(3.5), "0:03.5");
    }
}

//! Resolution- and density-aware caption style calculation.
//!
//! Font size starts from a percentage of the reference dimension (width for
//! vertical video, height for horizontal), is nudged up for high pixel counts,
//! then scaled by how dense the captions are: short captions get bigger text,
//! long ones smaller.

use burnin_models::{
    ExportPreferences, Orientation, ResolutionTier, StyleParams, SubtitleSegment, VideoMetadata,
};

/// Pixel area the base percentages are tuned for.
const REFERENCE_AREA: f64 = 1920.0 * 1080.0;
const MAX_PIXEL_FACTOR: f64 = 1.4;
const MAX_SPACING: f64 = 10.0;

const CHAR_WEIGHT: f64 = 0.7;
const WORD_WEIGHT: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq)]
struct TierStyle {
    min_font: u32,
    max_font: u32,
    vertical_pct: f64,
    horizontal_pct: f64,
    base_spacing: f64,
}

fn tier_style(tier: ResolutionTier) -> TierStyle {
    match tier {
        ResolutionTier::Uhd2160 => TierStyle {
            min_font: 90,
            max_font: 200,
            vertical_pct: 0.070,
            horizontal_pct: 0.050,
            base_spacing: 3.0,
        },
        ResolutionTier::Qhd1440 => TierStyle {
            min_font: 60,
            max_font: 140,
            vertical_pct: 0.072,
            horizontal_pct: 0.052,
            base_spacing: 3.0,
        },
        ResolutionTier::Hd1080 => TierStyle {
            min_font: 45,
            max_font: 100,
            vertical_pct: 0.075,
            horizontal_pct: 0.055,
            base_spacing: 2.0,
        },
        ResolutionTier::Hd720 => TierStyle {
            min_font: 30,
            max_font: 70,
            vertical_pct: 0.078,
            horizontal_pct: 0.058,
            base_spacing: 2.0,
        },
        ResolutionTier::Sd => TierStyle {
            min_font: 20,
            max_font: 50,
            vertical_pct: 0.080,
            horizontal_pct: 0.060,
            base_spacing: 2.0,
        },
    }
}

/// Compute caption style for a video and its segments.
///
/// Deterministic: identical inputs always give identical output.
pub fn calculate_style(
    metadata: &VideoMetadata,
    segments: &[SubtitleSegment],
    prefs: &ExportPreferences,
) -> StyleParams {
    let (width, height) = metadata.display_dimensions();
    let orientation = metadata.orientation();
    let tier = tier_style(ResolutionTier::from_short_side(width.min(height)));

    let (reference_dim, base_pct) = match orientation {
        Orientation::Vertical => (width, tier.vertical_pct),
        Orientation::Horizontal => (height, tier.horizontal_pct),
    };

    let pixel_factor = pixel_factor(width, height);
    let base_size = (reference_dim as f64 * base_pct * pixel_factor).floor();
    let base_size = clamp_font(base_size, &tier);

    let scale = density_scale(segments);
    let sized = (base_size * scale * prefs.effective_font_scale()).floor();
    let font_size = clamp_font(sized, &tier) as u32;

    let spacing = (tier.base_spacing * scale).clamp(0.0, MAX_SPACING);

    let (side_pct, vertical_pct) = match orientation {
        Orientation::Vertical => (0.06, 0.12),
        Orientation::Horizontal => (0.05, 0.08),
    };
    let side_margin = (width as f64 * side_pct).round() as u32;

    StyleParams {
        font_size,
        spacing,
        margin_left: side_margin,
        margin_right: side_margin,
        margin_vertical: (height as f64 * vertical_pct).round() as u32,
        alignment: prefs.position.alignment(),
    }
}

fn clamp_font(size: f64, tier: &TierStyle) -> f64 {
    size.clamp(tier.min_font as f64, tier.max_font as f64)
}

/// `log10(pixels / reference) * 0.15 + 1`, capped at 1.4.
fn pixel_factor(width: u32, height: u32) -> f64 {
    let pixels = width as f64 * height as f64;
    ((pixels / REFERENCE_AREA).log10() * 0.15 + 1.0).min(MAX_PIXEL_FACTOR)
}

/// Blend of the char- and word-density factors.
fn density_scale(segments: &[SubtitleSegment]) -> f64 {
    if segments.is_empty() {
        return 1.0;
    }

    let count = segments.len() as f64;
    let avg_chars = segments.iter().map(|s| s.char_count()).sum::<usize>() as f64 / count;
    let avg_words = segments.iter().map(|s| s.word_count()).sum::<usize>() as f64 / count;

    CHAR_WEIGHT * char_factor(avg_chars) + WORD_WEIGHT * word_factor(avg_words)
}

fn char_factor(avg_chars: f64) -> f64 {
    piecewise(avg_chars, [10.0, 25.0, 40.0, 80.0])
}

fn word_factor(avg_words: f64) -> f64 {
    piecewise(avg_words, [2.0, 5.0, 8.0, 15.0])
}

/// 1.3 up to `t[0]`, down to 1.0 at `t[1]`, flat to `t[2]`, down to 0.7 at `t[3]`.
fn piecewise(x: f64, t: [f64; 4]) -> f64 {
    if x <= t[0] {
        1.3
    } else if x < t[1] {
        lerp(1.3, 1.0, (x - t[0]) / (t[1] - t[0]))
    } else if x <= t[2] {
        1.0
    } else if x < t[3] {
        lerp(1.0, 0.7, (x - t[2]) / (t[3] - t[2]))
    } else {
        0.7
    }
}

fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from + (to - from) * t
}

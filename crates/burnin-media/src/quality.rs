//! Encoder and quality selection.

use burnin_models::encoding::{AUDIO_COPY, DEFAULT_AUDIO_CODEC, DEFAULT_VIDEO_CODEC};
use burnin_models::{QualitySettings, RateControl, ResolutionTier, VideoMetadata};

/// Sources above this size get the fastest software preset.
pub const LARGE_FILE_THRESHOLD_BYTES: u64 = 1024 * 1024 * 1024;

/// Minimum AAC bitrate (bits/second) that is passed through untouched.
const AAC_PASSTHROUGH_MIN_BITRATE: u64 = 128_000;

struct SoftwareRow {
    crf: u8,
    preset: &'static str,
    audio_bitrate: &'static str,
}

fn software_row(tier: ResolutionTier) -> SoftwareRow {
    let (crf, preset, audio_bitrate) = match tier {
        ResolutionTier::Uhd2160 => (20, "medium", "256k"),
        ResolutionTier::Qhd1440 => (20, "medium", "192k"),
        ResolutionTier::Hd1080 => (21, "medium", "192k"),
        ResolutionTier::Hd720 => (22, "fast", "160k"),
        ResolutionTier::Sd => (23, "fast", "128k"),
    };
    SoftwareRow {
        crf,
        preset,
        audio_bitrate,
    }
}

fn hardware_qp(tier: ResolutionTier) -> u8 {
    match tier {
        ResolutionTier::Uhd2160 | ResolutionTier::Qhd1440 => 23,
        ResolutionTier::Hd1080 => 24,
        ResolutionTier::Hd720 => 25,
        ResolutionTier::Sd => 26,
    }
}

fn source_codec_is(metadata: &VideoMetadata, codecs: &[&str]) -> bool {
    metadata
        .source_codec
        .as_deref()
        .map(|c| codecs.iter().any(|known| c.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

/// Choose codec, rate control, preset and audio handling for one export.
///
/// `use_hardware` should already combine host capability and user preference.
pub fn select_quality(metadata: &VideoMetadata, use_hardware: bool) -> QualitySettings {
    let tier = ResolutionTier::from_short_side(metadata.short_side());
    let row = software_row(tier);
    let is_4k = tier == ResolutionTier::Uhd2160;

    let (audio_codec, audio_bitrate) = select_audio(metadata, row.audio_bitrate);

    if use_hardware {
        let video_codec = if is_4k && source_codec_is(metadata, &["hevc", "h265"]) {
            "hevc_vaapi"
        } else {
            "h264_vaapi"
        };
        return QualitySettings {
            video_codec: video_codec.to_string(),
            rate_control: RateControl::Qp(hardware_qp(tier)),
            preset: None,
            tune: None,
            audio_codec,
            audio_bitrate,
            hardware: true,
        };
    }

    let hevc_output = is_4k && source_codec_is(metadata, &["hevc", "h265", "av1", "vp9"]);
    let preset = if metadata.size_bytes > LARGE_FILE_THRESHOLD_BYTES {
        "veryfast"
    } else {
        row.preset
    };

    QualitySettings {
        video_codec: if hevc_output { "libx265" } else { DEFAULT_VIDEO_CODEC }.to_string(),
        rate_control: RateControl::Crf(row.crf),
        preset: Some(preset.to_string()),
        // x265 has no `film` tune
        tune: (!hevc_output).then(|| "film".to_string()),
        audio_codec,
        audio_bitrate,
        hardware: false,
    }
}

fn select_audio(metadata: &VideoMetadata, tier_bitrate: &str) -> (String, Option<String>) {
    let is_aac = metadata
        .source_audio_codec
        .as_deref()
        .map(|c| c.eq_ignore_ascii_case("aac"))
        .unwrap_or(false);
    let bitrate_ok = metadata
        .source_audio_bitrate
        .map(|b| b >= AAC_PASSTHROUGH_MIN_BITRATE)
        .unwrap_or(false);

    if is_aac && bitrate_ok {
        (AUDIO_COPY.to_string(), None)
    } else {
        (DEFAULT_AUDIO_CODEC.to_string(), Some(tier_bitrate.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(width: u32, height: u32) -> VideoMetadata {
        VideoMetadata::with_dimensions(width, height)
    }

    #[test]
    fn test_software_1080p() {
        let q = select_quality(&meta(1920, 1080), false);
        assert_eq!(q.video_codec, "libx264");
        assert_eq!(q.rate_control, RateControl::Crf(21));
        assert_eq!(q.preset.as_deref(), Some("medium"));
        assert_eq!(q.tune.as_deref(), Some("film"));
        assert_eq!(q.audio_codec, "aac");
        assert_eq!(q.audio_bitrate.as_deref(), Some("192k"));
        assert!(!q.hardware);
    }

    #[test]
    fn test_software_tiers() {
        assert_eq!(select_quality(&meta(1280, 720), false).rate_control, RateControl::Crf(22));
        assert_eq!(select_quality(&meta(854, 480), false).preset.as_deref(), Some("fast"));
        assert_eq!(
            select_quality(&meta(3840, 2160), false).audio_bitrate.as_deref(),
            Some("256k")
        );
        // vertical 1440p is bucketed by its short side
        assert_eq!(select_quality(&meta(1440, 2560), false).rate_control, RateControl::Crf(20));
    }

    #[test]
    fn test_hardware_table() {
        let q = select_quality(&meta(1920, 1080), true);
        assert_eq!(q.video_codec, "h264_vaapi");
        assert_eq!(q.rate_control, RateControl::Qp(24));
        assert!(q.preset.is_none());
        assert!(q.tune.is_none());
        assert!(q.hardware);
        assert_eq!(select_quality(&meta(640, 360), true).rate_control, RateControl::Qp(26));
    }

    #[test]
    fn test_4k_hevc_source() {
        let source = VideoMetadata {
            source_codec: Some("hevc".to_string()),
            ..meta(3840, 2160)
        };
        assert_eq!(select_quality(&source, true).video_codec, "hevc_vaapi");

        let q = select_quality(&source, false);
        assert_eq!(q.video_codec, "libx265");
        assert!(q.tune.is_none());

        let vp9 = VideoMetadata {
            source_codec: Some("vp9".to_string()),
            ..meta(3840, 2160)
        };
        assert_eq!(select_quality(&vp9, true).video_codec, "h264_vaapi");
        assert_eq!(select_quality(&vp9, false).video_codec, "libx265");

        let hevc_1080 = VideoMetadata {
            source_codec: Some("hevc".to_string()),
            ..meta(1920, 1080)
        };
        assert_eq!(select_quality(&hevc_1080, false).video_codec, "libx264");
    }

    #[test]
    fn test_large_file_override() {
        let big = VideoMetadata {
            size_bytes: LARGE_FILE_THRESHOLD_BYTES + 1,
            ..meta(1920, 1080)
        };
        assert_eq!(select_quality(&big, false).preset.as_deref(), Some("veryfast"));
        let hw = select_quality(&big, true);
        assert!(hw.preset.is_none());
        assert_eq!(hw.rate_control, RateControl::Qp(24));
    }

    #[test]
    fn test_audio_passthrough() {
        let good_aac = VideoMetadata {
            source_audio_codec: Some("aac".to_string()),
            source_audio_bitrate: Some(192_000),
            ..meta(1920, 1080)
        };
        let q = select_quality(&good_aac, false);
        assert_eq!(q.audio_codec, "copy");
        assert!(q.audio_bitrate.is_none());

        let low_aac = VideoMetadata {
            source_audio_bitrate: Some(96_000),
            ..good_aac.clone()
        };
        assert_eq!(select_quality(&low_aac, false).audio_codec, "aac");

        let opus = VideoMetadata {
            source_audio_codec: Some("opus".to_string()),
            ..good_aac
        };
        assert_eq!(select_quality(&opus, false).audio_codec, "aac");
    }
}

#![deny(unreachable_patterns)]
//! FFmpeg CLI layer for subtitle burn-in exports.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a runner with `-progress pipe:2` parsing
//! - FFprobe metadata probing
//! - Resolution- and density-aware subtitle style calculation
//! - Cached hardware encoder capability detection
//! - Quality/encoder selection tables
//! - A bounded FIFO pool for heavy encodes and the burn-in encode engine
//! - ASS subtitle asset rendering

pub mod command;
pub mod engine;
pub mod error;
pub mod fs_utils;
pub mod hardware;
pub mod pool;
pub mod probe;
pub mod progress;
pub mod quality;
pub mod style;
pub mod subtitle;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use engine::{EncodeEngine, EncodeInvocation, EngineEvent, FfmpegBurnEngine};
pub use error::{MediaError, MediaResult};
pub use fs_utils::{move_file, remove_file_if_exists, remove_stale_files};
pub use hardware::{
    CachedDetector, CapabilityDetector, DisabledDetector, HardwareCapability, HardwareProbe,
    VaapiProbe, DEFAULT_VAAPI_DEVICE,
};
pub use pool::{EncodePool, PoolStats, METRIC_POOL_ACTIVE, METRIC_POOL_QUEUED};
pub use probe::{probe_video, FfprobeProber, MetadataProber, VideoInfo};
pub use progress::EncodeProgress;
pub use quality::{select_quality, LARGE_FILE_THRESHOLD_BYTES};
pub use style::calculate_style;
pub use subtitle::{AssRenderer, SubtitleAsset, SubtitleRenderer};

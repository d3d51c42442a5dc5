//! Shared data models for the burn-in export pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Timed caption segments and the segment parser
//! - Video metadata and subtitle style parameters
//! - Encoder quality settings
//! - Export jobs, requests and progress-store keys

pub mod encoding;
pub mod job;
pub mod request;
pub mod segment;
pub mod style;
pub mod video;

// Re-export common types
pub use encoding::{QualitySettings, RateControl, ResolutionTier};
pub use job::{
    download_key, export_key, ExportJob, ExportStatus, ExportToken, DOWNLOAD_HANDOFF_TTL_SECS,
    EXPORT_PROGRESS_TTL_SECS,
};
pub use request::{is_hex_color, ExportPreferences, ExportRequest, SubtitlePosition};
pub use segment::{format_timecode, parse_segments, SegmentError, SegmentResult, SubtitleSegment};
pub use style::{Alignment, StyleParams};
pub use video::{Orientation, VideoMetadata, DEFAULT_HEIGHT, DEFAULT_WIDTH};

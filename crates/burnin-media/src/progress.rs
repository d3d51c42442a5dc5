//! Encode progress as reported by FFmpeg's `-progress` blocks.

use serde::Serialize;

/// Latest values from an FFmpeg progress block.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EncodeProgress {
    pub frame: u64,
    /// Output position in milliseconds
    pub out_time_ms: i64,
    /// Multiple of realtime; 0 until FFmpeg reports one
    pub speed: f64,
    /// Set by the final `progress=end` block
    pub is_complete: bool,
}

impl EncodeProgress {
    /// Whole percent of `total_ms` written so far, 0 when the total is unknown.
    pub fn percent(&self, total_ms: i64) -> u8 {
        if total_ms <= 0 || self.out_time_ms <= 0 {
            return 0;
        }
        let ratio = self.out_time_ms as f64 / total_ms as f64;
        (ratio * 100.0).clamp(0.0, 100.0).floor() as u8
    }

    /// Seconds left at the current speed.
    pub fn eta_secs(&self, total_ms: i64) -> Option<f64> {
        if total_ms <= 0 || self.out_time_ms <= 0 || self.speed <= 0.0 {
            return None;
        }
        let left_ms = (total_ms - self.out_time_ms).max(0);
        Some(left_ms as f64 / 1000.0 / self.speed)
    }
}

//! Export pipeline metrics.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const EXPORTS_STARTED_TOTAL: &str = "burnin_exports_started_total";
    pub const EXPORTS_COMPLETED_TOTAL: &str = "burnin_exports_completed_total";
    pub const EXPORTS_FAILED_TOTAL: &str = "burnin_exports_failed_total";
    pub const EXPORT_DURATION_SECONDS: &str = "burnin_export_duration_seconds";
    pub const ENCODE_DURATION_SECONDS: &str = "burnin_encode_duration_seconds";
    pub const HANDOFFS_CREATED_TOTAL: &str = "burnin_handoffs_created_total";
    pub const HANDOFFS_REDEEMED_TOTAL: &str = "burnin_handoffs_redeemed_total";
    pub const PROGRESS_WRITE_FAILURES_TOTAL: &str = "burnin_progress_write_failures_total";
}

pub fn record_export_started() {
    counter!(names::EXPORTS_STARTED_TOTAL).increment(1);
}

pub fn record_export_completed(hardware: bool, duration_secs: f64) {
    let labels = [("hardware", hardware.to_string())];
    counter!(names::EXPORTS_COMPLETED_TOTAL, &labels).increment(1);
    histogram!(names::EXPORT_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_export_failed(kind: &'static str) {
    counter!(names::EXPORTS_FAILED_TOTAL, "kind" => kind).increment(1);
}

pub fn record_encode_duration(codec: &str, duration_secs: f64) {
    let labels = [("codec", codec.to_string())];
    histogram!(names::ENCODE_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_handoff_created() {
    counter!(names::HANDOFFS_CREATED_TOTAL).increment(1);
}

/// `outcome` is `redeemed` or `rejected`.
pub fn record_handoff_redeemed(outcome: &'static str) {
    counter!(names::HANDOFFS_REDEEMED_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_progress_write_failure() {
    counter!(names::PROGRESS_WRITE_FAILURES_TOTAL).increment(1);
}

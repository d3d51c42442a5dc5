//! Export job records kept in the ephemeral progress store.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// TTL of `export:<token>` records in seconds.
pub const EXPORT_PROGRESS_TTL_SECS: u64 = 3600;

/// TTL of `download:<token>` one-time handoff records in seconds.
pub const DOWNLOAD_HANDOFF_TTL_SECS: u64 = 300;

/// Store key for an export job record.
pub fn export_key(token: &ExportToken) -> String {
    format!("export:{}", token)
}

/// Store key for a one-time download handoff.
pub fn download_key(token: &str) -> String {
    format!("download:{}", token)
}

/// Opaque identifier of one export job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ExportToken(pub String);

impl ExportToken {
    /// Generate a new random token.
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Tokens are generated as 32 hex chars; anything else is rejected early.
    pub fn is_well_formed(s: &str) -> bool {
        !s.is_empty() && s.len() <= 64 && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    }
}

impl Default for ExportToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExportToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of an export job.
///
/// `created -> exporting -> {complete | error}`, with no re-entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExportStatus {
    #[default]
    Created,
    Exporting,
    Complete,
    Error,
}

impl ExportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportStatus::Created => "created",
            ExportStatus::Exporting => "exporting",
            ExportStatus::Complete => "complete",
            ExportStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExportStatus::Complete | ExportStatus::Error)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: ExportStatus) -> bool {
        matches!(
            (self, next),
            (ExportStatus::Created, ExportStatus::Exporting)
                | (ExportStatus::Created, ExportStatus::Error)
                | (ExportStatus::Exporting, ExportStatus::Exporting)
                | (ExportStatus::Exporting, ExportStatus::Complete)
                | (ExportStatus::Exporting, ExportStatus::Error)
        )
    }
}

impl fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of an export job as stored under `export:<token>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportJob {
    pub token: ExportToken,
    pub upload_id: String,
    pub status: ExportStatus,
    /// Progress percentage (0-100), never decreases within one job
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Estimated seconds remaining while exporting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    /// Duration of the exported video in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ExportJob {
    /// Create a fresh job record in the `created` state.
    pub fn new(token: ExportToken, upload_id: impl Into<String>) -> Self {
        Self {
            token,
            upload_id: upload_id.into(),
            status: ExportStatus::Created,
            progress: 0,
            message: Some("Export queued".to_string()),
            eta_secs: None,
            output_path: None,
            duration: None,
            error: None,
            updated_at: Utc::now(),
        }
    }

    /// Move into `exporting` with a status message.
    pub fn begin(&mut self, message: impl Into<String>) -> bool {
        if !self.status.can_transition_to(ExportStatus::Exporting) {
            return false;
        }
        self.status = ExportStatus::Exporting;
        self.message = Some(message.into());
        self.updated_at = Utc::now();
        true
    }

    /// Record encode progress.
    ///
    /// Returns `true` when the stored progress increased. Values are capped at
    /// 99 until the job completes, and lower values are ignored.
    pub fn advance(&mut self, progress: u8, eta_secs: Option<f64>) -> bool {
        if self.status != ExportStatus::Exporting {
            return false;
        }
        let progress = progress.min(99);
        if progress <= self.progress {
            return false;
        }
        self.progress = progress;
        self.eta_secs = eta_secs;
        self.message = Some(format!("Exporting {}%", progress));
        self.updated_at = Utc::now();
        true
    }

    /// Terminal success.
    pub fn complete(&mut self, output_path: impl Into<String>, duration: f64) -> bool {
        if !self.status.can_transition_to(ExportStatus::Complete) {
            return false;
        }
        self.status = ExportStatus::Complete;
        self.progress = 100;
        self.eta_secs = None;
        self.output_path = Some(output_path.into());
        self.duration = Some(duration);
        self.message = Some("Export complete".to_string());
        self.updated_at = Utc::now();
        true
    }

    /// Terminal failure. Progress is kept as last reported.
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if !self.status.can_transition_to(ExportStatus::Error) {
            return false;
        }
        self.status = ExportStatus::Error;
        self.eta_secs = None;
        self.error = Some(error.into());
        self.message = None;
        self.updated_at = Utc::now();
        true
    }
}

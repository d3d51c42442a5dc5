//! Structured export logging.

use burnin_models::ExportToken;
use tracing::{error, info, warn, Span};

/// Logger carrying the export token on every line.
#[derive(Debug, Clone)]
pub struct JobLogger {
    token: String,
    operation: &'static str,
}

impl JobLogger {
    pub fn new(token: &ExportToken, operation: &'static str) -> Self {
        Self {
            token: token.to_string(),
            operation,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(token = %self.token, operation = self.operation, "Export started: {}", message);
    }

    pub fn log_progress(&self, message: &str) {
        info!(token = %self.token, operation = self.operation, "Export progress: {}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(token = %self.token, operation = self.operation, "Export warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(token = %self.token, operation = self.operation, "Export error: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(token = %self.token, operation = self.operation, "Export completed: {}", message);
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Span wrapping the whole pipeline for one export.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("export", token = %self.token, operation = self.operation)
    }
}

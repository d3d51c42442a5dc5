//! One-time download handoffs.
//!
//! A client that cannot hold a long request open (or wants a plain link)
//! stores its export request and gets back a short-lived token. The first
//! `GET` with that token runs the export; every later one is rejected.

use serde::{Deserialize, Serialize};

use burnin_models::{download_key, ExportRequest, ExportToken};
use burnin_store::{put_json, take_json};

use crate::error::{ExportError, ExportResult};
use crate::metrics;
use crate::orchestrator::{validate_request, ExportOrchestrator, ExportOutcome};

/// Returned to the client when a handoff is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffTicket {
    pub token: String,
    pub expires_in_secs: u64,
}

/// Issues and redeems one-time download tokens.
#[derive(Clone)]
pub struct DownloadHandoff {
    orchestrator: ExportOrchestrator,
}

impl DownloadHandoff {
    pub fn new(orchestrator: ExportOrchestrator) -> Self {
        Self { orchestrator }
    }

    /// Store `request` under a fresh token that expires after the download TTL.
    ///
    /// Segments and preferences are checked up front so bad input fails now
    /// rather than at download time.
    pub async fn create(&self, request: &ExportRequest) -> ExportResult<HandoffTicket> {
        validate_request(request)?;

        let token = ExportToken::new();
        let ttl = self.orchestrator.config().download_ttl;
        put_json(
            self.orchestrator.store().as_ref(),
            &download_key(token.as_str()),
            request,
            ttl,
        )
        .await?;

        metrics::record_handoff_created();
        tracing::info!(upload_id = %request.upload_id, "Created download handoff");

        Ok(HandoffTicket {
            token: token.to_string(),
            expires_in_secs: ttl.as_secs(),
        })
    }

    /// Consume the token and return its request. Succeeds at most once per token.
    pub async fn take(&self, token: &str) -> ExportResult<ExportRequest> {
        if !ExportToken::is_well_formed(token) {
            metrics::record_handoff_redeemed("rejected");
            return Err(ExportError::InvalidOrExpired);
        }

        let taken: Option<ExportRequest> =
            take_json(self.orchestrator.store().as_ref(), &download_key(token)).await?;

        match taken {
            Some(request) => {
                metrics::record_handoff_redeemed("redeemed");
                Ok(request)
            }
            None => {
                metrics::record_handoff_redeemed("rejected");
                Err(ExportError::InvalidOrExpired)
            }
        }
    }

    /// Consume the token and run its export to completion.
    pub async fn redeem(&self, token: &str) -> ExportResult<ExportOutcome> {
        let request = self.take(token).await?;
        self.orchestrator.run_export(request).await
    }
}

//! One-time download handoff handlers.

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use axum::Json;

use burnin_export::HandoffTicket;
use burnin_models::ExportRequest;

use crate::delivery::{stream_export, Delivery};
use crate::error::ApiResult;
use crate::state::AppState;

/// Store an export request behind a short-lived, single-use token.
pub async fn create_download(
    State(state): State<AppState>,
    Json(request): Json<ExportRequest>,
) -> ApiResult<(StatusCode, Json<HandoffTicket>)> {
    let ticket = state.handoff.create(&request).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// Redeem a handoff token: run the export, then stream the result.
///
/// The token is consumed before the export starts, so a second request gets
/// `410 Gone` even while the first one is still encoding.
pub async fn redeem_download(
    State(state): State<AppState>,
    Path(token): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let request = state.handoff.take(&token).await?;
    let filename = request.filename.clone();

    let outcome = state.orchestrator.run_export(request).await?;

    let delivery = Delivery {
        filename: filename.unwrap_or_else(|| format!("export-{}.mp4", outcome.token)),
        token: outcome.token,
        path: outcome.output_path,
    };

    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    stream_export(
        &state.orchestrator,
        delivery,
        range,
        state.config.cleanup_grace,
    )
    .await
}

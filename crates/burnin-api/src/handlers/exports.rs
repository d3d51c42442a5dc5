//! Export handlers: start, poll, download.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use burnin_export::{ExportError, ProgressView};
use burnin_models::{ExportRequest, ExportStatus, ExportToken};

use crate::delivery::{stream_export, Delivery};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Serialize)]
pub struct StartExportResponse {
    pub token: String,
}

/// Start an export and return its token without waiting for the encode.
pub async fn start_export(
    State(state): State<AppState>,
    Json(request): Json<ExportRequest>,
) -> ApiResult<(StatusCode, Json<StartExportResponse>)> {
    let upload_id = request.upload_id.clone();
    let token = state.orchestrator.start_export(request).await?;

    info!(token = %token, upload_id = %upload_id, "Export accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(StartExportResponse {
            token: token.to_string(),
        }),
    ))
}

/// Status poll payload.
#[derive(Debug, Serialize)]
pub struct ExportStatusResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExportStatusResponse {
    fn from_view(view: ProgressView) -> Option<Self> {
        let empty = Self {
            status: "processing",
            progress: None,
            message: None,
            eta_secs: None,
            output_path: None,
            duration: None,
            error: None,
        };

        match view {
            ProgressView::Processing {
                progress,
                message,
                eta_secs,
            } => Some(Self {
                progress: Some(progress),
                message,
                eta_secs,
                ..empty
            }),
            ProgressView::Complete {
                output_path,
                duration,
            } => Some(Self {
                status: "complete",
                progress: Some(100),
                output_path: Some(output_path),
                duration: Some(duration),
                ..empty
            }),
            ProgressView::Error { message } => Some(Self {
                status: "error",
                error: Some(message),
                ..empty
            }),
            ProgressView::NotFound => None,
        }
    }
}

/// Poll the state of an export.
pub async fn get_export_status(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<ExportStatusResponse>> {
    let view = state.orchestrator.progress(&token).await?;
    ExportStatusResponse::from_view(view)
        .map(Json)
        .ok_or(ApiError::Export(ExportError::NotFound))
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    /// Name offered to the browser
    pub filename: Option<String>,
}

/// Stream a finished export. Supports `Range`.
pub async fn download_export(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(query): Query<DownloadQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let job = state
        .orchestrator
        .job(&token)
        .await?
        .ok_or(ApiError::Export(ExportError::NotFound))?;

    match job.status {
        ExportStatus::Created | ExportStatus::Exporting => {
            return Err(ApiError::conflict(format!(
                "Export still processing ({}%)",
                job.progress
            )));
        }
        ExportStatus::Error => {
            return Err(ApiError::conflict(format!(
                "Export failed: {}",
                job.error.unwrap_or_default()
            )));
        }
        ExportStatus::Complete => {}
    }

    let path: std::path::PathBuf = job
        .output_path
        .map(Into::into)
        .unwrap_or_else(|| state.orchestrator.config().output_path_for(&token));

    let delivery = Delivery {
        token: ExportToken::from_string(token.as_str()),
        path,
        filename: query
            .filename
            .unwrap_or_else(|| format!("export-{}.mp4", token)),
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

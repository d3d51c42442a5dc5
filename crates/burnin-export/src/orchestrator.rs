//! Export orchestration.
//!
//! An export moves through `created -> exporting -> {complete | error}`. The
//! record lives in the progress store under `export:<token>` so any API
//! instance can answer status polls. Heavy work runs through the shared
//! [`EncodePool`]; progress from the encoder arrives on a channel and is
//! written back by a listener task.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::Instrument;

use burnin_media::{
    calculate_style, move_file, remove_file_if_exists, select_quality, AssRenderer, CachedDetector,
    CapabilityDetector, DisabledDetector, EncodeEngine, EncodeInvocation, EncodePool, EngineEvent,
    FfmpegBurnEngine, FfprobeProber, MetadataProber, SubtitleRenderer, VaapiProbe,
};
use burnin_models::{
    export_key, parse_segments, ExportJob, ExportRequest, ExportStatus, ExportToken,
    SubtitleSegment, VideoMetadata,
};
use burnin_store::{get_json, put_json, ProgressStore};

use crate::config::ExportConfig;
use crate::error::{ExportError, ExportResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::persistence::{NoopProjectSink, ProjectSink};
use crate::upload::{DirUploadResolver, UploadResolver};
use crate::workspace::WorkDir;

const OPERATION: &str = "burn_in_export";

/// Result of a finished export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOutcome {
    pub token: ExportToken,
    pub output_path: PathBuf,
    /// Duration of the exported video in seconds
    pub duration: f64,
}

/// What a status poll sees.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProgressView {
    Processing {
        progress: u8,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        eta_secs: Option<f64>,
    },
    Complete {
        output_path: String,
        duration: f64,
    },
    Error {
        message: String,
    },
    NotFound,
}

impl From<ExportJob> for ProgressView {
    fn from(job: ExportJob) -> Self {
        match job.status {
            ExportStatus::Created | ExportStatus::Exporting => ProgressView::Processing {
                progress: job.progress,
                message: job.message,
                eta_secs: job.eta_secs,
            },
            ExportStatus::Complete => ProgressView::Complete {
                output_path: job.output_path.unwrap_or_default(),
                duration: job.duration.unwrap_or_default(),
            },
            ExportStatus::Error => ProgressView::Error {
                message: job.error.unwrap_or_else(|| "Export failed".to_string()),
            },
        }
    }
}

/// A validated request with its record already stored.
struct PreparedExport {
    token: ExportToken,
    job: ExportJob,
    request: ExportRequest,
    segments: Vec<SubtitleSegment>,
    upload_path: PathBuf,
}

/// Check caller input before any record is written.
pub(crate) fn validate_request(request: &ExportRequest) -> ExportResult<Vec<SubtitleSegment>> {
    let segments = parse_segments(&request.segments)?;
    request
        .preferences
        .validate()
        .map_err(ExportError::invalid_request)?;
    Ok(segments)
}

/// Coordinates burn-in exports end to end.
#[derive(Clone)]
pub struct ExportOrchestrator {
    config: Arc<ExportConfig>,
    store: Arc<dyn ProgressStore>,
    uploads: Arc<dyn UploadResolver>,
    prober: Arc<dyn MetadataProber>,
    detector: Arc<dyn CapabilityDetector>,
    renderer: Arc<dyn SubtitleRenderer>,
    engine: Arc<dyn EncodeEngine>,
    projects: Arc<dyn ProjectSink>,
    pool: EncodePool,
}

impl ExportOrchestrator {
    /// Build an orchestrator with the FFmpeg-backed defaults for `config`.
    pub fn new(config: ExportConfig, store: Arc<dyn ProgressStore>) -> Self {
        let detector: Arc<dyn CapabilityDetector> = if config.hw_enabled {
            Arc::new(CachedDetector::new(VaapiProbe::new(
                config.hw_device.clone(),
                config.hw_probe_timeout,
            )))
        } else {
            Arc::new(DisabledDetector)
        };

        let mut engine = FfmpegBurnEngine::new();
        if let Some(timeout) = config.encode_timeout {
            engine = engine.with_timeout(timeout.as_secs().max(1));
        }

        Self {
            uploads: Arc::new(DirUploadResolver::new(config.upload_dir.clone())),
            prober: Arc::new(FfprobeProber),
            detector,
            renderer: Arc::new(AssRenderer::new(
                config.font_name.clone(),
                config.font_path.clone(),
            )),
            engine: Arc::new(engine),
            projects: Arc::new(NoopProjectSink),
            pool: EncodePool::new(config.max_concurrent_encodes),
            config: Arc::new(config),
            store,
        }
    }

    pub fn with_upload_resolver(mut self, uploads: Arc<dyn UploadResolver>) -> Self {
        self.uploads = uploads;
        self
    }

    pub fn with_prober(mut self, prober: Arc<dyn MetadataProber>) -> Self {
        self.prober = prober;
        self
    }

    pub fn with_detector(mut self, detector: Arc<dyn CapabilityDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn SubtitleRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_engine(mut self, engine: Arc<dyn EncodeEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_project_sink(mut self, projects: Arc<dyn ProjectSink>) -> Self {
        self.projects = projects;
        self
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ProgressStore> {
        &self.store
    }

    pub fn pool(&self) -> &EncodePool {
        &self.pool
    }

    /// Validate, record and launch an export in the background.
    ///
    /// Returns as soon as the `created` record is stored. Poll with
    /// [`ExportOrchestrator::progress`].
    pub async fn start_export(&self, request: ExportRequest) -> ExportResult<ExportToken> {
        let prepared = self.prepare(request).await?;
        let token = prepared.token.clone();

        let this = self.clone();
        let span = JobLogger::new(&token, OPERATION).create_span();
        tokio::spawn(
            async move {
                // Failures are already recorded on the job
                let _ = this.execute(prepared).await;
            }
            .instrument(span),
        );

        Ok(token)
    }

    /// Validate, record and run an export to completion.
    ///
    /// The export runs on its own task. Dropping the returned future detaches
    /// it instead of cancelling the encode, so the job still reaches a
    /// terminal state when the caller goes away.
    pub async fn run_export(&self, request: ExportRequest) -> ExportResult<ExportOutcome> {
        let this = self.clone();
        let handle = tokio::spawn(async move {
            let prepared = this.prepare(request).await?;
            let span = JobLogger::new(&prepared.token, OPERATION).create_span();
            this.execute(prepared).instrument(span).await
        });

        handle
            .await
            .map_err(|e| ExportError::internal(format!("Export task failed: {}", e)))?
    }

    /// Current state of an export.
    pub async fn progress(&self, token: &str) -> ExportResult<ProgressView> {
        Ok(self
            .job(token)
            .await?
            .map(ProgressView::from)
            .unwrap_or(ProgressView::NotFound))
    }

    /// Raw job record, `None` when unknown or expired.
    pub async fn job(&self, token: &str) -> ExportResult<Option<ExportJob>> {
        if !ExportToken::is_well_formed(token) {
            return Ok(None);
        }
        let key = export_key(&ExportToken::from_string(token));
        Ok(get_json(self.store.as_ref(), &key).await?)
    }

    /// Remove a delivered export: its output file and its record.
    pub async fn discard(&self, token: &ExportToken, output_path: &Path) -> ExportResult<()> {
        let removed = remove_file_if_exists(output_path).await?;
        self.store.delete(&export_key(token)).await?;
        tracing::info!(token = %token, file_removed = removed, "Discarded delivered export");
        Ok(())
    }

    async fn prepare(&self, request: ExportRequest) -> ExportResult<PreparedExport> {
        let segments = validate_request(&request)?;
        let upload_path = self.uploads.resolve(&request.upload_id).await?;

        let token = ExportToken::new();
        let job = ExportJob::new(token.clone(), request.upload_id.clone());

        // Without a record nobody could observe the job, so this is fatal
        put_json(
            self.store.as_ref(),
            &export_key(&token),
            &job,
            self.config.export_ttl,
        )
        .await?;

        metrics::record_export_started();

        Ok(PreparedExport {
            token,
            job,
            request,
            segments,
            upload_path,
        })
    }

    async fn execute(&self, prepared: PreparedExport) -> ExportResult<ExportOutcome> {
        let PreparedExport {
            token,
            mut job,
            request,
            segments,
            upload_path,
        } = prepared;

        let logger = JobLogger::new(&token, OPERATION);
        logger.log_start(&format!(
            "upload={} segments={}",
            request.upload_id,
            segments.len()
        ));
        let started = Instant::now();
        let final_path = self.config.output_path_for(token.as_str());

        let result = self
            .run_pipeline(&token, &mut job, &request, &segments, &upload_path, &final_path, &logger)
            .await;

        match result {
            Ok((hardware, duration)) => {
                job.complete(final_path.to_string_lossy(), duration);
                // Re-arms the TTL so the download window starts now
                if let Err(e) = self.write_job(&job).await {
                    logger.log_error(&format!("Failed to record completion: {}", e));
                }

                metrics::record_export_completed(hardware, started.elapsed().as_secs_f64());
                logger.log_completion(&format!(
                    "output={} duration={:.2}s elapsed={:.1}s",
                    final_path.display(),
                    duration,
                    started.elapsed().as_secs_f64()
                ));

                self.spawn_project_save(&request, &final_path);

                Ok(ExportOutcome {
                    token,
                    output_path: final_path,
                    duration,
                })
            }
            Err(e) => {
                logger.log_error(&e.to_string());
                if let Err(cleanup) = remove_file_if_exists(&final_path).await {
                    logger.log_warning(&format!("Failed to remove partial output: {}", cleanup));
                }

                job.fail(e.to_string());
                if let Err(write) = self.write_job(&job).await {
                    logger.log_error(&format!("Failed to record failure: {}", write));
                }

                metrics::record_export_failed(e.kind());
                Err(e)
            }
        }
    }

    /// Runs everything between `created` and the terminal write.
    ///
    /// Returns whether the hardware path was used and the output duration.
    #[allow(clippy::too_many_arguments)]
    async fn run_pipeline(
        &self,
        token: &ExportToken,
        job: &mut ExportJob,
        request: &ExportRequest,
        segments: &[SubtitleSegment],
        upload_path: &Path,
        final_path: &Path,
        logger: &JobLogger,
    ) -> ExportResult<(bool, f64)> {
        job.begin("Preparing export");
        self.write_progress(job, logger).await;

        let metadata = self.resolve_metadata(request, upload_path, logger).await;
        let style = calculate_style(&metadata, segments, &request.preferences);
        logger.log_progress(&format!(
            "style font_size={} spacing={:.2} alignment={}",
            style.font_size,
            style.spacing,
            style.alignment.ass_code()
        ));

        let use_hardware = request.preferences.hardware_acceleration
            && self.config.hw_enabled
            && self.detector.detect().await.available;
        let quality = select_quality(&metadata, use_hardware);
        logger.log_progress(&format!(
            "encoder={} rate={} audio={}",
            quality.video_codec,
            quality.rate_control.value(),
            quality.audio_codec
        ));

        let work_dir = WorkDir::create(&self.config.work_dir, token).await?;
        let staged: ExportResult<f64> = async {
            let subtitle = self
                .renderer
                .render(
                    segments,
                    &style,
                    &request.preferences,
                    metadata.display_dimensions(),
                    work_dir.path(),
                )
                .await?;

            let duration = if metadata.duration > 0.0 {
                metadata.duration
            } else {
                segments.iter().map(|s| s.end_time).fold(0.0, f64::max)
            };

            let work_output = work_dir.path().join("output.mp4");
            let invocation = EncodeInvocation {
                input: upload_path.to_path_buf(),
                output: work_output.clone(),
                subtitle,
                quality: quality.clone(),
                duration_secs: duration,
                hw_device: self.detector.device().map(Path::to_path_buf),
            };

            job.message = Some("Encoding".to_string());
            self.write_progress(job, logger).await;

            let (events_tx, events_rx) = mpsc::unbounded_channel();
            let listener = tokio::spawn(Self::listen_progress(
                Arc::clone(&self.store),
                self.config.export_ttl,
                job.clone(),
                events_rx,
                logger.clone(),
            ));

            let encode_started = Instant::now();
            let engine = Arc::clone(&self.engine);
            let encoded = self.pool.run(engine.encode(invocation, events_tx)).await;

            // The engine drops its sender when it returns, which ends the listener
            match listener.await {
                Ok(latest) => *job = latest,
                Err(e) => {
                    logger.log_warning(&format!("Progress listener ended abnormally: {}", e))
                }
            }

            encoded??;
            metrics::record_encode_duration(
                &quality.video_codec,
                encode_started.elapsed().as_secs_f64(),
            );

            if !tokio::fs::try_exists(&work_output).await.unwrap_or(false) {
                return Err(ExportError::encode_failed("Encoder produced no output file"));
            }
            move_file(&work_output, final_path).await?;
            Ok(duration)
        }
        .await;

        if let Err(e) = work_dir.remove().await {
            logger.log_warning(&format!("Failed to remove work dir: {}", e));
        }

        let duration = staged?;
        Ok((quality.hardware, duration))
    }

    async fn resolve_metadata(
        &self,
        request: &ExportRequest,
        upload_path: &Path,
        logger: &JobLogger,
    ) -> VideoMetadata {
        let mut metadata = match &request.metadata {
            Some(supplied) => supplied.clone().normalized(),
            None => match self.prober.probe(upload_path).await {
                Ok(probed) => probed,
                Err(e) => {
                    logger.log_warning(&format!("Probe failed, using default metadata: {}", e));
                    VideoMetadata::default()
                }
            },
        };

        if metadata.size_bytes == 0 {
            if let Ok(file) = tokio::fs::metadata(upload_path).await {
                metadata.size_bytes = file.len();
            }
        }

        metadata
    }

    /// Applies encoder events to a copy of the job and persists increases.
    ///
    /// Returns the last state so the terminal write starts from it.
    async fn listen_progress(
        store: Arc<dyn ProgressStore>,
        ttl: std::time::Duration,
        mut job: ExportJob,
        mut events: mpsc::UnboundedReceiver<EngineEvent>,
        logger: JobLogger,
    ) -> ExportJob {
        while let Some(event) = events.recv().await {
            let EngineEvent::Progress { percent, eta_secs } = event;
            if !job.advance(percent, eta_secs) {
                continue;
            }
            if let Err(e) = put_json(store.as_ref(), &export_key(&job.token), &job, ttl).await {
                metrics::record_progress_write_failure();
                logger.log_warning(&format!("Progress write failed: {}", e));
            }
        }
        job
    }

    async fn write_job(&self, job: &ExportJob) -> ExportResult<()> {
        put_json(
            self.store.as_ref(),
            &export_key(&job.token),
            job,
            self.config.export_ttl,
        )
        .await?;
        Ok(())
    }

    /// Non-terminal writes never fail the export.
    async fn write_progress(&self, job: &ExportJob, logger: &JobLogger) {
        if let Err(e) = self.write_job(job).await {
            metrics::record_progress_write_failure();
            logger.log_warning(&format!("Progress write failed: {}", e));
        }
    }

    fn spawn_project_save(&self, request: &ExportRequest, output_path: &Path) {
        let (Some(user_id), Some(project_id)) = (request.user_id.clone(), request.project_id.clone())
        else {
            return;
        };

        let projects = Arc::clone(&self.projects);
        let output_path = output_path.to_path_buf();
        tokio::spawn(async move {
            if let Err(e) = projects.save(&user_id, &output_path, &project_id).await {
                tracing::warn!(user_id = %user_id, project_id = %project_id, "Project save failed: {}", e);
            }
        });
    }
}

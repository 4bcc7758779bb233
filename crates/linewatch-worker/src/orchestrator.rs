//! Pipeline orchestrator.
//!
//! Stage runs execute on spawned tasks behind a semaphore; the triggering
//! call returns as soon as the job is registered. Detection chains
//! segmentation on the same task once the results document is on disk.

use std::sync::Arc;
use std::time::Instant;

use linewatch_ml_client::{DetectionCapability, SegmentationCapability};
use linewatch_models::{
    DetectionAccepted, JobState, RecoveredStatus, ResultsDocument, SegmentationAccepted, SessionFile, Stage,
    StageStatus, StatusReport,
};
use linewatch_storage::{SessionStore, StorageError};
use tokio::sync::Semaphore;
use tracing::{debug, warn, Instrument};

use crate::config::PipelineConfig;
use crate::detection::run_detection;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::SessionLogger;
use crate::metrics;
use crate::renamer::{FilenameRenamer, IdentityRenamer};
use crate::segmentation::run_segmentation;
use crate::tracker::{Admission, JobTracker, Reentry};

/// Everything a stage run needs.
pub(crate) struct StageContext {
    pub store: SessionStore,
    pub tracker: JobTracker,
    pub detector: Arc<dyn DetectionCapability>,
    pub segmenter: Arc<dyn SegmentationCapability>,
    pub renamer: Arc<dyn FilenameRenamer>,
    pub config: PipelineConfig,
}

/// Health of one capability, for readiness probes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityCheck {
    pub role: &'static str,
    pub name: &'static str,
    pub error: Option<String>,
}

impl CapabilityCheck {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Two-stage inspection pipeline. Cheap to clone.
#[derive(Clone)]
pub struct Pipeline {
    ctx: Arc<StageContext>,
    job_semaphore: Arc<Semaphore>,
}

impl Pipeline {
    pub fn new(
        store: SessionStore,
        detector: Arc<dyn DetectionCapability>,
        segmenter: Arc<dyn SegmentationCapability>,
        config: PipelineConfig,
    ) -> Self {
        Self::with_renamer(store, detector, segmenter, Arc::new(IdentityRenamer), config)
    }

    pub fn with_renamer(
        store: SessionStore,
        detector: Arc<dyn DetectionCapability>,
        segmenter: Arc<dyn SegmentationCapability>,
        renamer: Arc<dyn FilenameRenamer>,
        config: PipelineConfig,
    ) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        Self {
            ctx: Arc::new(StageContext {
                store,
                tracker: JobTracker::new(),
                detector,
                segmenter,
                renamer,
                config,
            }),
            job_semaphore,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.ctx.store
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.ctx.config
    }

    /// Start detection for a session. Segmentation follows automatically.
    pub async fn start_detection(&self, session_id: &str) -> PipelineResult<DetectionAccepted> {
        let images: Vec<String> = self
            .ctx
            .store
            .list_images(session_id)
            .await?
            .iter()
            .filter_map(|path| path.file_name().and_then(|n| n.to_str()).map(str::to_string))
            .collect();

        if images.is_empty() {
            return Err(PipelineError::NoInput(session_id.to_string()));
        }
        let total = images.len() as u32;

        // A completed document outlives the tracker across restarts.
        if self.ctx.tracker.snapshot(session_id, Stage::Detection).await.is_none() {
            self.ensure_not_completed_on_disk(session_id).await?;
        }

        let job = match self
            .ctx
            .tracker
            .begin(session_id, Stage::Detection, total, Reentry::KeepSettled)
            .await
        {
            Admission::Started(job) => job,
            Admission::Existing(job) if job.status == StageStatus::Completed => {
                return Err(PipelineError::AlreadyCompleted {
                    session_id: session_id.to_string(),
                    stage: Stage::Detection,
                });
            }
            Admission::Existing(_) => {
                return Err(PipelineError::AlreadyRunning {
                    session_id: session_id.to_string(),
                    stage: Stage::Detection,
                });
            }
        };
        metrics::record_stage_started(Stage::Detection);

        let ctx = Arc::clone(&self.ctx);
        let semaphore = Arc::clone(&self.job_semaphore);
        tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    let _ = ctx.tracker.fail(&job.session_id, Stage::Detection, "pipeline shut down").await;
                    return;
                }
            };
            execute_detection(ctx, job, images).await;
        });

        Ok(DetectionAccepted::new(session_id, total))
    }

    async fn ensure_not_completed_on_disk(&self, session_id: &str) -> PipelineResult<()> {
        match self.ctx.store.read_results(session_id).await {
            Ok(document) if document.is_completed() => Err(PipelineError::AlreadyCompleted {
                session_id: session_id.to_string(),
                stage: Stage::Detection,
            }),
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(StorageError::Json(e)) => {
                warn!(session_id, error = %e, "Unreadable results document will be replaced");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Start segmentation over a session's persisted results.
    ///
    /// A processing or completed segmentation job is reused and the call
    /// reports `accepted: false`.
    pub async fn start_segmentation(&self, session_id: &str) -> PipelineResult<SegmentationAccepted> {
        if !self.ctx.store.results_exists(session_id).await? {
            return Err(PipelineError::PrerequisiteMissing(format!(
                "no results for session {}",
                session_id
            )));
        }

        match self
            .ctx
            .tracker
            .begin(session_id, Stage::Segmentation, 0, Reentry::KeepSettled)
            .await
        {
            Admission::Existing(job) => {
                debug!(session_id, status = %job.status, "Reusing segmentation job");
                return Ok(SegmentationAccepted::reused(session_id, job.status));
            }
            Admission::Started(_) => {}
        }
        metrics::record_stage_started(Stage::Segmentation);

        let ctx = Arc::clone(&self.ctx);
        let semaphore = Arc::clone(&self.job_semaphore);
        let session = session_id.to_string();
        tokio::spawn(async move {
            // Wait before taking a permit so a queued detection can run.
            ctx.tracker.wait_for(&session, Stage::Detection).await;
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    let _ = ctx.tracker.fail(&session, Stage::Segmentation, "pipeline shut down").await;
                    return;
                }
            };
            execute_segmentation(&ctx, &session).await;
        });

        Ok(SegmentationAccepted::started(session_id))
    }

    /// Detection status, falling back to the results document when the
    /// job is no longer tracked.
    pub async fn get_status(&self, session_id: &str) -> PipelineResult<StatusReport> {
        if let Some(job) = self.ctx.tracker.snapshot(session_id, Stage::Detection).await {
            return Ok(StatusReport::Live(job));
        }
        if self.ctx.store.results_exists(session_id).await? {
            return Ok(StatusReport::Recovered(RecoveredStatus::completed()));
        }
        Err(PipelineError::not_found(format!("status for session {}", session_id)))
    }

    /// Segmentation status, falling back to the masks directory when the
    /// job is no longer tracked.
    pub async fn get_segmentation_status(&self, session_id: &str) -> PipelineResult<StatusReport> {
        if let Some(job) = self.ctx.tracker.snapshot(session_id, Stage::Segmentation).await {
            return Ok(StatusReport::Live(job));
        }
        if self.ctx.store.masks_dir_exists(session_id).await? {
            return Ok(StatusReport::Recovered(RecoveredStatus::completed()));
        }
        Err(PipelineError::not_found(format!(
            "segmentation status for session {}",
            session_id
        )))
    }

    /// The persisted results document.
    pub async fn get_results(&self, session_id: &str) -> PipelineResult<ResultsDocument> {
        Ok(self.ctx.store.read_results(session_id).await?)
    }

    /// Source images in a session with their sizes.
    pub async fn list_files(&self, session_id: &str) -> PipelineResult<Vec<SessionFile>> {
        Ok(self.ctx.store.list_files(session_id).await?)
    }

    /// Mask artifacts written for a session, sorted.
    pub async fn list_masks(&self, session_id: &str) -> PipelineResult<Vec<String>> {
        if !self.ctx.store.session_exists(session_id).await? {
            return Err(PipelineError::SessionNotFound(session_id.to_string()));
        }
        Ok(self.ctx.store.list_masks(session_id).await?)
    }

    /// Bytes of one source image.
    pub async fn read_image(&self, session_id: &str, filename: &str) -> PipelineResult<Vec<u8>> {
        Ok(self.ctx.store.read_image(session_id, filename).await?)
    }

    /// PNG bytes of one mask artifact.
    pub async fn read_mask(&self, session_id: &str, mask_name: &str) -> PipelineResult<Vec<u8>> {
        Ok(self.ctx.store.read_mask(session_id, mask_name).await?)
    }

    /// Wait until neither stage is running for the session.
    pub async fn wait_until_idle(&self, session_id: &str) {
        self.ctx.tracker.wait_for(session_id, Stage::Detection).await;
        self.ctx.tracker.wait_for(session_id, Stage::Segmentation).await;
    }

    /// Probe both capabilities.
    pub async fn capabilities_ready(&self) -> Vec<CapabilityCheck> {
        let (detection, segmentation) = tokio::join!(
            self.ctx.detector.health_check(),
            self.ctx.segmenter.health_check()
        );
        vec![
            CapabilityCheck {
                role: "detection",
                name: self.ctx.detector.name(),
                error: detection.err().map(|e| e.to_string()),
            },
            CapabilityCheck {
                role: "segmentation",
                name: self.ctx.segmenter.name(),
                error: segmentation.err().map(|e| e.to_string()),
            },
        ]
    }
}

async fn execute_detection(ctx: Arc<StageContext>, job: JobState, images: Vec<String>) {
    let session_id = job.session_id.clone();
    let logger = SessionLogger::new(&session_id, Stage::Detection);
    let started = Instant::now();

    let result = run_detection(&ctx, &job, images, &logger)
        .instrument(logger.create_span())
        .await;

    let document = match result {
        Ok(document) => document,
        Err(e) => {
            logger.log_error(&e.to_string());
            metrics::record_stage_failed(Stage::Detection);
            if let Err(err) = ctx.tracker.fail(&session_id, Stage::Detection, &e.to_string()).await {
                logger.log_warning(&format!("could not mark job failed: {}", err));
            }
            return;
        }
    };

    // Register segmentation before detection is signalled complete, so a
    // poller never sees a gap between the two stages.
    let admission = ctx
        .tracker
        .begin(&session_id, Stage::Segmentation, 0, Reentry::KeepRunning)
        .await;

    let end_time = document.processing_info.end_time.unwrap_or_else(chrono::Utc::now);
    if let Err(e) = ctx.tracker.complete_at(&session_id, Stage::Detection, end_time).await {
        logger.log_warning(&format!("could not mark job completed: {}", e));
    }
    metrics::record_stage_completed(Stage::Detection, started.elapsed().as_secs_f64());
    logger.log_completion(&format!(
        "{} detections, {} failed images",
        document.detection_count(),
        document.failed_images.len()
    ));

    match admission {
        Admission::Started(_) => {
            metrics::record_stage_started(Stage::Segmentation);
            execute_segmentation(&ctx, &session_id).await;
        }
        Admission::Existing(_) => {
            logger.log_progress("segmentation already running for this session");
        }
    }
}

async fn execute_segmentation(ctx: &StageContext, session_id: &str) {
    let logger = SessionLogger::new(session_id, Stage::Segmentation);
    let started = Instant::now();

    let result = run_segmentation(ctx, session_id, &logger)
        .instrument(logger.create_span())
        .await;

    let outcome = match result {
        Ok(()) => ctx.tracker.complete_at(session_id, Stage::Segmentation, chrono::Utc::now()).await,
        Err(e) => {
            logger.log_error(&e.to_string());
            metrics::record_stage_failed(Stage::Segmentation);
            ctx.tracker.fail(session_id, Stage::Segmentation, &e.to_string()).await
        }
    };

    match outcome {
        Ok(job) if job.status == StageStatus::Completed => {
            metrics::record_stage_completed(Stage::Segmentation, started.elapsed().as_secs_f64());
            logger.log_completion(&format!(
                "{} masks, {} defects masked",
                job.processed_images.unwrap_or(0),
                job.total_defects_masked.unwrap_or(0)
            ));
        }
        Ok(_) => {}
        Err(e) => logger.log_warning(&format!("could not finish job: {}", e)),
    }
}

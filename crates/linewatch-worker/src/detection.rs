//! Detection stage.

use chrono::Utc;
use linewatch_models::{ImageOutcome, JobState, ResultsDocument, Stage};

use crate::error::{PipelineError, PipelineResult};
use crate::logging::SessionLogger;
use crate::metrics;
use crate::orchestrator::StageContext;

/// Run detection over `images` and persist the results document.
///
/// A failing image is recorded in `failed_images` and the batch moves on.
/// Only an unavailable detector or a failed persist aborts the stage.
pub(crate) async fn run_detection(
    ctx: &StageContext,
    job: &JobState,
    images: Vec<String>,
    logger: &SessionLogger,
) -> PipelineResult<ResultsDocument> {
    let session_id = job.session_id.as_str();

    ctx.detector.health_check().await.map_err(|e| {
        PipelineError::stage_fatal(format!("detector {} unavailable: {}", ctx.detector.name(), e))
    })?;

    logger.log_start(&format!(
        "{} images with {}",
        images.len(),
        ctx.detector.name()
    ));

    let mut document = ResultsDocument::new(session_id, job.total_units, job.start_time);

    for original in images {
        let server = ctx.renamer.rename(session_id, &original);
        let outcome = match ctx.store.image_path(session_id, &server) {
            Ok(path) => match ctx.detector.detect(&path).await {
                Ok(records) => ImageOutcome::Detected {
                    detections: ctx.config.confidence_threshold.filter(records),
                },
                Err(e) => ImageOutcome::Failed {
                    reason: e.to_string(),
                },
            },
            Err(e) => ImageOutcome::Failed {
                reason: e.to_string(),
            },
        };

        let failed = match &outcome {
            ImageOutcome::Failed { reason } => {
                logger.log_unit_failure(&original, reason);
                metrics::record_unit_failure(Stage::Detection);
                true
            }
            ImageOutcome::Detected { .. } => false,
        };
        document.record(&original, &server, outcome);

        let state = ctx
            .tracker
            .update(session_id, Stage::Detection, |job| {
                if failed {
                    job.record_failure()?;
                }
                job.advance()
            })
            .await?;
        metrics::record_image_processed(Stage::Detection);
        logger.log_progress(&format!(
            "{}/{} images",
            state.processed_units, state.total_units
        ));
    }

    document.finish(Utc::now());
    ctx.store
        .write_results(session_id, &document)
        .await
        .map_err(|e| PipelineError::stage_fatal(format!("failed to persist results: {}", e)))?;

    Ok(document)
}

//! Segmentation stage.

use std::path::PathBuf;

use linewatch_ml_client::SegmentMask;
use linewatch_models::{BoundingBox, Stage};

use crate::error::{PipelineError, PipelineResult};
use crate::logging::SessionLogger;
use crate::metrics;
use crate::orchestrator::StageContext;
use crate::overlay::write_overlay;

/// Segment every target box of the persisted results and write one
/// overlay per image that has at least one segmented box.
pub(crate) async fn run_segmentation(
    ctx: &StageContext,
    session_id: &str,
    logger: &SessionLogger,
) -> PipelineResult<()> {
    ctx.segmenter.health_check().await.map_err(|e| {
        PipelineError::stage_fatal(format!(
            "segmenter {} unavailable: {}",
            ctx.segmenter.name(),
            e
        ))
    })?;

    let document = ctx
        .store
        .read_results(session_id)
        .await
        .map_err(|e| PipelineError::stage_fatal(format!("failed to read results: {}", e)))?;

    let targets: Vec<(String, Vec<BoundingBox>)> = document
        .targets(&ctx.config.defect_classes)
        .map(|(filename, boxes)| (filename.to_string(), boxes))
        .collect();

    ctx.tracker
        .update(session_id, Stage::Segmentation, |job| {
            job.set_total(targets.len() as u32)
        })
        .await?;

    ctx.store
        .ensure_masks_dir(session_id)
        .await
        .map_err(|e| PipelineError::stage_fatal(format!("failed to create masks directory: {}", e)))?;

    let with_targets = targets.iter().filter(|(_, boxes)| !boxes.is_empty()).count();
    logger.log_start(&format!(
        "{} of {} images have target detections",
        with_targets,
        targets.len()
    ));

    for (filename, boxes) in targets {
        if boxes.is_empty() {
            ctx.tracker.advance(session_id, Stage::Segmentation).await?;
            continue;
        }

        let written = match ctx.store.image_path(session_id, &filename) {
            Ok(path) => segment_image(ctx, session_id, &filename, path, &boxes, logger).await,
            Err(e) => {
                logger.log_unit_failure(&filename, &e.to_string());
                None
            }
        };

        ctx.tracker
            .update(session_id, Stage::Segmentation, |job| {
                match written {
                    Some(boxes) => job.record_mask(boxes)?,
                    None => job.record_failure()?,
                }
                job.advance()
            })
            .await?;
        metrics::record_image_processed(Stage::Segmentation);
    }

    Ok(())
}

/// Segment one image's boxes and write the overlay.
///
/// The combined mask has the source image's dimensions; a box whose mask
/// does not match is skipped. Returns the number of boxes in the written
/// mask, or `None` when no mask was written.
async fn segment_image(
    ctx: &StageContext,
    session_id: &str,
    filename: &str,
    path: PathBuf,
    boxes: &[BoundingBox],
    logger: &SessionLogger,
) -> Option<u32> {
    let (width, height) = match source_dimensions(path.clone()).await {
        Ok(dimensions) => dimensions,
        Err(reason) => {
            logger.log_unit_failure(filename, &format!("unreadable image: {}", reason));
            return None;
        }
    };

    let mut combined = SegmentMask::empty(width, height);
    let mut segmented = 0u32;

    for bbox in boxes {
        let unit = format!("{} {}", filename, bbox);
        let result = ctx
            .segmenter
            .segment(&path, bbox)
            .await
            .and_then(|mask| combined.union_with(&mask));
        if let Err(e) = result {
            logger.log_unit_failure(&unit, &e.to_string());
            metrics::record_unit_failure(Stage::Segmentation);
            continue;
        }
        segmented += 1;
    }

    if segmented == 0 {
        logger.log_unit_failure(filename, "no box could be segmented");
        return None;
    }

    let mask_path = match ctx.store.mask_path(session_id, filename) {
        Ok(p) => p,
        Err(e) => {
            logger.log_unit_failure(filename, &e.to_string());
            return None;
        }
    };

    if let Err(e) = write_overlay(&combined, ctx.config.highlight_color, &mask_path).await {
        logger.log_unit_failure(filename, &e.to_string());
        return None;
    }

    metrics::record_mask_written(segmented);
    logger.log_progress(&format!(
        "wrote {} ({} boxes)",
        mask_path.display(),
        segmented
    ));
    Some(segmented)
}

/// Width and height from the image header, sniffing the format from content.
async fn source_dimensions(path: PathBuf) -> Result<(u32, u32), String> {
    tokio::task::spawn_blocking(move || {
        image::io::Reader::open(&path)
            .map_err(|e| e.to_string())?
            .with_guessed_format()
            .map_err(|e| e.to_string())?
            .into_dimensions()
            .map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| e.to_string())?
}

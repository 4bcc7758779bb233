//! Stage metrics.

use linewatch_models::Stage;
use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const STAGES_STARTED_TOTAL: &str = "linewatch_stages_started_total";
    pub const STAGES_COMPLETED_TOTAL: &str = "linewatch_stages_completed_total";
    pub const STAGES_FAILED_TOTAL: &str = "linewatch_stages_failed_total";
    pub const STAGE_DURATION_SECONDS: &str = "linewatch_stage_duration_seconds";
    pub const IMAGES_PROCESSED_TOTAL: &str = "linewatch_images_processed_total";
    pub const UNIT_FAILURES_TOTAL: &str = "linewatch_unit_failures_total";
    pub const MASKS_WRITTEN_TOTAL: &str = "linewatch_masks_written_total";
    pub const DEFECTS_MASKED_TOTAL: &str = "linewatch_defects_masked_total";
}

pub fn record_stage_started(stage: Stage) {
    counter!(names::STAGES_STARTED_TOTAL, "stage" => stage.as_str()).increment(1);
}

pub fn record_stage_completed(stage: Stage, duration_secs: f64) {
    counter!(names::STAGES_COMPLETED_TOTAL, "stage" => stage.as_str()).increment(1);
    histogram!(names::STAGE_DURATION_SECONDS, "stage" => stage.as_str()).record(duration_secs);
}

pub fn record_stage_failed(stage: Stage) {
    counter!(names::STAGES_FAILED_TOTAL, "stage" => stage.as_str()).increment(1);
}

pub fn record_image_processed(stage: Stage) {
    counter!(names::IMAGES_PROCESSED_TOTAL, "stage" => stage.as_str()).increment(1);
}

/// A skipped image (detection) or box (segmentation).
pub fn record_unit_failure(stage: Stage) {
    counter!(names::UNIT_FAILURES_TOTAL, "stage" => stage.as_str()).increment(1);
}

pub fn record_mask_written(boxes: u32) {
    counter!(names::MASKS_WRITTEN_TOTAL).increment(1);
    counter!(names::DEFECTS_MASKED_TOTAL).increment(u64::from(boxes));
}

//! Per-session, per-stage job state.
//!
//! Detection and segmentation are tracked independently. A job only ever
//! moves forward: `processing -> completed` or `processing -> error`, and
//! `end_time` is set exactly when the status becomes terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipeline stage a job belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Detection,
    Segmentation,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Detection => "detection",
            Stage::Segmentation => "segmentation",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stage processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage is running
    #[default]
    Processing,
    /// Stage finished; per-unit failures may still have occurred
    Completed,
    /// Stage aborted on a fatal error
    Error,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Processing => "processing",
            StageStatus::Completed => "completed",
            StageStatus::Error => "error",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, StageStatus::Completed | StageStatus::Error)
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rejected job state mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobStateError {
    #[error("job is already {0}")]
    AlreadyTerminal(StageStatus),

    #[error("progress would exceed total of {total} units")]
    ProgressOverflow { total: u32 },

    #[error("total of {total} units is below {processed} already processed")]
    TotalBelowProcessed { total: u32, processed: u32 },
}

/// Snapshot of one stage of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobState {
    pub session_id: String,
    pub stage: Stage,
    pub status: StageStatus,
    /// Images expected in this run
    pub total_units: u32,
    /// Images handled so far, successful or not
    pub processed_units: u32,
    /// Images whose processing failed and was skipped
    #[serde(default)]
    pub failed_units: u32,
    /// Segmentation only: images that received a mask file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_images: Option<u32>,
    /// Segmentation only: boxes successfully segmented across all images
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_defects_masked: Option<u32>,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl JobState {
    /// Start a detection job over `total_units` images.
    pub fn detection(session_id: impl Into<String>, total_units: u32) -> Self {
        Self::new(session_id, Stage::Detection, total_units)
    }

    /// Start a segmentation job. The total is known once the results
    /// document has been read.
    pub fn segmentation(session_id: impl Into<String>, total_units: u32) -> Self {
        let mut state = Self::new(session_id, Stage::Segmentation, total_units);
        state.processed_images = Some(0);
        state.total_defects_masked = Some(0);
        state
    }

    fn new(session_id: impl Into<String>, stage: Stage, total_units: u32) -> Self {
        Self {
            session_id: session_id.into(),
            stage,
            status: StageStatus::Processing,
            total_units,
            processed_units: 0,
            failed_units: 0,
            processed_images: None,
            total_defects_masked: None,
            start_time: Utc::now(),
            end_time: None,
            error_message: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn ensure_processing(&self) -> Result<(), JobStateError> {
        if self.is_terminal() {
            return Err(JobStateError::AlreadyTerminal(self.status));
        }
        Ok(())
    }

    /// Count one more unit as handled.
    pub fn advance(&mut self) -> Result<(), JobStateError> {
        self.ensure_processing()?;
        if self.processed_units >= self.total_units {
            return Err(JobStateError::ProgressOverflow {
                total: self.total_units,
            });
        }
        self.processed_units += 1;
        Ok(())
    }

    /// Note a skipped unit. Does not advance progress on its own.
    pub fn record_failure(&mut self) -> Result<(), JobStateError> {
        self.ensure_processing()?;
        self.failed_units += 1;
        Ok(())
    }

    /// Record a written mask and the boxes it combines.
    pub fn record_mask(&mut self, boxes: u32) -> Result<(), JobStateError> {
        self.ensure_processing()?;
        self.processed_images = Some(self.processed_images.unwrap_or(0) + 1);
        self.total_defects_masked = Some(self.total_defects_masked.unwrap_or(0) + boxes);
        Ok(())
    }

    pub fn set_total(&mut self, total_units: u32) -> Result<(), JobStateError> {
        self.ensure_processing()?;
        if total_units < self.processed_units {
            return Err(JobStateError::TotalBelowProcessed {
                total: total_units,
                processed: self.processed_units,
            });
        }
        self.total_units = total_units;
        Ok(())
    }

    /// Mark the job completed at `end_time`.
    pub fn complete_at(&mut self, end_time: DateTime<Utc>) -> Result<(), JobStateError> {
        self.ensure_processing()?;
        self.status = StageStatus::Completed;
        self.end_time = Some(end_time);
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), JobStateError> {
        self.complete_at(Utc::now())
    }

    /// Mark the job failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), JobStateError> {
        self.ensure_processing()?;
        self.status = StageStatus::Error;
        self.error_message = Some(error.into());
        self.end_time = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_job_creation() {
        let job = JobState::detection("s1", 3);
        assert_eq!(job.status, StageStatus::Processing);
        assert_eq!(job.processed_units, 0);
        assert!(job.end_time.is_none());
        assert!(job.total_defects_masked.is_none());
        assert!(!job.is_terminal());
    }

    #[test]
    fn test_progress_never_exceeds_total() {
        let mut job = JobState::detection("s1", 2);
        job.advance().unwrap();
        job.advance().unwrap();
        assert_eq!(
            job.advance(),
            Err(JobStateError::ProgressOverflow { total: 2 })
        );
        assert_eq!(job.processed_units, 2);
    }

    #[test]
    fn test_transitions_are_forward_only() {
        let mut job = JobState::detection("s1", 1);
        job.advance().unwrap();
        job.complete().unwrap();
        assert_eq!(job.status, StageStatus::Completed);
        assert!(job.end_time.is_some());

        assert_eq!(
            job.fail("late"),
            Err(JobStateError::AlreadyTerminal(StageStatus::Completed))
        );
        assert!(job.complete().is_err());
        assert_eq!(job.status, StageStatus::Completed);
        assert!(job.error_message.is_none());
    }

    #[test]
    fn test_fail_sets_end_time_and_message() {
        let mut job = JobState::segmentation("s1", 0);
        job.fail("segmenter unavailable").unwrap();
        assert_eq!(job.status, StageStatus::Error);
        assert!(job.end_time.is_some());
        assert_eq!(job.error_message.as_deref(), Some("segmenter unavailable"));
        assert!(job.advance().is_err());
    }

    #[test]
    fn test_segmentation_counters() {
        let mut job = JobState::segmentation("s1", 0);
        job.set_total(3).unwrap();
        job.record_mask(2).unwrap();
        job.advance().unwrap();
        job.advance().unwrap();
        assert_eq!(job.processed_images, Some(1));
        assert_eq!(job.total_defects_masked, Some(2));
        assert!(matches!(
            job.set_total(1),
            Err(JobStateError::TotalBelowProcessed { .. })
        ));
    }

    #[test]
    fn test_serialized_shape() {
        let job = JobState::detection("s1", 5);
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["status"], "processing");
        assert_eq!(value["stage"], "detection");
        assert_eq!(value["total_units"], 5);
        assert!(value.get("end_time").is_none());
        assert!(value.get("total_defects_masked").is_none());
    }
}

//! Shared data models for the Linewatch inspection pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Detection records, bounding boxes and class filtering
//! - Per-session, per-stage job state
//! - The persisted results document
//! - HTTP response payloads

pub mod api;
pub mod detection;
pub mod job_state;
pub mod results;

// Re-export common types
pub use api::{DetectionAccepted, RecoveredStatus, SegmentationAccepted, SessionFile, StatusReport};
pub use detection::{
    BoundingBox, ConfidenceThreshold, DefectClasses, DetectionRecord, DEFAULT_CONFIDENCE_THRESHOLD,
    DEFAULT_DEFECT_CLASSES,
};
pub use job_state::{JobState, JobStateError, Stage, StageStatus};
pub use results::{ImageOutcome, ProcessingInfo, ResultsDocument};

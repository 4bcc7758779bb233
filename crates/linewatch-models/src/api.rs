//! Response payloads for the HTTP surface.

use serde::{Deserialize, Serialize};

use crate::job_state::{JobState, StageStatus};

/// Acknowledgement for a detection trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionAccepted {
    pub session_id: String,
    pub total_images: u32,
    pub accepted: bool,
    pub message: String,
}

impl DetectionAccepted {
    pub fn new(session_id: impl Into<String>, total_images: u32) -> Self {
        Self {
            session_id: session_id.into(),
            total_images,
            accepted: true,
            message: format!("Started processing {} images", total_images),
        }
    }
}

/// Acknowledgement for a segmentation trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationAccepted {
    pub session_id: String,
    pub accepted: bool,
    pub message: String,
}

impl SegmentationAccepted {
    pub fn started(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            accepted: true,
            message: "Started segmentation".to_string(),
        }
    }

    /// An existing job for the session was reused instead of starting another.
    pub fn reused(session_id: impl Into<String>, existing: StageStatus) -> Self {
        Self {
            session_id: session_id.into(),
            accepted: false,
            message: format!("Segmentation already {}", existing),
        }
    }
}

/// Degraded status synthesized from artifacts on disk when no in-memory
/// job state survives (e.g. after a restart).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveredStatus {
    pub status: StageStatus,
    pub processed: String,
    pub total: String,
    pub recovered: bool,
}

impl RecoveredStatus {
    pub fn completed() -> Self {
        Self {
            status: StageStatus::Completed,
            processed: "unknown".to_string(),
            total: "unknown".to_string(),
            recovered: true,
        }
    }
}

/// Status response: the live job state, or the degraded fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusReport {
    Live(JobState),
    Recovered(RecoveredStatus),
}

impl StatusReport {
    pub fn status(&self) -> StageStatus {
        match self {
            StatusReport::Live(state) => state.status,
            StatusReport::Recovered(recovered) => recovered.status,
        }
    }
}

/// A source image in a session directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFile {
    pub name: String,
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovered_status_shape() {
        let report = StatusReport::Recovered(RecoveredStatus::completed());
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["status"], "completed");
        assert_eq!(value["processed"], "unknown");
        assert_eq!(value["total"], "unknown");
        assert_eq!(report.status(), StageStatus::Completed);
    }

    #[test]
    fn test_live_status_is_flat_job_state() {
        let report = StatusReport::Live(JobState::detection("s1", 4));
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["session_id"], "s1");
        assert_eq!(value["total_units"], 4);
        assert_eq!(report.status(), StageStatus::Processing);
    }

    #[test]
    fn test_detection_accepted_message() {
        let ack = DetectionAccepted::new("s1", 3);
        assert!(ack.accepted);
        assert_eq!(ack.message, "Started processing 3 images");
    }
}

//! The per-session results document persisted as `results.json`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detection::{BoundingBox, DefectClasses, DetectionRecord};
use crate::job_state::StageStatus;

/// Outcome of running detection on one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ImageOutcome {
    /// Detections that passed the confidence threshold
    Detected { detections: Vec<DetectionRecord> },
    /// The image could not be processed and was skipped
    Failed { reason: String },
}

/// Batch-level bookkeeping stored alongside the detections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingInfo {
    pub session_id: String,
    pub total_images: u32,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub status: StageStatus,
}

/// Cumulative detection results for one session.
///
/// Written only by the detection stage. Once `processing_info.status` is
/// `completed` the document is never modified again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsDocument {
    /// Original upload filename -> filename on disk
    pub image_mapping: BTreeMap<String, String>,
    /// Filename on disk -> recorded detections
    pub detections: BTreeMap<String, Vec<DetectionRecord>>,
    /// Filename on disk -> reason the image was skipped
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failed_images: BTreeMap<String, String>,
    pub processing_info: ProcessingInfo,
}

impl ResultsDocument {
    pub fn new(session_id: impl Into<String>, total_images: u32, start_time: DateTime<Utc>) -> Self {
        Self {
            image_mapping: BTreeMap::new(),
            detections: BTreeMap::new(),
            failed_images: BTreeMap::new(),
            processing_info: ProcessingInfo {
                session_id: session_id.into(),
                total_images,
                start_time,
                end_time: None,
                status: StageStatus::Processing,
            },
        }
    }

    /// Record the outcome for one image.
    ///
    /// Failed images get an error note and no detections entry.
    pub fn record(&mut self, original: &str, server: &str, outcome: ImageOutcome) {
        match outcome {
            ImageOutcome::Detected { detections } => {
                self.image_mapping
                    .insert(original.to_string(), server.to_string());
                self.failed_images.remove(server);
                self.detections.insert(server.to_string(), detections);
            }
            ImageOutcome::Failed { reason } => {
                self.detections.remove(server);
                self.failed_images.insert(server.to_string(), reason);
            }
        }
    }

    pub fn finish(&mut self, end_time: DateTime<Utc>) {
        self.processing_info.status = StageStatus::Completed;
        self.processing_info.end_time = Some(end_time);
    }

    pub fn is_completed(&self) -> bool {
        self.processing_info.status == StageStatus::Completed
    }

    pub fn detection_count(&self) -> usize {
        self.detections.values().map(Vec::len).sum()
    }

    /// Boxes of target defect classes, per image. Images without any
    /// target detections yield an empty list.
    pub fn targets<'a>(
        &'a self,
        classes: &'a DefectClasses,
    ) -> impl Iterator<Item = (&'a str, Vec<BoundingBox>)> + 'a {
        self.detections.iter().map(move |(filename, records)| {
            let boxes = records
                .iter()
                .filter(|r| classes.is_target(r))
                .map(|r| r.bbox)
                .collect();
            (filename.as_str(), boxes)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResultsDocument {
        let start = DateTime::parse_from_rfc3339("2025-03-01T10:00:00.123456Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut doc = ResultsDocument::new("s1", 3, start);
        doc.record(
            "a.jpg",
            "a.jpg",
            ImageOutcome::Detected {
                detections: vec![
                    DetectionRecord::new("nest", 0.91, BoundingBox::new(1.5, 2.0, 30.25, 40.0)),
                    DetectionRecord::new("traverse", 0.6, BoundingBox::new(0.0, 0.0, 5.0, 5.0)),
                ],
            },
        );
        doc.record("b.jpg", "b.jpg", ImageOutcome::Detected { detections: vec![] });
        doc.record(
            "c.jpg",
            "c.jpg",
            ImageOutcome::Failed {
                reason: "decode error".into(),
            },
        );
        doc.finish(start + chrono::Duration::seconds(4));
        doc
    }

    #[test]
    fn test_failed_image_absent_from_detections() {
        let doc = sample();
        assert!(!doc.detections.contains_key("c.jpg"));
        assert!(!doc.image_mapping.contains_key("c.jpg"));
        assert_eq!(doc.failed_images.get("c.jpg").map(String::as_str), Some("decode error"));
        assert_eq!(doc.detection_count(), 2);
    }

    #[test]
    fn test_round_trip_is_lossless() {
        let doc = sample();
        let json = serde_json::to_string_pretty(&doc).unwrap();
        let parsed: ResultsDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, doc);
        assert_eq!(serde_json::to_string_pretty(&parsed).unwrap(), json);
    }

    #[test]
    fn test_finish_marks_completed() {
        let doc = sample();
        assert!(doc.is_completed());
        assert!(doc.processing_info.end_time.is_some());
    }

    #[test]
    fn test_targets_filter_by_class_name() {
        let doc = sample();
        let classes = DefectClasses::default();
        let targets: Vec<_> = doc.targets(&classes).collect();

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].0, "a.jpg");
        assert_eq!(targets[0].1, vec![BoundingBox::new(1.5, 2.0, 30.25, 40.0)]);
        assert_eq!(targets[1].0, "b.jpg");
        assert!(targets[1].1.is_empty());
    }

    #[test]
    fn test_empty_failures_not_serialized() {
        let doc = ResultsDocument::new("s1", 0, Utc::now());
        let value = serde_json::to_value(&doc).unwrap();
        assert!(value.get("failed_images").is_none());
        assert_eq!(value["processing_info"]["status"], "processing");
    }
}

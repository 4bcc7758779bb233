//! Inference service request/response types.

use linewatch_models::{BoundingBox, DetectionRecord};
use serde::{Deserialize, Serialize};

/// Request to run detection on an image the service can read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectRequest {
    pub image_path: String,
}

/// Detection response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectResponse {
    #[serde(default)]
    pub detections: Vec<DetectionRecord>,
}

/// Request to segment one box of an image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentRequest {
    pub image_path: String,
    pub bbox: BoundingBox,
}

/// Segmentation response carrying a base64-encoded PNG mask.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentResponse {
    pub width: u32,
    pub height: u32,
    pub mask_png: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub model_loaded: Option<bool>,
}

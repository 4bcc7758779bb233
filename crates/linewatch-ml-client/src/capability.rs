//! Capability traits consumed by the pipeline.

use std::path::Path;

use async_trait::async_trait;
use linewatch_models::{BoundingBox, DetectionRecord};

use crate::error::MlResult;
use crate::mask::SegmentMask;

/// Object detection over a single image.
#[async_trait]
pub trait DetectionCapability: Send + Sync {
    /// Detect objects in the image at `image`.
    ///
    /// Implementations may already drop low-confidence results; the
    /// pipeline applies its own threshold regardless.
    async fn detect(&self, image: &Path) -> MlResult<Vec<DetectionRecord>>;

    /// Verify the capability can serve requests.
    async fn health_check(&self) -> MlResult<()> {
        Ok(())
    }

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

/// Instance segmentation of one region of an image.
#[async_trait]
pub trait SegmentationCapability: Send + Sync {
    /// Segment the object inside `bbox`. The returned mask covers the
    /// whole image.
    async fn segment(&self, image: &Path, bbox: &BoundingBox) -> MlResult<SegmentMask>;

    /// Verify the capability can serve requests.
    async fn health_check(&self) -> MlResult<()> {
        Ok(())
    }

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

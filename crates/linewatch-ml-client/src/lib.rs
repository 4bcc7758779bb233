//! Detection and segmentation capabilities.
//!
//! The object-detection and segmentation models run in an external
//! inference service. This crate defines the capability traits the
//! pipeline depends on, the binary mask type exchanged with the
//! segmenter, and an HTTP client implementing both traits.

pub mod capability;
pub mod client;
pub mod error;
pub mod mask;
pub mod types;

pub use capability::{DetectionCapability, SegmentationCapability};
pub use client::{InferenceClient, InferenceClientConfig};
pub use error::{MlError, MlResult};
pub use mask::SegmentMask;

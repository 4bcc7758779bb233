//! Power-line inspection pipeline.
//!
//! This crate provides:
//! - Job tracker with per-session, per-stage state and completion signals
//! - Detection stage over a session's source images
//! - Segmentation stage chained off detection, writing overlay masks
//! - Pipeline orchestrator and read accessors for the HTTP layer

pub mod config;
mod detection;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod overlay;
pub mod renamer;
mod segmentation;
pub mod tracker;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use logging::SessionLogger;
pub use orchestrator::{CapabilityCheck, Pipeline};
pub use renamer::{FilenameRenamer, IdentityRenamer};
pub use tracker::{Admission, JobTracker, Reentry};

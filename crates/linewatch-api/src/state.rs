//! Application state.

use std::sync::Arc;

use linewatch_ml_client::{DetectionCapability, InferenceClient};
use linewatch_storage::SessionStore;
use linewatch_worker::{Pipeline, PipelineConfig};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pipeline: Pipeline,
}

impl AppState {
    /// Create state backed by the inference service.
    pub fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let store = SessionStore::from_env();
        let inference = Arc::new(InferenceClient::from_env()?);
        let pipeline = Pipeline::new(
            store,
            Arc::clone(&inference) as Arc<dyn DetectionCapability>,
            inference,
            PipelineConfig::from_env(),
        );
        Ok(Self::with_pipeline(config, pipeline))
    }

    pub fn with_pipeline(config: ApiConfig, pipeline: Pipeline) -> Self {
        Self { config, pipeline }
    }
}

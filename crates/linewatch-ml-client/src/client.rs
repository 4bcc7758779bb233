//! Inference service HTTP client.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use linewatch_models::{BoundingBox, DetectionRecord};

use crate::capability::{DetectionCapability, SegmentationCapability};
use crate::error::{MlError, MlResult};
use crate::mask::SegmentMask;
use crate::types::{DetectRequest, DetectResponse, HealthResponse, SegmentRequest, SegmentResponse};

const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Configuration for the inference client.
#[derive(Debug, Clone)]
pub struct InferenceClientConfig {
    /// Base URL of the inference service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries
    pub max_retries: u32,
}

impl Default for InferenceClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5001".to_string(),
            timeout: Duration::from_secs(120),
            max_retries: 2,
        }
    }
}

impl InferenceClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("INFERENCE_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:5001".to_string()),
            timeout: Duration::from_secs(
                std::env::var("INFERENCE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
            max_retries: std::env::var("INFERENCE_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
        }
    }
}

/// Client for the external detection/segmentation service.
pub struct InferenceClient {
    http: Client,
    config: InferenceClientConfig,
}

impl InferenceClient {
    /// Create a new inference client.
    pub fn new(config: InferenceClientConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> MlResult<Self> {
        Self::new(InferenceClientConfig::from_env())
    }

    pub fn config(&self) -> &InferenceClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn check_health(&self) -> MlResult<()> {
        let url = self.url("health");
        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(MlError::ServiceUnavailable(format!(
                "health check returned {}",
                response.status()
            )));
        }

        let health: HealthResponse = response.json().await?;
        let healthy = health.status == "healthy" || health.status == "ok";
        if !healthy || health.model_loaded == Some(false) {
            return Err(MlError::ServiceUnavailable(format!(
                "service reports status {}",
                health.status
            )));
        }
        Ok(())
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> MlResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        debug!("Sending inference request to {}", url);

        let response = self
            .with_retry(|| async {
                let response = self.http.post(&url).json(body).send().await?;
                check_status(response).await
            })
            .await?;

        Ok(response.json().await?)
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> MlResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = MlResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = backoff_delay(attempt);
                    warn!(
                        "Inference request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Exponential backoff from 250ms, capped at `MAX_BACKOFF`.
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(250u64.saturating_mul(2u64.saturating_pow(attempt))).min(MAX_BACKOFF)
}

async fn check_status(response: Response) -> MlResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        Err(MlError::ServiceUnavailable(format!("{}: {}", status, body)))
    } else {
        Err(MlError::RequestFailed(format!("{}: {}", status, body)))
    }
}

fn path_string(path: &Path) -> MlResult<String> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| MlError::RequestFailed(format!("non UTF-8 image path {:?}", path)))
}

#[async_trait]
impl DetectionCapability for InferenceClient {
    async fn detect(&self, image: &Path) -> MlResult<Vec<DetectionRecord>> {
        let request = DetectRequest {
            image_path: path_string(image)?,
        };
        let response: DetectResponse = self.post_json("detect", &request).await?;
        Ok(response.detections)
    }

    async fn health_check(&self) -> MlResult<()> {
        self.check_health().await
    }

    fn name(&self) -> &'static str {
        "inference-service"
    }
}

#[async_trait]
impl SegmentationCapability for InferenceClient {
    async fn segment(&self, image: &Path, bbox: &BoundingBox) -> MlResult<SegmentMask> {
        let request = SegmentRequest {
            image_path: path_string(image)?,
            bbox: *bbox,
        };
        let response: SegmentResponse = self.post_json("segment", &request).await?;

        let bytes = STANDARD
            .decode(response.mask_png.as_bytes())
            .map_err(|e| MlError::InvalidResponse(format!("mask is not base64: {}", e)))?;
        let mask = SegmentMask::from_png_bytes(&bytes)?;

        if mask.dimensions() != (response.width, response.height) {
            return Err(MlError::MaskMismatch {
                expected: (response.width, response.height),
                actual: mask.dimensions(),
            });
        }
        Ok(mask)
    }

    async fn health_check(&self) -> MlResult<()> {
        self.check_health().await
    }

    fn name(&self) -> &'static str {
        "inference-service"
    }
}

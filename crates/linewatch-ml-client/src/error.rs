//! ML client error types.

use thiserror::Error;

pub type MlResult<T> = Result<T, MlError>;

#[derive(Debug, Error)]
pub enum MlError {
    #[error("Inference service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Mask dimensions {actual:?} do not match {expected:?}")]
    MaskMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl MlError {
    pub fn is_retryable(&self) -> bool {
        match self {
            MlError::ServiceUnavailable(_) => true,
            MlError::Network(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

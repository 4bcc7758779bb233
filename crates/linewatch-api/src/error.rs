//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use linewatch_worker::PipelineError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::SessionNotFound(_)
            | PipelineError::NotFound(_)
            | PipelineError::PrerequisiteMissing(_) => Self::NotFound(err.to_string()),
            PipelineError::NoInput(_)
            | PipelineError::InvalidSession(_)
            | PipelineError::InvalidFileName(_) => Self::BadRequest(err.to_string()),
            PipelineError::AlreadyRunning { .. } | PipelineError::AlreadyCompleted { .. } => {
                Self::Conflict(err.to_string())
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

/// `{detail}` body with the given status.
pub(crate) fn error_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { detail: detail.into() })).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let ApiError::Internal(_) = &self {
            error!(error = %self, "Request failed");
        }
        error_response(status, self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linewatch_models::Stage;

    #[test]
    fn test_pipeline_error_mapping() {
        let cases = [
            (PipelineError::SessionNotFound("s".into()), StatusCode::NOT_FOUND),
            (PipelineError::PrerequisiteMissing("s".into()), StatusCode::NOT_FOUND),
            (PipelineError::NoInput("s".into()), StatusCode::BAD_REQUEST),
            (PipelineError::InvalidSession("..".into()), StatusCode::BAD_REQUEST),
            (
                PipelineError::AlreadyCompleted {
                    session_id: "s".into(),
                    stage: Stage::Detection,
                },
                StatusCode::CONFLICT,
            ),
            (PipelineError::stage_fatal("disk"), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }
}

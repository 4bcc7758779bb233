//! Pipeline error types.

use linewatch_models::{JobStateError, Stage};
use linewatch_storage::StorageError;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No supported images in session {0}")]
    NoInput(String),

    #[error("Prerequisite missing: {0}")]
    PrerequisiteMissing(String),

    #[error("Invalid session id: {0:?}")]
    InvalidSession(String),

    #[error("Invalid file name: {0:?}")]
    InvalidFileName(String),

    #[error("{stage} already running for session {session_id}")]
    AlreadyRunning { session_id: String, stage: Stage },

    #[error("{stage} already completed for session {session_id}")]
    AlreadyCompleted { session_id: String, stage: Stage },

    #[error("Stage failed: {0}")]
    StageFatal(String),

    #[error("Job state error: {0}")]
    JobState(#[from] JobStateError),

    #[error("Storage error: {0}")]
    Storage(StorageError),

    #[error("Inference error: {0}")]
    Ml(#[from] linewatch_ml_client::MlError),
}

impl From<StorageError> for PipelineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::SessionNotFound(id) => Self::SessionNotFound(id),
            StorageError::InvalidSessionId(id) => Self::InvalidSession(id),
            StorageError::InvalidFileName(name) => Self::InvalidFileName(name),
            StorageError::NotFound(what) => Self::NotFound(what),
            other => Self::Storage(other),
        }
    }
}

impl PipelineError {
    pub fn stage_fatal(msg: impl Into<String>) -> Self {
        Self::StageFatal(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Whether the caller asked for something that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PipelineError::SessionNotFound(_)
                | PipelineError::NotFound(_)
                | PipelineError::PrerequisiteMissing(_)
        )
    }

    /// Whether the request conflicts with a job already tracked.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            PipelineError::AlreadyRunning { .. } | PipelineError::AlreadyCompleted { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_errors_map_to_caller_errors() {
        let err: PipelineError = StorageError::SessionNotFound("s9".into()).into();
        assert!(matches!(err, PipelineError::SessionNotFound(ref id) if id == "s9"));
        assert!(err.is_not_found());

        let err: PipelineError = StorageError::InvalidSessionId("..".into()).into();
        assert!(matches!(err, PipelineError::InvalidSession(_)));
        assert!(!err.is_not_found());

        let err: PipelineError = StorageError::write_failed("disk full").into();
        assert!(matches!(err, PipelineError::Storage(_)));
    }

    #[test]
    fn test_conflicts() {
        let err = PipelineError::AlreadyRunning {
            session_id: "s1".into(),
            stage: Stage::Detection,
        };
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "detection already running for session s1");
    }
}

//! Structured session logging.

use linewatch_models::Stage;
use tracing::{error, info, warn, Span};

/// Logger carrying the session and stage on every event.
#[derive(Debug, Clone)]
pub struct SessionLogger {
    session_id: String,
    stage: Stage,
}

impl SessionLogger {
    pub fn new(session_id: &str, stage: Stage) -> Self {
        Self {
            session_id: session_id.to_string(),
            stage,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            session_id = %self.session_id,
            stage = %self.stage,
            "Stage started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            session_id = %self.session_id,
            stage = %self.stage,
            "Stage progress: {}", message
        );
    }

    /// Log a skipped image or box.
    pub fn log_unit_failure(&self, unit: &str, reason: &str) {
        warn!(
            session_id = %self.session_id,
            stage = %self.stage,
            unit,
            "Skipped unit: {}", reason
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            session_id = %self.session_id,
            stage = %self.stage,
            "Stage warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            session_id = %self.session_id,
            stage = %self.stage,
            "Stage error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            session_id = %self.session_id,
            stage = %self.stage,
            "Stage completed: {}", message
        );
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Span to instrument a stage run with.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "stage",
            session_id = %self.session_id,
            stage = %self.stage
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_logger_fields() {
        let logger = SessionLogger::new("s1", Stage::Segmentation);
        assert_eq!(logger.session_id(), "s1");
        assert_eq!(logger.stage(), Stage::Segmentation);
    }
}

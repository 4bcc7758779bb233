//! In-memory job tracker.
//!
//! One [`JobState`] per session and stage, each paired with a `watch`
//! channel that flips to `true` once the job reaches a terminal status.
//! State is lost on restart; callers fall back to on-disk artifacts.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use linewatch_models::{JobState, JobStateError, Stage, StageStatus};
use tokio::sync::{watch, RwLock};

use crate::error::{PipelineError, PipelineResult};

/// What to do when `begin` finds a job already tracked for the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reentry {
    /// Keep a processing or completed job; replace only a failed one.
    KeepSettled,
    /// Keep a processing job; replace a completed or failed one.
    KeepRunning,
}

/// Result of [`JobTracker::begin`].
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// A fresh job was registered.
    Started(JobState),
    /// An existing job was kept; nothing was registered.
    Existing(JobState),
}

struct TrackedJob {
    state: JobState,
    done: watch::Sender<bool>,
}

impl TrackedJob {
    fn new(state: JobState) -> Self {
        let (done, _) = watch::channel(false);
        Self { state, done }
    }
}

#[derive(Default)]
struct SessionJobs {
    detection: Option<TrackedJob>,
    segmentation: Option<TrackedJob>,
}

impl SessionJobs {
    fn slot(&mut self, stage: Stage) -> &mut Option<TrackedJob> {
        match stage {
            Stage::Detection => &mut self.detection,
            Stage::Segmentation => &mut self.segmentation,
        }
    }

    fn get(&self, stage: Stage) -> Option<&TrackedJob> {
        match stage {
            Stage::Detection => self.detection.as_ref(),
            Stage::Segmentation => self.segmentation.as_ref(),
        }
    }
}

/// Session-keyed job state shared by the orchestrator and the read API.
#[derive(Default)]
pub struct JobTracker {
    sessions: RwLock<HashMap<String, SessionJobs>>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job unless one is already tracked for the session
    /// and stage.
    ///
    /// Check and insert happen under one write lock, so two concurrent
    /// callers can never both get [`Admission::Started`].
    pub async fn begin(
        &self,
        session_id: &str,
        stage: Stage,
        total_units: u32,
        reentry: Reentry,
    ) -> Admission {
        let mut sessions = self.sessions.write().await;
        let slot = sessions.entry(session_id.to_string()).or_default().slot(stage);

        if let Some(existing) = slot.as_ref() {
            let keep = match (existing.state.status, reentry) {
                (StageStatus::Processing, _) => true,
                (StageStatus::Completed, Reentry::KeepSettled) => true,
                _ => false,
            };
            if keep {
                return Admission::Existing(existing.state.clone());
            }
        }

        let state = match stage {
            Stage::Detection => JobState::detection(session_id, total_units),
            Stage::Segmentation => JobState::segmentation(session_id, total_units),
        };
        // Replacing drops the old sender, which releases its waiters.
        *slot = Some(TrackedJob::new(state.clone()));
        Admission::Started(state)
    }

    /// Apply a transition to a tracked job and return the new snapshot.
    pub async fn update<F>(&self, session_id: &str, stage: Stage, f: F) -> PipelineResult<JobState>
    where
        F: FnOnce(&mut JobState) -> Result<(), JobStateError>,
    {
        let mut sessions = self.sessions.write().await;
        let job = sessions
            .get_mut(session_id)
            .and_then(|jobs| jobs.slot(stage).as_mut())
            .ok_or_else(|| PipelineError::not_found(format!("{} job for session {}", stage, session_id)))?;

        f(&mut job.state)?;
        if job.state.is_terminal() {
            job.done.send_replace(true);
        }
        Ok(job.state.clone())
    }

    pub async fn advance(&self, session_id: &str, stage: Stage) -> PipelineResult<JobState> {
        self.update(session_id, stage, JobState::advance).await
    }

    pub async fn complete_at(
        &self,
        session_id: &str,
        stage: Stage,
        end_time: DateTime<Utc>,
    ) -> PipelineResult<JobState> {
        self.update(session_id, stage, |job| job.complete_at(end_time)).await
    }

    pub async fn fail(&self, session_id: &str, stage: Stage, message: &str) -> PipelineResult<JobState> {
        self.update(session_id, stage, |job| job.fail(message)).await
    }

    /// Current state of a job, if tracked.
    pub async fn snapshot(&self, session_id: &str, stage: Stage) -> Option<JobState> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .and_then(|jobs| jobs.get(stage))
            .map(|job| job.state.clone())
    }

    /// Wait until the job for the stage is terminal.
    ///
    /// Returns immediately when the stage is untracked. A job replaced
    /// while waiting also releases the waiter.
    pub async fn wait_for(&self, session_id: &str, stage: Stage) {
        let mut rx = {
            let sessions = self.sessions.read().await;
            match sessions.get(session_id).and_then(|jobs| jobs.get(stage)) {
                Some(job) => job.done.subscribe(),
                None => return,
            }
        };
        let _ = rx.wait_for(|done| *done).await;
    }

    #[cfg(test)]
    async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_begin_is_exclusive_per_stage() {
        let tracker = JobTracker::new();
        let first = tracker.begin("s1", Stage::Detection, 3, Reentry::KeepSettled).await;
        let second = tracker.begin("s1", Stage::Detection, 3, Reentry::KeepSettled).await;

        assert!(matches!(first, Admission::Started(_)));
        assert!(matches!(second, Admission::Existing(ref s) if s.status == StageStatus::Processing));

        // Stages are independent.
        let seg = tracker.begin("s1", Stage::Segmentation, 0, Reentry::KeepSettled).await;
        assert!(matches!(seg, Admission::Started(_)));
    }

    #[tokio::test]
    async fn test_concurrent_begin_admits_one() {
        let tracker = Arc::new(JobTracker::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let tracker = Arc::clone(&tracker);
            handles.push(tokio::spawn(async move {
                tracker.begin("s1", Stage::Detection, 5, Reentry::KeepSettled).await
            }));
        }

        let mut started = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), Admission::Started(_)) {
                started += 1;
            }
        }
        assert_eq!(started, 1);
        assert_eq!(tracker.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_reentry_after_terminal() {
        let tracker = JobTracker::new();
        tracker.begin("s1", Stage::Segmentation, 1, Reentry::KeepSettled).await;
        tracker.complete_at("s1", Stage::Segmentation, Utc::now()).await.unwrap();

        let kept = tracker.begin("s1", Stage::Segmentation, 1, Reentry::KeepSettled).await;
        assert!(matches!(kept, Admission::Existing(ref s) if s.status == StageStatus::Completed));

        let replaced = tracker.begin("s1", Stage::Segmentation, 1, Reentry::KeepRunning).await;
        assert!(matches!(replaced, Admission::Started(_)));

        tracker.fail("s1", Stage::Segmentation, "model missing").await.unwrap();
        let retried = tracker.begin("s1", Stage::Segmentation, 1, Reentry::KeepSettled).await;
        assert!(matches!(retried, Admission::Started(_)));
    }

    #[tokio::test]
    async fn test_update_rejects_untracked_and_terminal() {
        let tracker = JobTracker::new();
        assert!(matches!(
            tracker.advance("nope", Stage::Detection).await,
            Err(PipelineError::NotFound(_))
        ));

        tracker.begin("s1", Stage::Detection, 1, Reentry::KeepSettled).await;
        tracker.advance("s1", Stage::Detection).await.unwrap();
        assert!(matches!(
            tracker.advance("s1", Stage::Detection).await,
            Err(PipelineError::JobState(JobStateError::ProgressOverflow { total: 1 }))
        ));

        tracker.complete_at("s1", Stage::Detection, Utc::now()).await.unwrap();
        assert!(tracker.fail("s1", Stage::Detection, "late").await.is_err());
        let state = tracker.snapshot("s1", Stage::Detection).await.unwrap();
        assert_eq!(state.status, StageStatus::Completed);
        assert!(state.end_time.is_some());
    }

    #[tokio::test]
    async fn test_wait_for_resolves_on_completion() {
        let tracker = Arc::new(JobTracker::new());
        tracker.begin("s1", Stage::Detection, 1, Reentry::KeepSettled).await;

        let waiter = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move { tracker.wait_for("s1", Stage::Detection).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        tracker.advance("s1", Stage::Detection).await.unwrap();
        tracker.complete_at("s1", Stage::Detection, Utc::now()).await.unwrap();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter released")
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_untracked_returns_immediately() {
        let tracker = JobTracker::new();
        tokio::time::timeout(Duration::from_millis(100), tracker.wait_for("s1", Stage::Segmentation))
            .await
            .expect("untracked stage does not block");
    }
}

//! Suggestion job state machine
//!
//! A job moves PENDING → PROCESSING → COMPLETED | FAILED (or straight
//! PENDING → FAILED when it cannot start). Only the worker holding the
//! [`JobWriter`] transitions state; everyone else holds a [`JobReader`] and
//! sees immutable snapshots published over a watch channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Created, not yet picked up
    Pending,
    /// Generator calls in flight
    Processing,
    /// Batch finished (individual items may still have failed)
    Completed,
    /// Job could not run or was aborted
    Failed,
}

impl JobState {
    /// Whether `self → next` is a legal transition
    pub fn can_transition_to(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Pending, JobState::Processing)
                | (JobState::Pending, JobState::Failed)
                | (JobState::Processing, JobState::Completed)
                | (JobState::Processing, JobState::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }
}

/// Job state errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("Invalid job transition: {from:?} -> {to:?}")]
    InvalidTransition { from: JobState, to: JobState },
}

/// State transition record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub job_id: Uuid,
    pub old_state: JobState,
    pub new_state: JobState,
    pub transitioned_at: DateTime<Utc>,
}

/// Progress counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    /// Items finished (succeeded or failed)
    pub completed: usize,
    /// Items requested
    pub total: usize,
}

impl JobProgress {
    /// Percentage complete (0.0 - 100.0)
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.completed as f64 / self.total as f64) * 100.0
        }
    }
}

/// Immutable view of a job at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub state: JobState,
    pub progress: JobProgress,
    /// Failure reason, set only in `Failed`
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Single writer for a job
#[derive(Debug)]
pub struct JobWriter {
    tx: watch::Sender<JobSnapshot>,
}

/// Read-only handle on a job
#[derive(Debug, Clone)]
pub struct JobReader {
    rx: watch::Receiver<JobSnapshot>,
}

impl JobWriter {
    /// Create a pending job and its first reader
    pub fn new() -> (Self, JobReader) {
        let now = Utc::now();
        let snapshot = JobSnapshot {
            job_id: Uuid::new_v4(),
            state: JobState::Pending,
            progress: JobProgress::default(),
            error: None,
            created_at: now,
            updated_at: now,
        };
        let (tx, rx) = watch::channel(snapshot);
        (Self { tx }, JobReader { rx })
    }

    pub fn job_id(&self) -> Uuid {
        self.tx.borrow().job_id
    }

    pub fn state(&self) -> JobState {
        self.tx.borrow().state
    }

    /// Additional reader for the same job
    pub fn subscribe(&self) -> JobReader {
        JobReader {
            rx: self.tx.subscribe(),
        }
    }

    /// Move to `new_state`
    ///
    /// # Errors
    /// `JobError::InvalidTransition` if the move is not allowed from the
    /// current state; the published snapshot is left unchanged.
    pub fn transition_to(&self, new_state: JobState) -> Result<StateTransition, JobError> {
        self.transition_with(new_state, None)
    }

    pub fn start(&self, total: usize) -> Result<StateTransition, JobError> {
        let transition = self.transition_to(JobState::Processing)?;
        self.update_progress(0, total);
        Ok(transition)
    }

    pub fn complete(&self) -> Result<StateTransition, JobError> {
        self.transition_to(JobState::Completed)
    }

    pub fn fail(&self, reason: impl Into<String>) -> Result<StateTransition, JobError> {
        self.transition_with(JobState::Failed, Some(reason.into()))
    }

    /// Publish new progress counters (state unchanged)
    pub fn update_progress(&self, completed: usize, total: usize) {
        let mut next = self.tx.borrow().clone();
        next.progress = JobProgress { completed, total };
        next.updated_at = Utc::now();
        self.tx.send_replace(next);
    }

    fn transition_with(
        &self,
        new_state: JobState,
        error: Option<String>,
    ) -> Result<StateTransition, JobError> {
        let current = self.tx.borrow().clone();
        if !current.state.can_transition_to(new_state) {
            tracing::warn!(
                job_id = %current.job_id,
                from = current.state.as_str(),
                to = new_state.as_str(),
                "Rejected job transition"
            );
            return Err(JobError::InvalidTransition {
                from: current.state,
                to: new_state,
            });
        }

        let now = Utc::now();
        let transition = StateTransition {
            job_id: current.job_id,
            old_state: current.state,
            new_state,
            transitioned_at: now,
        };

        let mut next = current;
        next.state = new_state;
        next.error = error;
        next.updated_at = now;
        self.tx.send_replace(next);

        tracing::debug!(
            job_id = %transition.job_id,
            from = transition.old_state.as_str(),
            to = transition.new_state.as_str(),
            "Job transition"
        );

        Ok(transition)
    }
}

impl JobReader {
    /// Current snapshot
    pub fn snapshot(&self) -> JobSnapshot {
        self.rx.borrow().clone()
    }

    /// Wait until the job reaches a terminal state
    ///
    /// Returns the last published snapshot if the writer is dropped first.
    pub async fn wait_for_terminal(&mut self) -> JobSnapshot {
        loop {
            let snapshot = self.rx.borrow_and_update().clone();
            if snapshot.state.is_terminal() {
                return snapshot;
            }
            if self.rx.changed().await.is_err() {
                return self.rx.borrow().clone();
            }
        }
    }
}

//! Data models for the perftriage engine
//!
//! - Suggestion job state machine
//! - Suggestion requests, outcomes and batches

pub mod job;
pub mod suggestion;

pub use job::{JobError, JobProgress, JobReader, JobSnapshot, JobState, JobWriter, StateTransition};
pub use suggestion::{
    FailureKind, SuggestionBatch, SuggestionOutcome, SuggestionRequest, SuggestionResult,
};

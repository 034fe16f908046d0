//! Suggestion requests and per-item outcomes

use crate::services::code_diff::{diff_code, CodeDiff};
use crate::services::matcher::performance_issues;
use chrono::{DateTime, Utc};
use perftriage_common::{MatchColor, MatchedApi, MeasurementRecord, Suggestion, Tier};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payload handed to the suggestion generator for one matched endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionRequest {
    pub request_id: Uuid,
    /// Measured endpoint
    pub record: MeasurementRecord,
    /// Matched source declaration, confidence and color
    pub matched: MatchedApi,
    pub tier: Tier,
    /// Human-readable problems ("High response time: 2500ms", ...)
    pub performance_issues: Vec<String>,
}

impl SuggestionRequest {
    pub fn new(record: MeasurementRecord, matched: MatchedApi, tier: Tier) -> Self {
        let performance_issues = performance_issues(&record);
        Self {
            request_id: Uuid::new_v4(),
            record,
            matched,
            tier,
            performance_issues,
        }
    }

    pub fn endpoint_id(&self) -> &str {
        &self.matched.endpoint_id
    }

    pub fn color(&self) -> MatchColor {
        self.matched.color
    }
}

/// Why an item produced no suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Generator returned an error
    Generator,
    /// Generator call exceeded the per-call timeout
    Timeout,
    /// Generator output could not be recovered into a suggestion
    Recovery,
    /// Recovered suggestion was filtered out (no code, trivial change)
    Rejected,
}

/// Result of one generator call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SuggestionOutcome {
    /// Accepted suggestion with the diff from its current to its improved code
    Suggested { suggestion: Suggestion, diff: CodeDiff },
    Failed { kind: FailureKind, message: String },
}

impl SuggestionOutcome {
    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        SuggestionOutcome::Failed {
            kind,
            message: message.into(),
        }
    }

    pub fn suggested(suggestion: Suggestion) -> Self {
        let diff = diff_code(
            &suggestion.title,
            &suggestion.current_code,
            &suggestion.improved_code,
        );
        SuggestionOutcome::Suggested { suggestion, diff }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SuggestionOutcome::Suggested { .. })
    }
}

/// A matched endpoint paired with its outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionResult {
    pub request_id: Uuid,
    pub matched: MatchedApi,
    pub outcome: SuggestionOutcome,
}

/// Everything a suggestion run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionBatch {
    pub batch_id: Uuid,
    /// Completed items, in completion order
    pub results: Vec<SuggestionResult>,
    /// Number of requests submitted
    pub requested: usize,
    /// True when cancellation or the batch deadline cut the run short
    pub interrupted: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SuggestionBatch {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    /// Requests that never completed
    pub fn abandoned(&self) -> usize {
        self.requested.saturating_sub(self.results.len())
    }
}

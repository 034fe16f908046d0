//! Remediation suggestion orchestration
//!
//! For each matched endpoint: call the generator, recover a [`Suggestion`]
//! from its free text, filter trivial results. Calls run with bounded
//! concurrency via `futures::stream::buffer_unordered`; one item failing never
//! affects its siblings. On cancellation or the batch deadline the completed
//! subset is returned and in-flight calls are dropped. Nothing is retried.

use crate::models::{
    FailureKind, JobError, JobWriter, SuggestionBatch, SuggestionOutcome, SuggestionRequest,
    SuggestionResult,
};
use crate::services::suggestion_filter::{filter_suggestion, FilterVerdict};
use crate::services::text_recovery::recover_as;
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use perftriage_common::config::{SuggestionSettings, MAX_SUGGESTION_CONCURRENCY};
use perftriage_common::Suggestion;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Suggestion generator errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeneratorError {
    /// Backend unreachable or throttling
    #[error("Generator unavailable: {0}")]
    Unavailable(String),

    /// Backend refused this request
    #[error("Generator rejected request: {0}")]
    Rejected(String),

    /// Anything else
    #[error("Generator failed: {0}")]
    Failed(String),
}

/// External free-text generator
///
/// Implementations return raw text; the orchestrator recovers structure from
/// it. Must be safe to call concurrently.
#[async_trait]
pub trait SuggestionGenerator: Send + Sync {
    async fn generate(&self, request: &SuggestionRequest) -> Result<String, GeneratorError>;

    /// Name used in logs
    fn name(&self) -> &str {
        "generator"
    }
}

/// Everything the orchestrator needs, constructed once per run
#[derive(Clone)]
pub struct AnalysisContext {
    generator: Arc<dyn SuggestionGenerator>,
    max_concurrency: usize,
    call_timeout: Duration,
    filter_trivial: bool,
}

impl std::fmt::Debug for AnalysisContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisContext")
            .field("generator", &self.generator.name())
            .field("max_concurrency", &self.max_concurrency)
            .field("call_timeout", &self.call_timeout)
            .field("filter_trivial", &self.filter_trivial)
            .finish()
    }
}

impl AnalysisContext {
    /// Build a context; concurrency is clamped to 1..=8
    pub fn new(generator: Arc<dyn SuggestionGenerator>, settings: &SuggestionSettings) -> Self {
        Self {
            generator,
            max_concurrency: clamp_concurrency(settings.max_concurrency),
            call_timeout: Duration::from_secs(settings.call_timeout_secs.max(1)),
            filter_trivial: true,
        }
    }

    pub fn with_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = clamp_concurrency(max_concurrency);
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Keep recovered suggestions even when they change nothing
    pub fn without_trivial_filter(mut self) -> Self {
        self.filter_trivial = false;
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }
}

fn clamp_concurrency(requested: usize) -> usize {
    requested.clamp(1, MAX_SUGGESTION_CONCURRENCY)
}

/// Generate suggestions for every request
///
/// Always returns a batch: per-item failures are recorded as
/// [`SuggestionOutcome::Failed`], and `interrupted` is set when `cancel` fires
/// or `deadline` elapses before every request completed. Items already
/// finished when the batch stops are kept.
pub async fn generate_suggestions(
    ctx: &AnalysisContext,
    requests: Vec<SuggestionRequest>,
    cancel: CancellationToken,
    deadline: Option<Duration>,
) -> SuggestionBatch {
    run_batch(ctx, requests, cancel, deadline, |_, _| {}).await
}

/// Run a batch as a tracked job
///
/// The writer moves PENDING → PROCESSING, publishes progress after every
/// completed item, then COMPLETED. An interrupted batch still completes the
/// job; `SuggestionBatch::interrupted` records the cut-off.
///
/// # Errors
/// `JobError::InvalidTransition` if the job was not pending.
pub async fn run_suggestion_job(
    ctx: &AnalysisContext,
    requests: Vec<SuggestionRequest>,
    cancel: CancellationToken,
    deadline: Option<Duration>,
    writer: &JobWriter,
) -> Result<SuggestionBatch, JobError> {
    writer.start(requests.len())?;

    let batch = run_batch(ctx, requests, cancel, deadline, |completed, total| {
        writer.update_progress(completed, total)
    })
    .await;

    writer.complete()?;
    Ok(batch)
}

async fn run_batch<F>(
    ctx: &AnalysisContext,
    requests: Vec<SuggestionRequest>,
    cancel: CancellationToken,
    deadline: Option<Duration>,
    mut on_progress: F,
) -> SuggestionBatch
where
    F: FnMut(usize, usize),
{
    let batch_id = Uuid::new_v4();
    let started_at = Utc::now();
    let requested = requests.len();

    tracing::info!(
        batch_id = %batch_id,
        generator = ctx.generator.name(),
        requests = requested,
        workers = ctx.max_concurrency,
        "Starting suggestion batch"
    );

    let pending = stream::iter(requests)
        .map(|request| process_request(ctx, request))
        .buffer_unordered(ctx.max_concurrency);
    tokio::pin!(pending);

    let deadline_elapsed = async {
        match deadline {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline_elapsed);

    let mut results = Vec::with_capacity(requested);
    let mut stopped = false;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(batch_id = %batch_id, completed = results.len(), "Suggestion batch cancelled");
                stopped = true;
                break;
            }
            _ = &mut deadline_elapsed => {
                tracing::warn!(batch_id = %batch_id, completed = results.len(), "Suggestion batch deadline reached");
                stopped = true;
                break;
            }
            next = pending.next() => match next {
                Some(result) => {
                    results.push(result);
                    on_progress(results.len(), requested);
                }
                None => break,
            },
        }
    }

    if stopped {
        // Keep items that finished in the same instant the batch was stopped
        while let Some(Some(result)) = pending.next().now_or_never() {
            results.push(result);
            on_progress(results.len(), requested);
        }
    }
    let interrupted = results.len() < requested;

    let batch = SuggestionBatch {
        batch_id,
        results,
        requested,
        interrupted,
        started_at,
        finished_at: Utc::now(),
    };

    tracing::info!(
        batch_id = %batch_id,
        succeeded = batch.succeeded(),
        failed = batch.failed(),
        abandoned = batch.abandoned(),
        interrupted,
        "Suggestion batch finished"
    );

    batch
}

async fn process_request(ctx: &AnalysisContext, request: SuggestionRequest) -> SuggestionResult {
    let outcome = match tokio::time::timeout(ctx.call_timeout, ctx.generator.generate(&request)).await
    {
        Err(_) => SuggestionOutcome::failed(
            FailureKind::Timeout,
            format!("Generator call exceeded {:?}", ctx.call_timeout),
        ),
        Ok(Err(e)) => SuggestionOutcome::failed(FailureKind::Generator, e.to_string()),
        Ok(Ok(text)) => outcome_from_text(ctx, &text),
    };

    match &outcome {
        SuggestionOutcome::Suggested { .. } => tracing::debug!(
            endpoint = %request.endpoint_id(),
            "Suggestion generated"
        ),
        SuggestionOutcome::Failed { kind, message } => tracing::warn!(
            endpoint = %request.endpoint_id(),
            kind = ?kind,
            error = %message,
            "Suggestion failed"
        ),
    }

    SuggestionResult {
        request_id: request.request_id,
        matched: request.matched,
        outcome,
    }
}

fn outcome_from_text(ctx: &AnalysisContext, text: &str) -> SuggestionOutcome {
    let suggestion: Suggestion = match recover_as(text) {
        Ok(s) => s,
        Err(e) => return SuggestionOutcome::failed(FailureKind::Recovery, e.to_string()),
    };

    if !ctx.filter_trivial {
        return SuggestionOutcome::suggested(suggestion);
    }

    match filter_suggestion(suggestion) {
        FilterVerdict::Accepted(suggestion) => SuggestionOutcome::suggested(suggestion),
        FilterVerdict::Rejected(reason) => {
            SuggestionOutcome::failed(FailureKind::Rejected, reason.to_string())
        }
    }
}

//! Workflow orchestration
//!
//! - **pipeline**: classification followed by endpoint matching
//! - **suggestions**: bounded-concurrency generator calls with per-item
//!   failure isolation, cancellation and deadline handling

pub mod pipeline;
pub mod suggestions;

pub use pipeline::{AnalysisReport, Pipeline, PipelineConfig};
pub use suggestions::{
    generate_suggestions, run_suggestion_job, AnalysisContext, GeneratorError,
    SuggestionGenerator,
};

//! perftriage engine
//!
//! Classifies endpoint performance measurements into tiers, matches the worst
//! endpoints to API declarations found in source, and turns generator output
//! into structured remediation suggestions.
//!
//! - [`services`]: pure, synchronous analysis (classifier, matcher, recovery)
//! - [`workflow`]: pipeline and suggestion orchestration
//! - [`models`]: job state machine and suggestion batch types
//! - [`db`]: result stores

pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod workflow;

pub use crate::error::{EngineError, EngineResult};
pub use crate::services::{classify, match_apis, recover};
pub use crate::workflow::{generate_suggestions, AnalysisContext, Pipeline, SuggestionGenerator};

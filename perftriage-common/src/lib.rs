//! # perftriage common library
//!
//! Shared code for the perftriage crates:
//! - Normalized record types (measurements, thresholds, tiers, matches)
//! - Common error type
//! - TOML configuration loading
//! - Tracing initialisation
//! - Result database initialization

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;

pub use error::{Error, Result};
pub use models::{
    ClassificationMode, ClassifiedSet, Direction, DiscoveredApi, Insights, MatchColor,
    MatchedApi, MeasurementRecord, Metric, Suggestion, ThresholdConfig, Tier, Trend,
};

//! Normalized record types shared by every perftriage stage
//!
//! Measurement records come from the report parser and discovered APIs from
//! the source scanner; neither is produced here. All records are plain value
//! objects: a stage owns its outputs exclusively until it hands them on.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Measurements
// ============================================================================

/// One endpoint's aggregated performance sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    /// Stable identifier, usually `METHOD /path`
    pub endpoint_id: String,

    /// Mean response time in milliseconds (>= 0)
    pub avg_response_time_ms: f64,

    /// Error rate in percent (0-100)
    pub error_rate_percent: f64,

    /// Requests per second (>= 0)
    pub throughput_rps: f64,

    /// 95th percentile latency in milliseconds (>= 0)
    pub p95_latency_ms: f64,
}

impl MeasurementRecord {
    pub fn new(
        endpoint_id: impl Into<String>,
        avg_response_time_ms: f64,
        error_rate_percent: f64,
        throughput_rps: f64,
        p95_latency_ms: f64,
    ) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            avg_response_time_ms,
            error_rate_percent,
            throughput_rps,
            p95_latency_ms,
        }
    }

    /// Reject values the report parser should never have produced
    ///
    /// # Errors
    /// `Error::InvalidInput` for non-finite or negative metrics, or an error
    /// rate above 100 %.
    pub fn validate(&self) -> Result<()> {
        for metric in Metric::ALL {
            let value = metric.value_of(self);
            if !value.is_finite() {
                return Err(Error::InvalidInput(format!(
                    "{} is not a finite number ({})",
                    metric.name(),
                    value
                )));
            }
            if value < 0.0 {
                return Err(Error::InvalidInput(format!(
                    "{} must not be negative ({})",
                    metric.name(),
                    value
                )));
            }
        }

        if self.error_rate_percent > 100.0 {
            return Err(Error::InvalidInput(format!(
                "error_rate exceeds 100% ({})",
                self.error_rate_percent
            )));
        }

        Ok(())
    }
}

/// Which way a metric improves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    LowerIsBetter,
    HigherIsBetter,
}

impl Direction {
    /// Good condition: at or better than the good threshold
    pub fn meets_good(self, value: f64, threshold: f64) -> bool {
        match self {
            Direction::LowerIsBetter => value <= threshold,
            Direction::HigherIsBetter => value >= threshold,
        }
    }

    /// Bad condition: at or worse than the bad threshold
    pub fn meets_bad(self, value: f64, threshold: f64) -> bool {
        match self {
            Direction::LowerIsBetter => value >= threshold,
            Direction::HigherIsBetter => value <= threshold,
        }
    }
}

/// The four measured metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    ResponseTime,
    ErrorRate,
    Throughput,
    P95Latency,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::ResponseTime,
        Metric::ErrorRate,
        Metric::Throughput,
        Metric::P95Latency,
    ];

    pub fn direction(self) -> Direction {
        match self {
            Metric::Throughput => Direction::HigherIsBetter,
            Metric::ResponseTime | Metric::ErrorRate | Metric::P95Latency => {
                Direction::LowerIsBetter
            }
        }
    }

    /// Stable snake_case name used in logs, key metrics and trends
    pub fn name(self) -> &'static str {
        match self {
            Metric::ResponseTime => "response_time",
            Metric::ErrorRate => "error_rate",
            Metric::Throughput => "throughput",
            Metric::P95Latency => "p95_latency",
        }
    }

    pub fn value_of(self, record: &MeasurementRecord) -> f64 {
        match self {
            Metric::ResponseTime => record.avg_response_time_ms,
            Metric::ErrorRate => record.error_rate_percent,
            Metric::Throughput => record.throughput_rps,
            Metric::P95Latency => record.p95_latency_ms,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Thresholds
// ============================================================================

/// Per-metric good/bad policy; every field is independently optional
///
/// Supplied once per classification run and never mutated during it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_good: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_bad: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_rate_good: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_rate_bad: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throughput_good: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throughput_bad: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p95_good: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p95_bad: Option<f64>,
}

impl ThresholdConfig {
    /// Fully populated policy used when a record has to be judged without a
    /// caller-supplied configuration
    ///
    /// The bad side mirrors the usual performance-issue cutoffs:
    /// > 1000 ms response time, > 5 % errors, < 10 rps, > 2000 ms p95.
    pub fn default_policy() -> Self {
        Self {
            response_time_good: Some(500.0),
            response_time_bad: Some(1000.0),
            error_rate_good: Some(1.0),
            error_rate_bad: Some(5.0),
            throughput_good: Some(50.0),
            throughput_bad: Some(10.0),
            p95_good: Some(1000.0),
            p95_bad: Some(2000.0),
        }
    }

    pub fn good(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::ResponseTime => self.response_time_good,
            Metric::ErrorRate => self.error_rate_good,
            Metric::Throughput => self.throughput_good,
            Metric::P95Latency => self.p95_good,
        }
    }

    pub fn bad(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::ResponseTime => self.response_time_bad,
            Metric::ErrorRate => self.error_rate_bad,
            Metric::Throughput => self.throughput_bad,
            Metric::P95Latency => self.p95_bad,
        }
    }

    pub fn configured_good_count(&self) -> usize {
        Metric::ALL.iter().filter(|m| self.good(**m).is_some()).count()
    }

    pub fn configured_bad_count(&self) -> usize {
        Metric::ALL.iter().filter(|m| self.bad(**m).is_some()).count()
    }

    /// Number of non-null threshold fields (0-8)
    pub fn configured_count(&self) -> usize {
        self.configured_good_count() + self.configured_bad_count()
    }

    pub fn is_empty(&self) -> bool {
        self.configured_count() == 0
    }

    /// Check every configured value and every good/bad pair
    ///
    /// A pair is inverted when the good threshold lies on the bad side of the
    /// bad threshold (e.g. response time good 2000 ms, bad 500 ms). Equal
    /// values are accepted.
    ///
    /// # Errors
    /// `Error::Config` naming the first offending metric.
    pub fn validate(&self) -> Result<()> {
        for metric in Metric::ALL {
            for (side, value) in [("good", self.good(metric)), ("bad", self.bad(metric))] {
                if let Some(v) = value {
                    if !v.is_finite() || v < 0.0 {
                        return Err(Error::Config(format!(
                            "{} {} threshold must be a finite, non-negative number (got {})",
                            metric, side, v
                        )));
                    }
                }
            }

            if let (Some(good), Some(bad)) = (self.good(metric), self.bad(metric)) {
                let inverted = match metric.direction() {
                    Direction::LowerIsBetter => good > bad,
                    Direction::HigherIsBetter => good < bad,
                };
                if inverted {
                    return Err(Error::Config(format!(
                        "{} thresholds are inverted: good={} bad={}",
                        metric, good, bad
                    )));
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Classification output
// ============================================================================

/// Classification bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Best,
    Worst,
    Neither,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Best => "best",
            Tier::Worst => "worst",
            Tier::Neither => "neither",
        }
    }
}

/// Which strategy produced a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationMode {
    /// At least one threshold configured
    Threshold,
    /// No thresholds: cohort-relative composite ranking
    RelativeRanking,
}

/// Qualitative variability label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Stable,
    Unstable,
}

/// Aggregate insight text attached to a classification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    pub summary: String,
    pub recommendations: Vec<String>,
    pub key_metrics: BTreeMap<String, f64>,
    pub trends: BTreeMap<String, Trend>,
    /// Endpoints that fell between good and bad thresholds (only populated
    /// when both sides are configured)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unmatched_conditions: Vec<String>,
}

/// Three disjoint, exhaustive tiers plus aggregates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedSet {
    pub best: Vec<MeasurementRecord>,
    pub worst: Vec<MeasurementRecord>,
    pub neither: Vec<MeasurementRecord>,
    pub overall_p95_latency_ms: f64,
    pub insights: Insights,
    pub mode: ClassificationMode,
}

impl ClassifiedSet {
    pub fn records(&self, tier: Tier) -> &[MeasurementRecord] {
        match tier {
            Tier::Best => &self.best,
            Tier::Worst => &self.worst,
            Tier::Neither => &self.neither,
        }
    }

    pub fn total(&self) -> usize {
        self.best.len() + self.worst.len() + self.neither.len()
    }

    /// Tier holding `endpoint_id`, if any
    pub fn tier_of(&self, endpoint_id: &str) -> Option<Tier> {
        [Tier::Best, Tier::Worst, Tier::Neither]
            .into_iter()
            .find(|tier| {
                self.records(*tier)
                    .iter()
                    .any(|r| r.endpoint_id == endpoint_id)
            })
    }
}

// ============================================================================
// Discovery and matching
// ============================================================================

/// An API declaration found by the source scanner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredApi {
    /// Route as written in source (`/users/{id}`, `/users/:id`, ...)
    pub endpoint_path: String,

    /// HTTP method; empty or `UNKNOWN` when the scanner could not tell
    #[serde(default)]
    pub http_method: String,

    pub file_path: String,
    pub function_name: String,

    /// Framework name as reported by the scanner (FastAPI, Express.js, ...)
    #[serde(default)]
    pub framework_hint: String,

    /// Handler source; may be empty
    #[serde(default)]
    pub snippet: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
}

/// Tier-derived marker attached to a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchColor {
    Red,
    Green,
    None,
}

/// A measurement record paired one-to-one with a discovered API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedApi {
    pub endpoint_id: String,
    pub discovered: DiscoveredApi,
    /// Similarity score in [0, 1], unrounded
    pub confidence: f64,
    pub color: MatchColor,
}

// ============================================================================
// Remediation suggestions
// ============================================================================

/// Structured remediation suggestion recovered from generator output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub title: String,
    #[serde(default)]
    pub issue: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub current_code: String,
    pub improved_code: String,
    #[serde(default)]
    pub expected_improvement: String,
    #[serde(default)]
    pub summary: String,
}

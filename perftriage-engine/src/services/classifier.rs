//! Performance Tier Classifier
//!
//! Partitions measurement records into best / worst / neither tiers.
//!
//! Two strategies, chosen by how many thresholds are configured:
//! - **Threshold-based** (any threshold set): each configured good/bad
//!   threshold is a vote; worst needs half of the configured bad thresholds,
//!   best needs 70 % of the configured good thresholds. Worst wins ties.
//! - **Relative ranking** (no thresholds): records are scored against the
//!   cohort median and the top / bottom 30 % become best / worst.
//!
//! Pure and synchronous; safe to call from any thread.

use crate::services::insights::{generate_insights, TierView};
use crate::services::stats;
use perftriage_common::{
    ClassificationMode, ClassifiedSet, Direction, MeasurementRecord, Metric, ThresholdConfig,
    Tier,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classifier errors
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// No records supplied
    #[error("No measurement records to classify")]
    EmptyInput,

    /// Threshold configuration is inverted or out of range
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A record carries impossible metric values
    #[error("Invalid measurement for {endpoint_id}: {reason}")]
    InvalidMeasurement { endpoint_id: String, reason: String },
}

/// How `overall_p95_latency_ms` is aggregated across records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum P95Aggregation {
    /// Worst endpoint's p95 (system tail latency is dominated by it)
    #[default]
    Max,
    /// p95 weighted by each endpoint's throughput
    ThroughputWeightedMean,
}

/// Classifier tuning
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifierOptions {
    pub p95_aggregation: P95Aggregation,
}

/// Composite-score weights for relative ranking (sum to 1.0)
const RANKING_WEIGHTS: [(Metric, f64); 4] = [
    (Metric::ResponseTime, 0.35),
    (Metric::ErrorRate, 0.25),
    (Metric::Throughput, 0.20),
    (Metric::P95Latency, 0.20),
];

/// Share of records placed in each of best / worst when ranking (30 %)
const RANKING_SHARE: (usize, usize) = (3, 10);

/// Share of configured bad thresholds that must trip for worst (50 %)
const WORST_QUORUM: (usize, usize) = (1, 2);

/// Share of configured good thresholds that must hold for best (70 %)
const BEST_QUORUM: (usize, usize) = (7, 10);

/// Performance tier classifier
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    options: ClassifierOptions,
}

impl Classifier {
    /// Create classifier with default options (p95 aggregated by max)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ClassifierOptions) -> Self {
        Self { options }
    }

    /// Classify records into tiers
    ///
    /// # Errors
    /// - `EmptyInput` if `records` is empty
    /// - `Configuration` if a threshold pair is inverted (checked first)
    /// - `InvalidMeasurement` for non-finite, negative or >100 % values
    pub fn classify(
        &self,
        records: &[MeasurementRecord],
        config: &ThresholdConfig,
    ) -> Result<ClassifiedSet, ClassifyError> {
        config
            .validate()
            .map_err(|e| ClassifyError::Configuration(e.to_string()))?;

        if records.is_empty() {
            return Err(ClassifyError::EmptyInput);
        }

        for record in records {
            record
                .validate()
                .map_err(|e| ClassifyError::InvalidMeasurement {
                    endpoint_id: record.endpoint_id.clone(),
                    reason: e.to_string(),
                })?;
        }

        let configured_count = config.configured_count();
        let (mode, tiers) = if configured_count == 0 {
            (ClassificationMode::RelativeRanking, rank_relative(records))
        } else {
            (ClassificationMode::Threshold, partition_by_thresholds(records, config))
        };

        let overall_p95_latency_ms = self.aggregate_p95(records);

        let insights = generate_insights(&TierView {
            all: records,
            best: &tiers.best,
            worst: &tiers.worst,
            neither: &tiers.neither,
            overall_p95_latency_ms,
            mode,
            thresholds: config,
        });

        tracing::info!(
            mode = ?mode,
            thresholds_configured = configured_count,
            total = records.len(),
            best = tiers.best.len(),
            worst = tiers.worst.len(),
            neither = tiers.neither.len(),
            overall_p95_latency_ms,
            "Classification complete"
        );

        Ok(ClassifiedSet {
            best: tiers.best,
            worst: tiers.worst,
            neither: tiers.neither,
            overall_p95_latency_ms,
            insights,
            mode,
        })
    }

    fn aggregate_p95(&self, records: &[MeasurementRecord]) -> f64 {
        match self.options.p95_aggregation {
            P95Aggregation::Max => records
                .iter()
                .map(|r| r.p95_latency_ms)
                .fold(0.0, f64::max),
            P95Aggregation::ThroughputWeightedMean => {
                let total_weight: f64 = records.iter().map(|r| r.throughput_rps).sum();
                if total_weight > 0.0 {
                    records
                        .iter()
                        .map(|r| r.p95_latency_ms * r.throughput_rps)
                        .sum::<f64>()
                        / total_weight
                } else {
                    let p95s: Vec<f64> = records.iter().map(|r| r.p95_latency_ms).collect();
                    stats::mean(&p95s)
                }
            }
        }
    }
}

/// Classify with default options
///
/// # Errors
/// See [`Classifier::classify`].
pub fn classify(
    records: &[MeasurementRecord],
    config: &ThresholdConfig,
) -> Result<ClassifiedSet, ClassifyError> {
    Classifier::new().classify(records, config)
}

#[derive(Debug, Default)]
struct Tiers {
    best: Vec<MeasurementRecord>,
    worst: Vec<MeasurementRecord>,
    neither: Vec<MeasurementRecord>,
}

// ============================================================================
// Threshold-based classification
// ============================================================================

/// Good/bad votes cast by one record against a threshold configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdHits {
    pub good_hits: usize,
    pub bad_hits: usize,
}

/// Count satisfied good and bad conditions
///
/// Each configured side is evaluated on its own; a metric with only a good
/// (or only a bad) threshold still votes on that side.
pub fn count_hits(record: &MeasurementRecord, config: &ThresholdConfig) -> ThresholdHits {
    let mut hits = ThresholdHits {
        good_hits: 0,
        bad_hits: 0,
    };

    for metric in Metric::ALL {
        let value = metric.value_of(record);
        let direction: Direction = metric.direction();

        if let Some(good) = config.good(metric) {
            if direction.meets_good(value, good) {
                hits.good_hits += 1;
            }
        }
        if let Some(bad) = config.bad(metric) {
            if direction.meets_bad(value, bad) {
                hits.bad_hits += 1;
            }
        }
    }

    hits
}

/// Tier for a single record under threshold rules (worst checked first)
///
/// A configuration with no thresholds at all yields `Neither`.
pub fn threshold_tier(record: &MeasurementRecord, config: &ThresholdConfig) -> Tier {
    let hits = count_hits(record, config);
    let configured_bad = config.configured_bad_count();
    let configured_good = config.configured_good_count();

    if configured_bad > 0
        && hits.bad_hits >= stats::ceil_fraction(configured_bad, WORST_QUORUM.0, WORST_QUORUM.1)
    {
        Tier::Worst
    } else if configured_good > 0
        && hits.good_hits >= stats::ceil_fraction(configured_good, BEST_QUORUM.0, BEST_QUORUM.1)
    {
        Tier::Best
    } else {
        Tier::Neither
    }
}

/// Best predicate: the record lands in `best` under `config`
pub fn meets_best(record: &MeasurementRecord, config: &ThresholdConfig) -> bool {
    threshold_tier(record, config) == Tier::Best
}

fn partition_by_thresholds(records: &[MeasurementRecord], config: &ThresholdConfig) -> Tiers {
    let mut tiers = Tiers::default();

    for record in records {
        let tier = threshold_tier(record, config);
        tracing::debug!(
            endpoint = %record.endpoint_id,
            tier = tier.as_str(),
            "Threshold classification"
        );
        match tier {
            Tier::Worst => tiers.worst.push(record.clone()),
            Tier::Best => tiers.best.push(record.clone()),
            Tier::Neither => tiers.neither.push(record.clone()),
        }
    }

    tiers
}

// ============================================================================
// Relative ranking
// ============================================================================

/// Composite score per record (higher is better)
///
/// Each metric contributes its weighted deviation from the cohort median,
/// normalized by the cohort's spread and signed so that better is positive.
pub fn composite_scores(records: &[MeasurementRecord]) -> Vec<f64> {
    let mut scores = vec![0.0; records.len()];

    for (metric, weight) in RANKING_WEIGHTS {
        let values: Vec<f64> = records.iter().map(|r| metric.value_of(r)).collect();
        let center = stats::median(&values);
        let scale = stats::robust_scale(&values, center);

        for (score, value) in scores.iter_mut().zip(&values) {
            let deviation = match metric.direction() {
                Direction::LowerIsBetter => (center - value) / scale,
                Direction::HigherIsBetter => (value - center) / scale,
            };
            *score += weight * deviation;
        }
    }

    scores
}

/// Number of records placed in each of best and worst for a cohort of `n`
///
/// `max(1, ceil(0.3 n))`, shrunk to `floor(n / 2)` when best and worst would
/// overlap.
pub fn ranking_tier_size(n: usize) -> usize {
    let k = stats::ceil_fraction(n, RANKING_SHARE.0, RANKING_SHARE.1).max(1);
    if 2 * k > n {
        n / 2
    } else {
        k
    }
}

fn rank_relative(records: &[MeasurementRecord]) -> Tiers {
    let scores = composite_scores(records);
    let order = order_by_score(records, &scores);

    let n = records.len();
    let k = ranking_tier_size(n);

    for (rank, &idx) in order.iter().enumerate() {
        tracing::debug!(
            endpoint = %records[idx].endpoint_id,
            rank,
            score = scores[idx],
            "Relative ranking"
        );
    }

    let best = order[..k].iter().map(|&i| records[i].clone()).collect();
    let neither = order[k..n - k].iter().map(|&i| records[i].clone()).collect();
    // Worst tier listed worst-first
    let worst = order[n - k..]
        .iter()
        .rev()
        .map(|&i| records[i].clone())
        .collect();

    Tiers {
        best,
        worst,
        neither,
    }
}

/// Record indices from best to worst composite score
pub fn ranking_order(records: &[MeasurementRecord]) -> Vec<usize> {
    order_by_score(records, &composite_scores(records))
}

// Score descending, endpoint_id ascending on ties
fn order_by_score(records: &[MeasurementRecord], scores: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..records.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .total_cmp(&scores[a])
            .then_with(|| records[a].endpoint_id.cmp(&records[b].endpoint_id))
    });
    order
}

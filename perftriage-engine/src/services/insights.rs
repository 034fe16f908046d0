//! Insight generation for a classification run
//!
//! Turns tier membership into a summary sentence, rule-triggered
//! recommendations, aggregate key metrics and per-metric stability labels.

use crate::services::stats;
use perftriage_common::{
    ClassificationMode, Insights, MeasurementRecord, Metric, ThresholdConfig, Trend,
};
use std::collections::BTreeMap;

/// Mean worst-tier error rate (%) that triggers the error-spike recommendation
const ERROR_SPIKE_PERCENT: f64 = 5.0;

/// Mean worst-tier response time (ms) that triggers the caching recommendation
const SLOW_RESPONSE_MS: f64 = 1000.0;

/// Mean worst-tier throughput (rps) that triggers the capacity recommendation
const LOW_THROUGHPUT_RPS: f64 = 10.0;

/// Share of records in `neither` above which thresholds look too far apart
const NEITHER_SHARE: f64 = 0.6;

/// Coefficient of variation above which a metric is labelled unstable
const UNSTABLE_CV: f64 = 0.5;

/// Number of worst endpoints named in the summary
const SUMMARY_WORST_LIMIT: usize = 3;

/// Borrowed view of a finished partition
#[derive(Debug, Clone, Copy)]
pub struct TierView<'a> {
    pub all: &'a [MeasurementRecord],
    pub best: &'a [MeasurementRecord],
    pub worst: &'a [MeasurementRecord],
    pub neither: &'a [MeasurementRecord],
    pub overall_p95_latency_ms: f64,
    pub mode: ClassificationMode,
    pub thresholds: &'a ThresholdConfig,
}

/// Build insights for a classification
pub fn generate_insights(view: &TierView<'_>) -> Insights {
    let insights = Insights {
        summary: summary(view),
        recommendations: recommendations(view),
        key_metrics: key_metrics(view),
        trends: trends(view.all),
        unmatched_conditions: unmatched_conditions(view),
    };

    tracing::debug!(
        recommendations = insights.recommendations.len(),
        unstable = insights
            .trends
            .values()
            .filter(|t| **t == Trend::Unstable)
            .count(),
        "Generated insights"
    );

    insights
}

fn metric_values(records: &[MeasurementRecord], metric: Metric) -> Vec<f64> {
    records.iter().map(|r| metric.value_of(r)).collect()
}

fn metric_mean(records: &[MeasurementRecord], metric: Metric) -> f64 {
    stats::mean(&metric_values(records, metric))
}

fn summary(view: &TierView<'_>) -> String {
    let mut text = format!(
        "Analyzed {} endpoints: {} best, {} worst, {} neither. Overall p95 latency {:.2} ms.",
        view.all.len(),
        view.best.len(),
        view.worst.len(),
        view.neither.len(),
        view.overall_p95_latency_ms
    );

    if !view.worst.is_empty() {
        let names: Vec<&str> = view
            .worst
            .iter()
            .take(SUMMARY_WORST_LIMIT)
            .map(|r| r.endpoint_id.as_str())
            .collect();
        text.push_str(&format!(" Worst performers: {}.", names.join(", ")));
    }

    text
}

fn recommendations(view: &TierView<'_>) -> Vec<String> {
    let mut out = Vec::new();
    let total = view.all.len();

    if !view.worst.is_empty() {
        let worst_error = metric_mean(view.worst, Metric::ErrorRate);
        if worst_error > ERROR_SPIKE_PERCENT {
            out.push(format!(
                "Investigate error spikes: worst endpoints average {:.2}% errors",
                worst_error
            ));
        }

        let worst_response = metric_mean(view.worst, Metric::ResponseTime);
        if worst_response > SLOW_RESPONSE_MS {
            out.push(format!(
                "Consider caching for slow endpoints: worst endpoints average {:.2} ms",
                worst_response
            ));
        }

        let worst_throughput = metric_mean(view.worst, Metric::Throughput);
        if worst_throughput < LOW_THROUGHPUT_RPS {
            out.push(format!(
                "Improve throughput of worst endpoints (average {:.2} rps): review connection pooling and blocking calls",
                worst_throughput
            ));
        }
    }

    if view.mode == ClassificationMode::Threshold
        && view.thresholds.configured_good_count() > 0
        && view.best.is_empty()
    {
        out.push(
            "No endpoint meets the good thresholds; review whether they are realistic for this workload"
                .to_string(),
        );
    }

    if view.worst.len() * 2 > total {
        out.push(
            "Most endpoints are in the worst tier; look for a shared bottleneck (database, network, host capacity)"
                .to_string(),
        );
    }

    if view.mode == ClassificationMode::Threshold
        && total > 0
        && view.neither.len() as f64 > NEITHER_SHARE * total as f64
    {
        out.push(
            "Most endpoints sit between good and bad thresholds; narrow the gap to get a sharper split"
                .to_string(),
        );
    }

    let mean_response = metric_mean(view.all, Metric::ResponseTime);
    if total > 1 && view.overall_p95_latency_ms > 2.0 * mean_response {
        out.push(format!(
            "Tail latency ({:.2} ms p95) is more than twice the mean response time ({:.2} ms); investigate outliers",
            view.overall_p95_latency_ms, mean_response
        ));
    }

    out
}

fn avg_key(metric: Metric) -> &'static str {
    match metric {
        Metric::ResponseTime => "avg_response_time_ms",
        Metric::ErrorRate => "avg_error_rate_percent",
        Metric::Throughput => "avg_throughput_rps",
        Metric::P95Latency => "avg_p95_latency_ms",
    }
}

fn key_metrics(view: &TierView<'_>) -> BTreeMap<String, f64> {
    let mut metrics = BTreeMap::new();

    metrics.insert("total_endpoints".to_string(), view.all.len() as f64);
    metrics.insert("best_count".to_string(), view.best.len() as f64);
    metrics.insert("worst_count".to_string(), view.worst.len() as f64);
    metrics.insert("neither_count".to_string(), view.neither.len() as f64);
    metrics.insert(
        "overall_p95_latency_ms".to_string(),
        view.overall_p95_latency_ms,
    );

    for metric in Metric::ALL {
        metrics.insert(avg_key(metric).to_string(), metric_mean(view.all, metric));
    }

    for (tier, records) in [("best", view.best), ("worst", view.worst), ("neither", view.neither)] {
        if records.is_empty() {
            continue;
        }
        for metric in Metric::ALL {
            metrics.insert(
                format!("{}_{}", tier, avg_key(metric)),
                metric_mean(records, metric),
            );
        }
    }

    metrics
}

fn trends(records: &[MeasurementRecord]) -> BTreeMap<String, Trend> {
    Metric::ALL
        .into_iter()
        .map(|metric| {
            let cv = stats::coefficient_of_variation(&metric_values(records, metric));
            let trend = if cv > UNSTABLE_CV {
                Trend::Unstable
            } else {
                Trend::Stable
            };
            (metric.name().to_string(), trend)
        })
        .collect()
}

fn unmatched_conditions(view: &TierView<'_>) -> Vec<String> {
    if view.mode != ClassificationMode::Threshold
        || view.thresholds.configured_good_count() == 0
        || view.thresholds.configured_bad_count() == 0
    {
        return Vec::new();
    }
    view.neither.iter().map(|r| r.endpoint_id.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, rt: f64, err: f64, thr: f64, p95: f64) -> MeasurementRecord {
        MeasurementRecord::new(id, rt, err, thr, p95)
    }

    #[test]
    fn test_worst_tier_rules_fire() {
        let all = vec![
            rec("GET /ok", 50.0, 0.0, 200.0, 90.0),
            rec("GET /slow", 2500.0, 12.0, 4.0, 3200.0),
        ];
        let thresholds = ThresholdConfig::default_policy();
        let view = TierView {
            all: &all,
            best: &all[..1],
            worst: &all[1..],
            neither: &[],
            overall_p95_latency_ms: 3200.0,
            mode: ClassificationMode::Threshold,
            thresholds: &thresholds,
        };
        let insights = generate_insights(&view);

        assert!(insights.recommendations[0].starts_with("Investigate error spikes"));
        assert!(insights.recommendations[1].starts_with("Consider caching for slow endpoints"));
        assert!(insights.recommendations[2].starts_with("Improve throughput"));
        assert!(insights.summary.contains("2 endpoints: 1 best, 1 worst, 0 neither"));
        assert!(insights.summary.contains("3200.00 ms"));
        assert!(insights.summary.contains("GET /slow"));
        assert_eq!(insights.key_metrics["total_endpoints"], 2.0);
        assert_eq!(insights.key_metrics["worst_avg_error_rate_percent"], 12.0);
        assert!(!insights.key_metrics.contains_key("neither_avg_response_time_ms"));
    }

    #[test]
    fn test_trends_label_high_variation_unstable() {
        let all = vec![
            rec("a", 10.0, 1.0, 100.0, 20.0),
            rec("b", 1000.0, 1.0, 100.0, 2000.0),
        ];
        let trends = trends(&all);
        assert_eq!(trends["response_time"], Trend::Unstable);
        assert_eq!(trends["error_rate"], Trend::Stable);
        assert_eq!(trends["throughput"], Trend::Stable);
        assert_eq!(trends["p95_latency"], Trend::Unstable);
    }

    #[test]
    fn test_unmatched_conditions_need_both_sides() {
        let all = vec![rec("GET /mid", 300.0, 2.0, 30.0, 1500.0)];
        let both = ThresholdConfig::default_policy();
        let good_only = ThresholdConfig {
            response_time_good: Some(100.0),
            ..Default::default()
        };

        let mut view = TierView {
            all: &all,
            best: &[],
            worst: &[],
            neither: &all,
            overall_p95_latency_ms: 1500.0,
            mode: ClassificationMode::Threshold,
            thresholds: &both,
        };
        assert_eq!(unmatched_conditions(&view), vec!["GET /mid".to_string()]);

        view.thresholds = &good_only;
        assert!(unmatched_conditions(&view).is_empty());
    }

    #[test]
    fn test_no_best_recommendation_only_in_threshold_mode() {
        let all = vec![rec("a", 300.0, 0.0, 100.0, 400.0), rec("b", 320.0, 0.0, 100.0, 420.0)];
        let empty = ThresholdConfig::default();
        let view = TierView {
            all: &all,
            best: &[],
            worst: &[],
            neither: &all,
            overall_p95_latency_ms: 420.0,
            mode: ClassificationMode::RelativeRanking,
            thresholds: &empty,
        };
        let recs = recommendations(&view);
        assert!(recs.iter().all(|r| !r.starts_with("No endpoint meets")));
        assert!(recs.iter().all(|r| !r.starts_with("Most endpoints sit")));
    }
}

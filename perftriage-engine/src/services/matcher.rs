//! Endpoint Matcher
//!
//! Pairs measured endpoints with API declarations found in source.
//!
//! Scoring: Jaccard similarity over normalized path segments plus a method
//! bonus (capped at 1.0). Candidates at or above the cutoff are assigned
//! greedily, highest score first, so every record and every discovered API is
//! claimed at most once. Unmatched entities are reported, never raised.

use crate::services::classifier::meets_best;
use crate::services::path_normalizer::{self, NormalizedPath};
use perftriage_common::config::MatcherSettings;
use perftriage_common::{DiscoveredApi, MatchColor, MatchedApi, MeasurementRecord, ThresholdConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Response time (ms) above which a record is reported as slow
const ISSUE_RESPONSE_TIME_MS: f64 = 1000.0;
/// Error rate (%) above which a record is reported as failing
const ISSUE_ERROR_RATE_PERCENT: f64 = 5.0;
/// Throughput (rps) below which a record is reported as starved
const ISSUE_THROUGHPUT_RPS: f64 = 50.0;
/// p95 latency (ms) above which a record is reported as tail-heavy
const ISSUE_P95_MS: f64 = 2000.0;

/// Matcher tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatcherOptions {
    /// Minimum score for a candidate pair (inclusive)
    pub match_cutoff: f64,
    /// Added when methods agree or either is unknown
    pub method_bonus: f64,
}

impl Default for MatcherOptions {
    fn default() -> Self {
        Self {
            match_cutoff: 0.6,
            method_bonus: 0.15,
        }
    }
}

impl From<&MatcherSettings> for MatcherOptions {
    fn from(settings: &MatcherSettings) -> Self {
        Self {
            match_cutoff: settings.match_cutoff,
            method_bonus: settings.method_bonus,
        }
    }
}

/// How matched records are colored
#[derive(Debug, Clone, Copy)]
pub enum Tiering<'a> {
    /// Records are the worst tier: always red
    Worst,
    /// Records are the worst tier; ids also present in `best` and passing
    /// the default-policy best predicate are green
    WorstWithReference { best: &'a [MeasurementRecord] },
    /// Arbitrary record set: no color
    Untiered,
}

/// Overall outcome of a matching run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    NoMatches,
    PartialMatches,
    FullMatches,
}

/// Matches plus whatever was left unclaimed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    pub matches: Vec<MatchedApi>,
    /// Endpoint ids with no accepted pair, in input order
    pub unmatched_records: Vec<String>,
    /// Discovered APIs with no accepted pair, in input order
    pub unmatched_apis: Vec<DiscoveredApi>,
    pub status: MatchStatus,
}

#[derive(Debug)]
struct Candidate {
    record_idx: usize,
    api_idx: usize,
    score: f64,
}

/// Endpoint matcher
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    options: MatcherOptions,
}

impl Matcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: MatcherOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MatcherOptions {
        &self.options
    }

    /// Similarity between a measured endpoint id and a discovered API, in [0, 1]
    pub fn score(&self, endpoint_id: &str, api: &DiscoveredApi) -> f64 {
        let (record_method, record_path) = path_normalizer::normalize_endpoint(endpoint_id);
        self.score_normalized(record_method.as_deref(), &record_path, api)
    }

    fn score_normalized(
        &self,
        record_method: Option<&str>,
        record_path: &NormalizedPath,
        api: &DiscoveredApi,
    ) -> f64 {
        // Discovered paths may carry their own method prefix
        let (path_method, api_path) = path_normalizer::normalize_endpoint(&api.endpoint_path);
        let api_method = if path_normalizer::is_unknown_method(&api.http_method) {
            path_method
        } else {
            Some(api.http_method.trim().to_ascii_uppercase())
        };

        let methods_compatible = match (record_method, api_method.as_deref()) {
            (Some(a), Some(b)) => {
                path_normalizer::is_unknown_method(a)
                    || path_normalizer::is_unknown_method(b)
                    || a.eq_ignore_ascii_case(b)
            }
            _ => true,
        };

        let mut score = path_normalizer::jaccard(record_path, &api_path);
        if methods_compatible {
            score += self.options.method_bonus;
        }
        score.clamp(0.0, 1.0)
    }

    /// Match records against discovered APIs and report leftovers
    pub fn report(
        &self,
        records: &[MeasurementRecord],
        discovered: &[DiscoveredApi],
        tiering: Tiering<'_>,
    ) -> MatchReport {
        let candidates = self.candidates(records, discovered);

        let mut claimed_records = HashSet::new();
        let mut claimed_apis = HashSet::new();
        let mut matches = Vec::new();

        for candidate in candidates {
            if claimed_records.contains(&candidate.record_idx)
                || claimed_apis.contains(&candidate.api_idx)
            {
                continue;
            }
            claimed_records.insert(candidate.record_idx);
            claimed_apis.insert(candidate.api_idx);

            let record = &records[candidate.record_idx];
            let api = &discovered[candidate.api_idx];
            let color = color_for(record, tiering);

            tracing::debug!(
                endpoint = %record.endpoint_id,
                route = %api.endpoint_path,
                function = %api.function_name,
                confidence = candidate.score,
                color = ?color,
                "Matched endpoint"
            );

            matches.push(MatchedApi {
                endpoint_id: record.endpoint_id.clone(),
                discovered: api.clone(),
                confidence: candidate.score,
                color,
            });
        }

        let unmatched_records: Vec<String> = records
            .iter()
            .enumerate()
            .filter(|(i, _)| !claimed_records.contains(i))
            .map(|(_, r)| r.endpoint_id.clone())
            .collect();

        let unmatched_apis: Vec<DiscoveredApi> = discovered
            .iter()
            .enumerate()
            .filter(|(i, _)| !claimed_apis.contains(i))
            .map(|(_, api)| api.clone())
            .collect();

        for endpoint in &unmatched_records {
            tracing::debug!(endpoint = %endpoint, "No discovered API above cutoff");
        }

        let status = if matches.is_empty() {
            MatchStatus::NoMatches
        } else if matches.len() == records.len() {
            MatchStatus::FullMatches
        } else {
            MatchStatus::PartialMatches
        };

        tracing::info!(
            records = records.len(),
            discovered = discovered.len(),
            matched = matches.len(),
            status = ?status,
            "Endpoint matching complete"
        );

        MatchReport {
            matches,
            unmatched_records,
            unmatched_apis,
            status,
        }
    }

    /// Scored pairs at or above the cutoff, best first
    ///
    /// Ties keep discovered order, then record order.
    fn candidates(
        &self,
        records: &[MeasurementRecord],
        discovered: &[DiscoveredApi],
    ) -> Vec<Candidate> {
        let normalized: Vec<(Option<String>, NormalizedPath)> = records
            .iter()
            .map(|r| path_normalizer::normalize_endpoint(&r.endpoint_id))
            .collect();

        let mut candidates = Vec::new();
        for (record_idx, (method, path)) in normalized.iter().enumerate() {
            for (api_idx, api) in discovered.iter().enumerate() {
                let score = self.score_normalized(method.as_deref(), path, api);
                if score >= self.options.match_cutoff {
                    candidates.push(Candidate {
                        record_idx,
                        api_idx,
                        score,
                    });
                }
            }
        }

        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.api_idx.cmp(&b.api_idx))
                .then_with(|| a.record_idx.cmp(&b.record_idx))
        });
        candidates
    }
}

fn color_for(record: &MeasurementRecord, tiering: Tiering<'_>) -> MatchColor {
    match tiering {
        Tiering::Worst => MatchColor::Red,
        Tiering::Untiered => MatchColor::None,
        Tiering::WorstWithReference { best } => {
            let policy = ThresholdConfig::default_policy();
            let requalifies = best
                .iter()
                .filter(|b| b.endpoint_id == record.endpoint_id)
                .any(|b| meets_best(b, &policy));
            if requalifies {
                MatchColor::Green
            } else {
                MatchColor::Red
            }
        }
    }
}

/// Match worst-tier records against discovered APIs (every match red)
pub fn match_apis(worst: &[MeasurementRecord], discovered: &[DiscoveredApi]) -> Vec<MatchedApi> {
    Matcher::new()
        .report(worst, discovered, Tiering::Worst)
        .matches
}

/// Match worst-tier records, coloring re-qualifying best endpoints green
pub fn match_with_reference(
    worst: &[MeasurementRecord],
    best: &[MeasurementRecord],
    discovered: &[DiscoveredApi],
) -> Vec<MatchedApi> {
    Matcher::new()
        .report(worst, discovered, Tiering::WorstWithReference { best })
        .matches
}

/// Match an arbitrary record set (no color)
pub fn match_untiered(
    records: &[MeasurementRecord],
    discovered: &[DiscoveredApi],
) -> Vec<MatchedApi> {
    Matcher::new()
        .report(records, discovered, Tiering::Untiered)
        .matches
}

/// Human-readable performance problems for a record
pub fn performance_issues(record: &MeasurementRecord) -> Vec<String> {
    let mut issues = Vec::new();

    if record.avg_response_time_ms > ISSUE_RESPONSE_TIME_MS {
        issues.push(format!("High response time: {}ms", record.avg_response_time_ms));
    }
    if record.error_rate_percent > ISSUE_ERROR_RATE_PERCENT {
        issues.push(format!("High error rate: {}%", record.error_rate_percent));
    }
    if record.throughput_rps < ISSUE_THROUGHPUT_RPS {
        issues.push(format!("Low throughput: {} RPS", record.throughput_rps));
    }
    if record.p95_latency_ms > ISSUE_P95_MS {
        issues.push(format!("High 95th percentile latency: {}ms", record.p95_latency_ms));
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(path: &str, method: &str, function: &str) -> DiscoveredApi {
        DiscoveredApi {
            endpoint_path: path.to_string(),
            http_method: method.to_string(),
            file_path: "app/routes.py".to_string(),
            function_name: function.to_string(),
            framework_hint: "FastAPI".to_string(),
            snippet: String::new(),
            line_number: None,
        }
    }

    fn rec(id: &str) -> MeasurementRecord {
        MeasurementRecord::new(id, 2500.0, 15.0, 5.0, 3200.0)
    }

    #[test]
    fn test_parameterized_route_matches_literal_id() {
        let matches = match_apis(
            &[rec("GET /api/users/123")],
            &[api("/api/users/{id}", "GET", "get_user")],
        );
        assert_eq!(matches.len(), 1);
        assert!(matches[0].confidence >= 0.8);
        assert_eq!(matches[0].color, MatchColor::Red);
    }

    #[test]
    fn test_method_mismatch_loses_bonus() {
        let matcher = Matcher::new();
        let same = matcher.score("GET /api/orders", &api("/api/orders/{id}", "GET", "f"));
        let different = matcher.score("GET /api/orders", &api("/api/orders/{id}", "POST", "f"));
        let unknown = matcher.score("GET /api/orders", &api("/api/orders/{id}", "", "f"));
        assert!((same - (2.0 / 3.0 + 0.15)).abs() < 1e-12);
        assert!((different - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(same, unknown);
    }

    #[test]
    fn test_score_is_capped() {
        let score = Matcher::new().score("GET /health", &api("/health", "GET", "health"));
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_below_cutoff_is_unmatched() {
        let report = Matcher::new().report(
            &[rec("GET /api/reports/daily")],
            &[api("/admin/users", "GET", "list_users")],
            Tiering::Worst,
        );
        assert!(report.matches.is_empty());
        assert_eq!(report.status, MatchStatus::NoMatches);
        assert_eq!(report.unmatched_records, vec!["GET /api/reports/daily".to_string()]);
        assert_eq!(report.unmatched_apis.len(), 1);
    }

    #[test]
    fn test_greedy_assignment_is_one_to_one() {
        let records = [rec("GET /api/items/1"), rec("GET /api/items/2")];
        let discovered = [api("/api/items/{id}", "GET", "get_item")];
        let report = Matcher::new().report(&records, &discovered, Tiering::Worst);

        assert_eq!(report.matches.len(), 1);
        // Equal scores: record order decides
        assert_eq!(report.matches[0].endpoint_id, "GET /api/items/1");
        assert_eq!(report.status, MatchStatus::PartialMatches);
        assert_eq!(report.unmatched_records, vec!["GET /api/items/2".to_string()]);
    }

    #[test]
    fn test_ties_prefer_earlier_discovered_api() {
        let discovered = [
            api("/api/items/{id}", "GET", "first"),
            api("/api/items/:item_id", "GET", "second"),
        ];
        let matches = match_apis(&[rec("GET /api/items/9")], &discovered);
        assert_eq!(matches[0].discovered.function_name, "first");
    }

    #[test]
    fn test_reference_tier_colors_green() {
        let worst = [rec("GET /api/users/1"), rec("GET /api/orders/1")];
        let best = [MeasurementRecord::new("GET /api/users/1", 80.0, 0.1, 300.0, 150.0)];
        let discovered = [
            api("/api/users/{id}", "GET", "get_user"),
            api("/api/orders/{id}", "GET", "get_order"),
        ];

        let matches = match_with_reference(&worst, &best, &discovered);
        let color_of = |id: &str| matches.iter().find(|m| m.endpoint_id == id).map(|m| m.color);
        assert_eq!(color_of("GET /api/users/1"), Some(MatchColor::Green));
        assert_eq!(color_of("GET /api/orders/1"), Some(MatchColor::Red));
    }

    #[test]
    fn test_untiered_has_no_color() {
        let matches = match_untiered(&[rec("GET /a")], &[api("/a", "GET", "a")]);
        assert_eq!(matches[0].color, MatchColor::None);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(match_apis(&[], &[api("/a", "GET", "a")]).is_empty());
        assert!(match_apis(&[rec("GET /a")], &[]).is_empty());
    }

    #[test]
    fn test_performance_issues() {
        let issues = performance_issues(&rec("GET /slow"));
        assert_eq!(
            issues,
            vec![
                "High response time: 2500ms".to_string(),
                "High error rate: 15%".to_string(),
                "Low throughput: 5 RPS".to_string(),
                "High 95th percentile latency: 3200ms".to_string(),
            ]
        );
        assert!(performance_issues(&MeasurementRecord::new("ok", 10.0, 0.0, 100.0, 20.0)).is_empty());
    }

    #[test]
    fn test_options_from_settings() {
        let settings = MatcherSettings {
            match_cutoff: 0.7,
            method_bonus: 0.1,
        };
        let options = MatcherOptions::from(&settings);
        assert_eq!(options.match_cutoff, 0.7);
        assert_eq!(options.method_bonus, 0.1);
    }
}

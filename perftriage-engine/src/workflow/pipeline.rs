//! Analysis pipeline
//!
//! Measurements → classifier → worst tier × discovered APIs → matcher.
//! The result feeds [`super::suggestions`] and the result stores.
//!
//! # Example
//! ```rust,ignore
//! let pipeline = Pipeline::new(PipelineConfig::from(&config));
//! let report = pipeline.analyze(&records, &discovered)?;
//! let batch = generate_suggestions(&ctx, report.suggestion_requests(), cancel, None).await;
//! ```

use crate::db::{ResultStore, StoredAnalysis};
use crate::models::SuggestionRequest;
use crate::services::{
    ClassifierOptions, Classifier, ClassifyError, MatchReport, Matcher, MatcherOptions, Tiering,
};
use chrono::{DateTime, Utc};
use perftriage_common::config::TomlConfig;
use perftriage_common::{ClassifiedSet, DiscoveredApi, MeasurementRecord, ThresholdConfig, Tier};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Pipeline configuration
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub thresholds: ThresholdConfig,
    pub classifier: ClassifierOptions,
    pub matcher: MatcherOptions,
}

impl From<&TomlConfig> for PipelineConfig {
    fn from(config: &TomlConfig) -> Self {
        Self {
            thresholds: config.thresholds,
            classifier: ClassifierOptions::default(),
            matcher: MatcherOptions::from(&config.matcher),
        }
    }
}

/// Classification plus matching for one set of inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub analysis_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub classification: ClassifiedSet,
    pub matching: MatchReport,
}

impl AnalysisReport {
    /// One generator request per match, carrying the measured record
    pub fn suggestion_requests(&self) -> Vec<SuggestionRequest> {
        self.matching
            .matches
            .iter()
            .filter_map(|matched| {
                let tier = self.classification.tier_of(&matched.endpoint_id)?;
                let record = self
                    .classification
                    .records(tier)
                    .iter()
                    .find(|r| r.endpoint_id == matched.endpoint_id)?;
                Some(SuggestionRequest::new(record.clone(), matched.clone(), tier))
            })
            .collect()
    }

    /// Store key for one artifact of this analysis
    pub fn storage_key(&self, kind: &str) -> String {
        format!("{}/{}", self.analysis_id, kind)
    }
}

/// Analysis pipeline
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    thresholds: ThresholdConfig,
    classifier: Classifier,
    matcher: Matcher,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            thresholds: config.thresholds,
            classifier: Classifier::with_options(config.classifier),
            matcher: Matcher::with_options(config.matcher),
        }
    }

    /// Classify `records` and match the worst tier against `discovered`
    ///
    /// # Errors
    /// Any [`ClassifyError`]; matching itself cannot fail.
    pub fn analyze(
        &self,
        records: &[MeasurementRecord],
        discovered: &[DiscoveredApi],
    ) -> Result<AnalysisReport, ClassifyError> {
        let analysis_id = Uuid::new_v4();

        let classification = self.classifier.classify(records, &self.thresholds)?;
        let matching = self
            .matcher
            .report(classification.records(Tier::Worst), discovered, Tiering::Worst);

        tracing::info!(
            analysis_id = %analysis_id,
            endpoints = records.len(),
            worst = classification.worst.len(),
            discovered = discovered.len(),
            matched = matching.matches.len(),
            "Analysis complete"
        );

        Ok(AnalysisReport {
            analysis_id,
            created_at: Utc::now(),
            classification,
            matching,
        })
    }

    /// Store the classification and the matches under
    /// `{analysis_id}/classification` and `{analysis_id}/matches`
    pub async fn persist(
        &self,
        store: &dyn ResultStore,
        report: &AnalysisReport,
    ) -> perftriage_common::Result<()> {
        store
            .store(
                &report.storage_key("classification"),
                &StoredAnalysis::Classification(report.classification.clone()),
            )
            .await?;
        store
            .store(
                &report.storage_key("matches"),
                &StoredAnalysis::Matches(report.matching.matches.clone()),
            )
            .await?;
        Ok(())
    }
}

//! Per-sample and batch entry points.
//!
//! Each sample walks `enhanced models -> standard models -> formulas` and stops
//! at the first stage that yields both an HPI and a safety level. HEI, Cd and
//! EF always come from the formulas, whichever stage supplied the HPI.

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;

use crate::enhanced::{EnhancedPrediction, EnhancedPredictor};
use crate::indices::{IndexSet, SafetyLevel};
use crate::model::ModelRegistry;
use crate::narrative::risk_assessment;
use crate::predict::StandardPredictor;
use crate::recommend::{generate_recommendations, RecommendationInput};
use crate::sample::Sample;

/// Stage that produced a result's HPI and safety level.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
pub enum AnalysisPath {
    Enhanced,
    Standard,
    FormulaOnly,
}

/// Fully populated result for one sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedResult {
    pub sample_id: String,
    pub hpi: f64,
    pub hei: f64,
    pub cd: f64,
    /// `None` when the sample carries no iron.
    pub ef: Option<f64>,
    pub safety_level: SafetyLevel,
    pub risk_assessment: String,
    #[serde(rename = "isMLAnalysis")]
    pub is_ml_analysis: bool,
    pub is_anomaly: bool,
    pub anomaly_score: f64,
    #[serde(rename = "ensembleHPI")]
    pub ensemble_hpi: Option<f64>,
    pub confidence: Option<f64>,
    pub recommendations: Vec<String>,
    #[serde(skip)]
    pub path: AnalysisPath,
}

impl EnhancedResult {
    fn assemble(
        sample: &Sample,
        indices: IndexSet,
        hpi: f64,
        safety_level: SafetyLevel,
        path: AnalysisPath,
        extras: &EnhancedPrediction,
    ) -> Self {
        let recommendations = generate_recommendations(
            sample,
            &RecommendationInput {
                hpi,
                safety_level,
                is_anomaly: extras.is_anomaly,
                ensemble_hpi: extras.ensemble_hpi,
            },
        );
        EnhancedResult {
            sample_id: sample.sample_id.clone(),
            hpi,
            hei: indices.hei,
            cd: indices.cd,
            ef: indices.ef,
            safety_level,
            risk_assessment: risk_assessment(hpi, indices.hei, indices.cd),
            is_ml_analysis: path != AnalysisPath::FormulaOnly,
            is_anomaly: extras.is_anomaly,
            anomaly_score: extras.anomaly_score,
            ensemble_hpi: extras.ensemble_hpi,
            confidence: extras.confidence,
            recommendations,
            path,
        }
    }

    /// Result computed from the formulas alone.
    pub fn from_formulas(sample: &Sample) -> Self {
        let indices = IndexSet::compute(sample);
        Self::assemble(
            sample,
            indices,
            indices.hpi,
            SafetyLevel::from_hpi(indices.hpi),
            AnalysisPath::FormulaOnly,
            &EnhancedPrediction::UNAVAILABLE,
        )
    }
}

/// Runs the fallback chain against injected model registries.
///
/// Either registry may be absent; with neither, every result comes from the
/// formulas.
#[derive(Debug, Clone, Default)]
pub struct Orchestrator {
    enhanced: Option<Arc<ModelRegistry>>,
    standard: Option<Arc<ModelRegistry>>,
}

impl Orchestrator {
    pub fn formula_only() -> Self {
        Self::default()
    }

    pub fn with_enhanced(mut self, registry: ModelRegistry) -> Self {
        self.enhanced = Some(Arc::new(registry));
        self
    }

    pub fn with_standard(mut self, registry: ModelRegistry) -> Self {
        self.standard = Some(Arc::new(registry));
        self
    }

    /// Standard models, then formulas. Enhanced fields stay at their defaults.
    pub fn calculate_pollution_indices(&self, sample: &Sample) -> EnhancedResult {
        let indices = IndexSet::compute(sample);
        if let Some(result) = self.try_standard(sample, indices) {
            return result;
        }
        self.formula_fallback(sample, indices)
    }

    /// Enhanced models, then standard models, then formulas.
    pub fn calculate_pollution_indices_enhanced(&self, sample: &Sample) -> EnhancedResult {
        let indices = IndexSet::compute(sample);

        if let Some(registry) = &self.enhanced {
            let prediction = EnhancedPredictor::new(registry).predict(sample);
            if let Some((hpi, level)) = prediction.primary().accepted() {
                tracing::debug!(sample_id = %sample.sample_id, hpi, %level, "enhanced models accepted");
                return EnhancedResult::assemble(
                    sample,
                    indices,
                    hpi,
                    level,
                    AnalysisPath::Enhanced,
                    &prediction,
                );
            }
        }

        if let Some(result) = self.try_standard(sample, indices) {
            return result;
        }
        self.formula_fallback(sample, indices)
    }

    fn try_standard(&self, sample: &Sample, indices: IndexSet) -> Option<EnhancedResult> {
        let registry = self.standard.as_ref()?;
        let (hpi, level) = StandardPredictor::new(registry).predict(sample).accepted()?;
        tracing::debug!(sample_id = %sample.sample_id, hpi, %level, "standard models accepted");
        Some(EnhancedResult::assemble(
            sample,
            indices,
            hpi,
            level,
            AnalysisPath::Standard,
            &EnhancedPrediction::UNAVAILABLE,
        ))
    }

    fn formula_fallback(&self, sample: &Sample, indices: IndexSet) -> EnhancedResult {
        tracing::debug!(sample_id = %sample.sample_id, "falling back to formulas");
        EnhancedResult::assemble(
            sample,
            indices,
            indices.hpi,
            SafetyLevel::from_hpi(indices.hpi),
            AnalysisPath::FormulaOnly,
            &EnhancedPrediction::UNAVAILABLE,
        )
    }

    /// Sequential batch, in input order.
    pub fn calculate_many(&self, samples: &[Sample]) -> Vec<EnhancedResult> {
        samples
            .iter()
            .map(|s| self.calculate_pollution_indices_enhanced(s))
            .collect()
    }

    /// Concurrent batch on the blocking pool, results in input order.
    ///
    /// Dropping the returned future aborts samples that have not started. A
    /// sample whose task panics gets a formula-only result.
    pub async fn calculate_batch(&self, samples: Vec<Sample>) -> Vec<EnhancedResult> {
        let samples = Arc::new(samples);
        let mut tasks = JoinSet::new();
        for index in 0..samples.len() {
            let orchestrator = self.clone();
            let samples = Arc::clone(&samples);
            tasks.spawn_blocking(move || {
                (
                    index,
                    orchestrator.calculate_pollution_indices_enhanced(&samples[index]),
                )
            });
        }

        let mut slots: Vec<Option<EnhancedResult>> = vec![None; samples.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(err) => tracing::error!(error = %err, "sample task failed"),
            }
        }

        let results: Vec<EnhancedResult> = slots
            .into_iter()
            .zip(samples.iter())
            .map(|(slot, sample)| slot.unwrap_or_else(|| EnhancedResult::from_formulas(sample)))
            .collect();

        let summary = BatchSummary::from_results(&results);
        tracing::info!(
            total = summary.total,
            ml = summary.ml_analyses,
            anomalies = summary.anomalies,
            critical = summary.critical,
            "batch complete"
        );
        results
    }
}

/// Aggregate view over a batch of results.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total: usize,
    pub safe: usize,
    pub moderate: usize,
    pub high: usize,
    pub critical: usize,
    pub ml_analyses: usize,
    pub anomalies: usize,
    pub mean_hpi: Option<f64>,
    pub mean_hei: Option<f64>,
    pub mean_cd: Option<f64>,
    /// Mean over the results with a defined EF.
    pub mean_ef: Option<f64>,
}

impl BatchSummary {
    pub fn from_results(results: &[EnhancedResult]) -> Self {
        let mut summary = BatchSummary {
            total: results.len(),
            ..Default::default()
        };
        for r in results {
            match r.safety_level {
                SafetyLevel::Safe => summary.safe += 1,
                SafetyLevel::Moderate => summary.moderate += 1,
                SafetyLevel::High => summary.high += 1,
                SafetyLevel::Critical => summary.critical += 1,
            }
            summary.ml_analyses += usize::from(r.is_ml_analysis);
            summary.anomalies += usize::from(r.is_anomaly);
        }
        summary.mean_hpi = mean(results.iter().map(|r| r.hpi));
        summary.mean_hei = mean(results.iter().map(|r| r.hei));
        summary.mean_cd = mean(results.iter().map(|r| r.cd));
        summary.mean_ef = mean(results.iter().filter_map(|r| r.ef));
        summary
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

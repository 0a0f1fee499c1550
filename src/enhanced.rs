//! Enhanced adapter: regression and classifier plus an anomaly detector and
//! an ensemble of independent HPI regressors.
//!
//! Each sub-step degrades on its own. A missing anomaly model only zeroes the
//! anomaly fields; a failing ensemble member is skipped and the rest still
//! contribute to the estimate.

use serde::Serialize;

use crate::error::ModelError;
use crate::indices::SafetyLevel;
use crate::model::{predict_scalar, ModelHandle, ModelRegistry};
use crate::predict::{model_input, regress_and_classify, MlPrediction};
use crate::sample::Sample;

/// Scores strictly above this flag the sample as anomalous.
pub const ANOMALY_THRESHOLD: f64 = 0.8;

#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyAssessment {
    pub is_anomaly: bool,
    pub anomaly_score: f64,
}

impl AnomalyAssessment {
    pub const UNAVAILABLE: AnomalyAssessment = AnomalyAssessment {
        is_anomaly: false,
        anomaly_score: 0.0,
    };

    /// A non-finite score counts as no assessment.
    pub fn from_score(score: f64) -> Self {
        if !score.is_finite() {
            return AnomalyAssessment::UNAVAILABLE;
        }
        let anomaly_score = score.clamp(0.0, 1.0);
        AnomalyAssessment {
            is_anomaly: anomaly_score > ANOMALY_THRESHOLD,
            anomaly_score,
        }
    }
}

/// Mean of the ensemble outputs and an agreement score derived from their
/// population variance, `1 / (1 + variance)`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsembleEstimate {
    #[serde(rename = "ensembleHPI")]
    pub ensemble_hpi: f64,
    pub confidence: f64,
}

impl EnsembleEstimate {
    /// `None` when no member produced an output.
    pub fn from_outputs(outputs: &[f64]) -> Option<Self> {
        if outputs.is_empty() {
            return None;
        }
        let n = outputs.len() as f64;
        let mean = outputs.iter().sum::<f64>() / n;
        let variance = outputs.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(EnsembleEstimate {
            ensemble_hpi: mean,
            confidence: 1.0 / (1.0 + variance),
        })
    }
}

/// Run every member on the same input, skipping members that fail.
pub fn ensemble_predict(input: &[f64], members: &[Box<dyn ModelHandle>]) -> Vec<f64> {
    members
        .iter()
        .enumerate()
        .filter_map(|(i, member)| match predict_scalar(member.as_ref(), input) {
            Ok(v) => Some(v),
            Err(err) => {
                tracing::warn!(member = i, error = %err, "ensemble member failed, skipping");
                None
            }
        })
        .collect()
}

/// Combined output of the enhanced adapter.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedPrediction {
    pub hpi: Option<f64>,
    pub safety_level: Option<SafetyLevel>,
    pub is_anomaly: bool,
    pub anomaly_score: f64,
    #[serde(rename = "ensembleHPI")]
    pub ensemble_hpi: Option<f64>,
    pub confidence: Option<f64>,
}

impl EnhancedPrediction {
    pub const UNAVAILABLE: EnhancedPrediction = EnhancedPrediction {
        hpi: None,
        safety_level: None,
        is_anomaly: false,
        anomaly_score: 0.0,
        ensemble_hpi: None,
        confidence: None,
    };

    pub fn primary(&self) -> MlPrediction {
        MlPrediction {
            hpi: self.hpi,
            safety_level: self.safety_level,
        }
    }

    pub fn anomaly(&self) -> AnomalyAssessment {
        AnomalyAssessment {
            is_anomaly: self.is_anomaly,
            anomaly_score: self.anomaly_score,
        }
    }

    pub fn ensemble(&self) -> Option<EnsembleEstimate> {
        self.ensemble_hpi
            .zip(self.confidence)
            .map(|(ensemble_hpi, confidence)| EnsembleEstimate {
                ensemble_hpi,
                confidence,
            })
    }
}

#[derive(Debug, Copy, Clone)]
pub struct EnhancedPredictor<'a> {
    registry: &'a ModelRegistry,
}

impl<'a> EnhancedPredictor<'a> {
    pub fn new(registry: &'a ModelRegistry) -> Self {
        Self { registry }
    }

    pub fn try_detect_anomalies(&self, sample: &Sample) -> Result<AnomalyAssessment, ModelError> {
        let model = self
            .registry
            .anomaly
            .as_deref()
            .ok_or(ModelError::Unavailable("anomaly model not loaded"))?;
        let input = model_input(self.registry, sample)?;
        Ok(AnomalyAssessment::from_score(predict_scalar(model, &input)?))
    }

    /// `{false, 0}` whenever the detector cannot run.
    pub fn detect_anomalies(&self, sample: &Sample) -> AnomalyAssessment {
        self.try_detect_anomalies(sample).unwrap_or_else(|err| {
            tracing::debug!(sample_id = %sample.sample_id, error = %err, "anomaly detection unavailable");
            AnomalyAssessment::UNAVAILABLE
        })
    }

    /// Outputs of every ensemble member that succeeded.
    pub fn ensemble_outputs(&self, sample: &Sample) -> Vec<f64> {
        match model_input(self.registry, sample) {
            Ok(input) => ensemble_predict(&input, &self.registry.ensemble),
            Err(_) => Vec::new(),
        }
    }

    pub fn predict(&self, sample: &Sample) -> EnhancedPrediction {
        let input = match model_input(self.registry, sample) {
            Ok(input) => input,
            Err(err) => {
                tracing::debug!(sample_id = %sample.sample_id, error = %err, "enhanced prediction unavailable");
                return EnhancedPrediction::UNAVAILABLE;
            }
        };

        let primary: MlPrediction = regress_and_classify(self.registry, &input).into();
        let ensemble = EnsembleEstimate::from_outputs(&ensemble_predict(&input, &self.registry.ensemble));
        let anomaly = self.detect_anomalies(sample);

        EnhancedPrediction {
            hpi: primary.hpi,
            safety_level: primary.safety_level,
            is_anomaly: anomaly.is_anomaly,
            anomaly_score: anomaly.anomaly_score,
            ensemble_hpi: ensemble.map(|e| e.ensemble_hpi),
            confidence: ensemble.map(|e| e.confidence),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::tests::{identity_params, standard_registry, Failing, Fixed};
    use proptest::prelude::*;

    fn sample() -> Sample {
        Sample::new("E", 0.0, 0.0, [0.01, 0.01, 0.003, 0.05, 2.0, 0.3, 3.0])
    }

    #[test]
    fn anomaly_threshold_is_strict() {
        assert!(AnomalyAssessment::from_score(0.95).is_anomaly);
        assert!(!AnomalyAssessment::from_score(0.5).is_anomaly);
        assert!(!AnomalyAssessment::from_score(0.8).is_anomaly);
    }

    #[test]
    fn anomaly_model_scores() {
        let registry = standard_registry(100.0, vec![1.0, 0.0, 0.0, 0.0])
            .with_anomaly(Box::new(Fixed(vec![0.95])));
        let a = EnhancedPredictor::new(&registry).detect_anomalies(&sample());
        assert!(a.is_anomaly);
        assert_eq!(a.anomaly_score, 0.95);

        let registry = standard_registry(100.0, vec![1.0, 0.0, 0.0, 0.0])
            .with_anomaly(Box::new(Fixed(vec![0.5])));
        let a = EnhancedPredictor::new(&registry).detect_anomalies(&sample());
        assert!(!a.is_anomaly);
    }

    #[test]
    fn missing_anomaly_model_is_not_an_error() {
        let registry = standard_registry(100.0, vec![1.0, 0.0, 0.0, 0.0]);
        assert_eq!(
            EnhancedPredictor::new(&registry).detect_anomalies(&sample()),
            AnomalyAssessment::UNAVAILABLE
        );
    }

    #[test]
    fn identical_outputs_give_full_confidence() {
        let e = EnsembleEstimate::from_outputs(&[100.0, 100.0, 100.0]).unwrap();
        assert_eq!(e.ensemble_hpi, 100.0);
        assert_eq!(e.confidence, 1.0);
    }

    #[test]
    fn spread_outputs_lower_confidence() {
        let e = EnsembleEstimate::from_outputs(&[80.0, 100.0, 120.0]).unwrap();
        assert!((e.ensemble_hpi - 100.0).abs() < 1e-12);
        assert!(e.confidence < 1.0);
        assert!((e.confidence - 1.0 / (1.0 + 800.0 / 3.0)).abs() < 1e-12);
    }

    #[test]
    fn nan_score_is_not_an_anomaly() {
        assert_eq!(AnomalyAssessment::from_score(f64::NAN), AnomalyAssessment::UNAVAILABLE);
        let registry = standard_registry(100.0, vec![1.0, 0.0, 0.0, 0.0])
            .with_anomaly(Box::new(Fixed(vec![f64::NAN])));
        assert_eq!(
            EnhancedPredictor::new(&registry).detect_anomalies(&sample()),
            AnomalyAssessment::UNAVAILABLE
        );
    }

    #[test]
    fn nan_ensemble_member_is_skipped() {
        let members: Vec<Box<dyn ModelHandle>> = vec![
            Box::new(Fixed(vec![100.0])),
            Box::new(Fixed(vec![f64::NAN])),
        ];
        assert_eq!(ensemble_predict(&[0.0; 7], &members), vec![100.0]);
    }

    #[test]
    fn nan_primary_outputs_leave_only_finite_fields() {
        let registry = ModelRegistry::empty()
            .with_standard(
                Box::new(Fixed(vec![f64::NAN])),
                Box::new(Fixed(vec![f64::NAN; 4])),
                identity_params(),
            )
            .with_anomaly(Box::new(Fixed(vec![f64::NAN])))
            .with_ensemble_member(Box::new(Fixed(vec![100.0])))
            .with_ensemble_member(Box::new(Fixed(vec![f64::NAN])));
        let p = EnhancedPredictor::new(&registry).predict(&sample());
        assert_eq!(p.primary(), MlPrediction::UNAVAILABLE);
        assert!(!p.is_anomaly);
        assert_eq!(p.anomaly_score, 0.0);
        assert_eq!(p.ensemble_hpi, Some(100.0));
        assert_eq!(p.confidence, Some(1.0));
    }

    #[test]
    fn no_outputs_no_estimate() {
        assert!(EnsembleEstimate::from_outputs(&[]).is_none());
    }

    #[test]
    fn failing_members_are_skipped() {
        let members: Vec<Box<dyn ModelHandle>> = vec![
            Box::new(Fixed(vec![90.0])),
            Box::new(Failing),
            Box::new(Fixed(vec![110.0])),
        ];
        assert_eq!(ensemble_predict(&[0.0; 7], &members), vec![90.0, 110.0]);
    }

    #[test]
    fn all_members_failing_nulls_ensemble_fields() {
        let registry = standard_registry(120.0, vec![0.0, 1.0, 0.0, 0.0])
            .with_ensemble_member(Box::new(Failing))
            .with_ensemble_member(Box::new(Failing));
        let p = EnhancedPredictor::new(&registry).predict(&sample());
        assert_eq!(p.hpi, Some(120.0));
        assert_eq!(p.safety_level, Some(SafetyLevel::Moderate));
        assert_eq!(p.ensemble_hpi, None);
        assert_eq!(p.confidence, None);
        assert!(p.ensemble().is_none());
    }

    #[test]
    fn full_enhanced_prediction() {
        let registry = standard_registry(150.0, vec![0.0, 0.9, 0.1, 0.0])
            .with_anomaly(Box::new(Fixed(vec![0.9])))
            .with_ensemble_member(Box::new(Fixed(vec![140.0])))
            .with_ensemble_member(Box::new(Fixed(vec![160.0])));
        let p = EnhancedPredictor::new(&registry).predict(&sample());
        assert_eq!(p.primary().accepted(), Some((150.0, SafetyLevel::Moderate)));
        assert!(p.is_anomaly);
        assert_eq!(p.ensemble_hpi, Some(150.0));
        assert_eq!(p.confidence, Some(1.0 / 101.0));
    }

    #[test]
    fn failing_primary_keeps_other_substeps() {
        let registry = ModelRegistry::empty()
            .with_standard(Box::new(Failing), Box::new(Fixed(vec![1.0])), identity_params())
            .with_anomaly(Box::new(Fixed(vec![0.3])))
            .with_ensemble_member(Box::new(Fixed(vec![42.0])));
        let p = EnhancedPredictor::new(&registry).predict(&sample());
        assert_eq!(p.primary(), MlPrediction::UNAVAILABLE);
        assert_eq!(p.anomaly_score, 0.3);
        assert_eq!(p.ensemble_hpi, Some(42.0));
    }

    #[test]
    fn no_preprocessing_means_nothing_runs() {
        let registry = ModelRegistry::empty().with_anomaly(Box::new(Fixed(vec![0.99])));
        assert_eq!(
            EnhancedPredictor::new(&registry).predict(&sample()),
            EnhancedPrediction::UNAVAILABLE
        );
        assert!(EnhancedPredictor::new(&registry).ensemble_outputs(&sample()).is_empty());
    }

    proptest! {
        #[test]
        fn confidence_is_bounded(outputs in prop::collection::vec(-1000.0..1000.0f64, 1..8)) {
            let e = EnsembleEstimate::from_outputs(&outputs).unwrap();
            prop_assert!(e.confidence > 0.0 && e.confidence <= 1.0);
        }

        #[test]
        fn identical_outputs_always_full_confidence(v in -1000.0..1000.0f64, n in 1usize..8) {
            let e = EnsembleEstimate::from_outputs(&vec![v; n]).unwrap();
            prop_assert_eq!(e.confidence, 1.0);
        }

        #[test]
        fn disagreement_always_below_full_confidence(
            v in -1000.0..1000.0f64,
            gap in 0.001..100.0f64,
        ) {
            let e = EnsembleEstimate::from_outputs(&[v, v + gap]).unwrap();
            prop_assert!(e.confidence < 1.0);
        }
    }
}

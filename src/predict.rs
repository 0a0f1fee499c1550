use serde::Serialize;

use crate::error::ModelError;
use crate::indices::SafetyLevel;
use crate::model::{predict_class, predict_scalar, ModelRegistry, FEATURE_COUNT};
use crate::sample::Sample;

/// Regression HPI and classified safety level. Both `None` means the models
/// could not answer and the formulas should be used instead.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MlPrediction {
    pub hpi: Option<f64>,
    pub safety_level: Option<SafetyLevel>,
}

impl MlPrediction {
    pub const UNAVAILABLE: MlPrediction = MlPrediction {
        hpi: None,
        safety_level: None,
    };

    /// Both fields present.
    pub fn accepted(&self) -> Option<(f64, SafetyLevel)> {
        self.hpi.zip(self.safety_level)
    }
}

impl From<Result<(f64, SafetyLevel), ModelError>> for MlPrediction {
    fn from(result: Result<(f64, SafetyLevel), ModelError>) -> Self {
        match result {
            Ok((hpi, level)) => MlPrediction {
                hpi: Some(hpi),
                safety_level: Some(level),
            },
            Err(_) => MlPrediction::UNAVAILABLE,
        }
    }
}

/// Standardized model input for a sample.
pub fn model_input(
    registry: &ModelRegistry,
    sample: &Sample,
) -> Result<[f64; FEATURE_COUNT], ModelError> {
    let params = registry
        .preprocessing
        .as_ref()
        .ok_or(ModelError::Unavailable("preprocessing parameters not loaded"))?;
    Ok(params.standardize(&sample.features()))
}

/// Run the regression and classifier models on an already standardized input.
pub fn regress_and_classify(
    registry: &ModelRegistry,
    input: &[f64],
) -> Result<(f64, SafetyLevel), ModelError> {
    let regression = registry
        .regression
        .as_deref()
        .ok_or(ModelError::Unavailable("regression model not loaded"))?;
    let classifier = registry
        .classifier
        .as_deref()
        .ok_or(ModelError::Unavailable("classification model not loaded"))?;

    let hpi = predict_scalar(regression, input)?;
    let class = predict_class(classifier, input)?;
    let level = SafetyLevel::from_class_index(class)
        .ok_or_else(|| ModelError::Inference(format!("classifier returned class {class}")))?;
    Ok((hpi, level))
}

/// Regression + classifier adapter.
#[derive(Debug, Copy, Clone)]
pub struct StandardPredictor<'a> {
    registry: &'a ModelRegistry,
}

impl<'a> StandardPredictor<'a> {
    pub fn new(registry: &'a ModelRegistry) -> Self {
        Self { registry }
    }

    pub fn try_predict(&self, sample: &Sample) -> Result<(f64, SafetyLevel), ModelError> {
        let input = model_input(self.registry, sample)?;
        regress_and_classify(self.registry, &input)
    }

    /// Never fails; any error becomes [`MlPrediction::UNAVAILABLE`].
    pub fn predict(&self, sample: &Sample) -> MlPrediction {
        let result = self.try_predict(sample);
        if let Err(err) = &result {
            tracing::debug!(sample_id = %sample.sample_id, error = %err, "standard prediction unavailable");
        }
        result.into()
    }
}

//! Model handles, preprocessing and the registry the adapters read from.
//!
//! The adapters only see [`ModelHandle`]. [`DenseModel`] is the in-crate
//! runtime for exported feed-forward networks; tests and other runtimes can
//! supply their own handles.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Number of model input features (one per metal).
pub const FEATURE_COUNT: usize = 7;

/// Opaque inference capability.
pub trait ModelHandle: Send + Sync {
    /// Run one forward pass. Output buffers are owned by the caller and
    /// released when it drops them.
    fn predict(&self, input: &[f64]) -> Result<Vec<f64>, ModelError>;

    /// Release runtime resources. Called once when the owning registry drops.
    fn dispose(&self) {}
}

/// Per-feature standardization parameters exported alongside the models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingParams {
    pub feature_means: Vec<f64>,
    pub feature_stds: Vec<f64>,
    #[serde(default)]
    pub feature_names: Vec<String>,
}

impl PreprocessingParams {
    /// `(v - mean) / std` per feature. A missing mean counts as 0, a missing
    /// or zero std as 1.
    pub fn standardize(&self, features: &[f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for (i, (slot, value)) in out.iter_mut().zip(features).enumerate() {
            let mean = self
                .feature_means
                .get(i)
                .copied()
                .filter(|m| m.is_finite())
                .unwrap_or(0.0);
            let std = self
                .feature_stds
                .get(i)
                .copied()
                .filter(|s| s.is_finite() && *s != 0.0)
                .unwrap_or(1.0);
            *slot = (value - mean) / std;
        }
        out
    }

    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Linear,
    Relu,
    Sigmoid,
    Tanh,
    Softmax,
}

impl Activation {
    fn apply(self, values: &mut [f64]) {
        match self {
            Activation::Linear => {}
            Activation::Relu => values.iter_mut().for_each(|v| *v = v.max(0.0)),
            Activation::Sigmoid => values.iter_mut().for_each(|v| *v = 1.0 / (1.0 + (-*v).exp())),
            Activation::Tanh => values.iter_mut().for_each(|v| *v = v.tanh()),
            Activation::Softmax => {
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let mut sum = 0.0;
                for v in values.iter_mut() {
                    *v = (*v - max).exp();
                    sum += *v;
                }
                if sum > 0.0 {
                    values.iter_mut().for_each(|v| *v /= sum);
                }
            }
        }
    }
}

/// One fully-connected layer; `weights[j]` holds the input weights of unit `j`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    #[serde(default = "default_activation")]
    pub activation: Activation,
}

fn default_activation() -> Activation {
    Activation::Linear
}

#[derive(Debug, Clone, Deserialize)]
struct DenseModelFile {
    input_dim: usize,
    layers: Vec<DenseLayer>,
}

/// Sequential feed-forward network.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "DenseModelFile")]
pub struct DenseModel {
    input_dim: usize,
    layers: Vec<DenseLayer>,
}

impl TryFrom<DenseModelFile> for DenseModel {
    type Error = ModelError;

    fn try_from(file: DenseModelFile) -> Result<Self, Self::Error> {
        DenseModel::new(file.input_dim, file.layers)
    }
}

impl DenseModel {
    /// Checks that every layer's width chains into the next.
    pub fn new(input_dim: usize, layers: Vec<DenseLayer>) -> Result<Self, ModelError> {
        if layers.is_empty() {
            return Err(ModelError::Inference("model has no layers".into()));
        }
        let mut width = input_dim;
        for layer in &layers {
            if layer.bias.len() != layer.weights.len() {
                return Err(ModelError::ShapeMismatch {
                    expected: layer.weights.len(),
                    got: layer.bias.len(),
                });
            }
            if let Some(row) = layer.weights.iter().find(|row| row.len() != width) {
                return Err(ModelError::ShapeMismatch {
                    expected: width,
                    got: row.len(),
                });
            }
            width = layer.weights.len();
        }
        Ok(DenseModel { input_dim, layers })
    }

    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn output_dim(&self) -> usize {
        self.layers.last().map_or(0, |l| l.weights.len())
    }
}

impl ModelHandle for DenseModel {
    fn predict(&self, input: &[f64]) -> Result<Vec<f64>, ModelError> {
        if input.len() != self.input_dim {
            return Err(ModelError::ShapeMismatch {
                expected: self.input_dim,
                got: input.len(),
            });
        }
        let mut activations = input.to_vec();
        for layer in &self.layers {
            let mut next: Vec<f64> = layer
                .weights
                .iter()
                .zip(&layer.bias)
                .map(|(row, b)| row.iter().zip(&activations).map(|(w, x)| w * x).sum::<f64>() + b)
                .collect();
            layer.activation.apply(&mut next);
            activations = next;
        }
        if activations.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::Inference("non-finite model output".into()));
        }
        Ok(activations)
    }
}

/// Forward pass whose output must be non-empty and finite.
fn finite_output(model: &dyn ModelHandle, input: &[f64]) -> Result<Vec<f64>, ModelError> {
    let output = model.predict(input)?;
    if output.is_empty() {
        return Err(ModelError::ShapeMismatch { expected: 1, got: 0 });
    }
    if output.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::Inference("non-finite model output".into()));
    }
    Ok(output)
}

/// Read the first output of a forward pass as a scalar.
pub fn predict_scalar(model: &dyn ModelHandle, input: &[f64]) -> Result<f64, ModelError> {
    Ok(finite_output(model, input)?[0])
}

/// Index of the largest output of a forward pass. Ties go to the first.
pub fn predict_class(model: &dyn ModelHandle, input: &[f64]) -> Result<usize, ModelError> {
    let output = finite_output(model, input)?;
    let mut best = 0;
    for (i, &p) in output.iter().enumerate().skip(1) {
        if p > output[best] {
            best = i;
        }
    }
    Ok(best)
}

/// Loaded model handles. Any slot may be empty; adapters degrade per slot.
///
/// Dropping the registry disposes every handle it owns.
#[derive(Default)]
pub struct ModelRegistry {
    pub regression: Option<Box<dyn ModelHandle>>,
    pub classifier: Option<Box<dyn ModelHandle>>,
    pub anomaly: Option<Box<dyn ModelHandle>>,
    pub ensemble: Vec<Box<dyn ModelHandle>>,
    pub preprocessing: Option<PreprocessingParams>,
}

impl ModelRegistry {
    /// Registry with no models: every calculation takes the formula path.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_standard(
        mut self,
        regression: Box<dyn ModelHandle>,
        classifier: Box<dyn ModelHandle>,
        preprocessing: PreprocessingParams,
    ) -> Self {
        self.regression = Some(regression);
        self.classifier = Some(classifier);
        self.preprocessing = Some(preprocessing);
        self
    }

    pub fn with_anomaly(mut self, anomaly: Box<dyn ModelHandle>) -> Self {
        self.anomaly = Some(anomaly);
        self
    }

    pub fn with_ensemble_member(mut self, member: Box<dyn ModelHandle>) -> Self {
        self.ensemble.push(member);
        self
    }

    /// Regression, classifier and preprocessing are all present.
    pub fn has_standard(&self) -> bool {
        self.regression.is_some() && self.classifier.is_some() && self.preprocessing.is_some()
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("regression", &self.regression.is_some())
            .field("classifier", &self.classifier.is_some())
            .field("anomaly", &self.anomaly.is_some())
            .field("ensemble", &self.ensemble.len())
            .field("preprocessing", &self.preprocessing.is_some())
            .finish()
    }
}

impl Drop for ModelRegistry {
    fn drop(&mut self) {
        let handles = self
            .regression
            .iter()
            .chain(self.classifier.iter())
            .chain(self.anomaly.iter())
            .chain(self.ensemble.iter());
        for handle in handles {
            handle.dispose();
        }
    }
}

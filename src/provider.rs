//! Asynchronous model loading.
//!
//! Loading happens once, outside the per-sample path. A provider returns
//! `None` instead of an error so callers can hand the orchestrator an empty
//! registry and carry on with the formulas.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::model::{DenseModel, ModelHandle, ModelRegistry, PreprocessingParams};

// ---- Configuration -------------------------------------------------------

/// Where the exported model files live. File names are relative to
/// `models_dir`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub models_dir: PathBuf,
    pub regression: String,
    pub classifier: String,
    pub anomaly: String,
    pub ensemble: Vec<String>,
    pub preprocessing: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("models"),
            regression: "heavy_metal_model.json".into(),
            classifier: "safety_classifier.json".into(),
            anomaly: "anomaly_detector.json".into(),
            ensemble: (1..=3).map(|i| format!("ensemble_model_{i}.json")).collect(),
            preprocessing: "preprocessing_params.json".into(),
        }
    }
}

impl ProviderConfig {
    pub fn with_models_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.models_dir = dir.into();
        self
    }

    /// Missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.models_dir.join(file)
    }
}

// ---- Loaded model sets ---------------------------------------------------

/// Everything the standard adapter needs.
pub struct StandardModels {
    pub regression: Box<dyn ModelHandle>,
    pub classifier: Box<dyn ModelHandle>,
    pub preprocessing: PreprocessingParams,
}

impl StandardModels {
    pub fn into_registry(self) -> ModelRegistry {
        ModelRegistry::empty().with_standard(self.regression, self.classifier, self.preprocessing)
    }
}

/// Standard models plus whatever optional enhanced models loaded.
pub struct EnhancedModels {
    pub standard: StandardModels,
    pub anomaly: Option<Box<dyn ModelHandle>>,
    pub ensemble: Vec<Box<dyn ModelHandle>>,
}

impl EnhancedModels {
    pub fn into_registry(self) -> ModelRegistry {
        let mut registry = self.standard.into_registry();
        registry.anomaly = self.anomaly;
        registry.ensemble = self.ensemble;
        registry
    }
}

// ---- Providers -----------------------------------------------------------

#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// `None` if any required model failed to load.
    async fn load_standard_models(&self) -> Option<StandardModels>;

    /// `None` only if the standard part failed; optional models are skipped.
    async fn load_enhanced_models(&self) -> Option<EnhancedModels>;

    /// Registry for the orchestrator, empty when nothing loaded.
    async fn standard_registry(&self) -> ModelRegistry {
        self.load_standard_models()
            .await
            .map_or_else(ModelRegistry::empty, StandardModels::into_registry)
    }

    async fn enhanced_registry(&self) -> ModelRegistry {
        self.load_enhanced_models()
            .await
            .map_or_else(ModelRegistry::empty, EnhancedModels::into_registry)
    }
}

/// Reads [`DenseModel`] and [`PreprocessingParams`] JSON files from disk.
#[derive(Debug, Clone, Default)]
pub struct JsonModelProvider {
    config: ProviderConfig,
}

impl JsonModelProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn read(path: &Path) -> Result<String, ModelError> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ModelError::Load {
                path: path.to_path_buf(),
                source,
            })
    }

    async fn load_model(&self, file: &str) -> Result<Box<dyn ModelHandle>, ModelError> {
        let json = Self::read(&self.config.path(file)).await?;
        Ok(Box::new(DenseModel::from_json(&json)?))
    }

    async fn load_preprocessing(&self) -> Result<PreprocessingParams, ModelError> {
        let json = Self::read(&self.config.path(&self.config.preprocessing)).await?;
        PreprocessingParams::from_json(&json)
    }

    async fn try_load_standard(&self) -> Result<StandardModels, ModelError> {
        let regression = self.load_model(&self.config.regression).await?;
        let classifier = self.load_model(&self.config.classifier).await?;
        let preprocessing = self.load_preprocessing().await?;
        Ok(StandardModels {
            regression,
            classifier,
            preprocessing,
        })
    }
}

#[async_trait]
impl ModelProvider for JsonModelProvider {
    async fn load_standard_models(&self) -> Option<StandardModels> {
        match self.try_load_standard().await {
            Ok(models) => {
                tracing::info!(dir = %self.config.models_dir.display(), "standard models loaded");
                Some(models)
            }
            Err(err) => {
                tracing::warn!(error = %err, "standard models unavailable, formulas will be used");
                None
            }
        }
    }

    async fn load_enhanced_models(&self) -> Option<EnhancedModels> {
        let standard = self.load_standard_models().await?;

        let anomaly = match self.load_model(&self.config.anomaly).await {
            Ok(model) => Some(model),
            Err(err) => {
                tracing::warn!(error = %err, "anomaly detector unavailable");
                None
            }
        };

        let mut ensemble = Vec::with_capacity(self.config.ensemble.len());
        for file in &self.config.ensemble {
            match self.load_model(file).await {
                Ok(model) => ensemble.push(model),
                Err(err) => tracing::warn!(file = %file, error = %err, "skipping ensemble member"),
            }
        }

        tracing::info!(
            anomaly = anomaly.is_some(),
            ensemble = ensemble.len(),
            "enhanced models loaded"
        );
        Some(EnhancedModels {
            standard,
            anomaly,
            ensemble,
        })
    }
}

// ---- Tests ---------------------------------------------------------------

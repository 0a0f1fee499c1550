//! Heavy-metal pollution indices for groundwater samples.
//!
//! Formula engine (HPI, HEI, Cd, EF), optional model refinement with a
//! deterministic fallback to the formulas, recommendations, and trend
//! analysis over a site's history.
#![forbid(unsafe_code)]

pub mod enhanced;
pub mod error;
pub mod indices;
pub mod model;
pub mod narrative;
pub mod orchestrator;
pub mod predict;
pub mod provider;
pub mod recommend;
pub mod sample;
pub mod standards;
pub mod trend;

pub use enhanced::{AnomalyAssessment, EnhancedPrediction, EnhancedPredictor, EnsembleEstimate};
pub use error::{IndexError, ModelError};
pub use indices::{IndexSet, PollutionIndexResult, SafetyLevel};
pub use model::{DenseModel, ModelHandle, ModelRegistry, PreprocessingParams};
pub use narrative::{risk_assessment, RiskTier};
pub use orchestrator::{AnalysisPath, BatchSummary, EnhancedResult, Orchestrator};
pub use predict::{MlPrediction, StandardPredictor};
pub use provider::{JsonModelProvider, ModelProvider, ProviderConfig};
pub use recommend::{generate_recommendations, RecommendationInput};
pub use sample::{Metal, Sample};
pub use standards::{standard, Standard};

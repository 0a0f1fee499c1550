use std::path::PathBuf;

use thiserror::Error;

use crate::sample::Metal;

/// Errors raised by the formula engine, the ingestion guard and trend analysis.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("invalid sample: {0}")]
    InvalidInput(String),
    #[error("degenerate reference: {metal} concentration is zero, enrichment factor undefined")]
    DegenerateReference { metal: Metal },
    #[error("insufficient data: need at least {needed} values, got {got}")]
    InsufficientData { needed: usize, got: usize },
}

/// Errors inside the ML adapters. These never cross the orchestrator boundary.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model unavailable: {0}")]
    Unavailable(&'static str),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("shape mismatch: expected {expected} values, got {got}")]
    ShapeMismatch { expected: usize, got: usize },
    #[error("failed to read {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse model file: {0}")]
    Parse(#[from] serde_json::Error),
}

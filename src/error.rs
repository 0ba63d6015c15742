//! Error types for the fatigue engine

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while parsing sessions or encoding responses
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to parse session payload: {0}")]
    ParseError(String),

    #[error("JSON encoding error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Configuration could not be assembled from its sources
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] figment::Error),
}

/// Reasons an artifact/manifest pair is refused activation.
///
/// Variants after `ArtifactUnreadable` correspond to the six validation
/// checks, in the order they run.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Model manifest not found at {path}; a model requires a manifest for validation")]
    ManifestMissing { path: PathBuf },

    #[error("Failed to load manifest {path}: {reason}")]
    ManifestUnreadable { path: PathBuf, reason: String },

    #[error("Failed to load model {path}: {reason}")]
    ArtifactUnreadable { path: PathBuf, reason: String },

    #[error("Model must be a bundle with 'model' and 'feature_names' keys: {0}")]
    NotABundle(String),

    #[error("Model does not declare n_features_in")]
    MissingFeatureCount,

    #[error("Feature count mismatch: model expects {declared} features, but feature_names has {names}")]
    FeatureCountMismatch { declared: usize, names: usize },

    #[error("Numeric version mismatch: manifest={manifest:?}, runtime={runtime}")]
    NumericVersionMismatch {
        manifest: Option<String>,
        runtime: String,
    },

    #[error("ML version mismatch: manifest={manifest:?}, runtime={runtime}")]
    MlVersionMismatch {
        manifest: Option<String>,
        runtime: String,
    },

    #[error("Feature names mismatch: manifest={manifest:?}, model={bundle:?}")]
    FeatureNamesMismatch {
        manifest: Vec<String>,
        bundle: Vec<String>,
    },
}

impl ValidationError {
    /// Position (1-6) of the failed validation check, if the failure is one of them
    pub fn check_number(&self) -> Option<u8> {
        match self {
            ValidationError::NotABundle(_) => Some(1),
            ValidationError::MissingFeatureCount => Some(2),
            ValidationError::FeatureCountMismatch { .. } => Some(3),
            ValidationError::NumericVersionMismatch { .. } => Some(4),
            ValidationError::MlVersionMismatch { .. } => Some(5),
            ValidationError::FeatureNamesMismatch { .. } => Some(6),
            _ => None,
        }
    }
}

/// Errors raised by the ML path for a single request
#[derive(Debug, Error, PartialEq)]
pub enum PredictionError {
    #[error("Input has {actual} features, estimator expects {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Malformed estimator: {0}")]
    MalformedEstimator(String),

    #[error("Estimator produced a non-finite value")]
    NonFinite,

    #[error("Estimator produced no class probabilities")]
    EmptyProbabilities,
}

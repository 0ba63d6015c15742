//! Fatigue Engine - Fatigue scoring from self-report and behavioral telemetry
//!
//! A session (sleep/energy/stress answers, typing cadence, reaction task) flows
//! through a deterministic pipeline: answer normalization → feature extraction
//! → prediction → recommendations.
//!
//! ## Prediction paths
//!
//! - **ML model**: a JSON artifact validated against its manifest at startup
//! - **Heuristic**: a closed-form score used when no model is active, or when
//!   the model fails on a request

pub mod artifact;
pub mod config;
pub mod error;
pub mod features;
pub mod normalizer;
pub mod pipeline;
pub mod predictor;
pub mod recommend;
pub mod types;

pub use artifact::{ActiveArtifact, ArtifactLoader, ModelManifest, RuntimeVersions};
pub use config::EngineConfig;
pub use error::{ComputeError, ConfigError, PredictionError, ValidationError};
pub use features::FeatureExtractor;
pub use pipeline::{parse_session, FatigueService};
pub use predictor::{heuristic_score, risk_level, PredictionEngine};
pub use recommend::RecommendationGenerator;
pub use types::{
    FeatureVector, ModelUsed, PredictionResult, RawSignals, RiskLevel, Session, FEATURE_NAMES,
};

/// Engine version, recorded as the ML runtime version in model manifests
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "fatigue-engine";

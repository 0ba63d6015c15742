//! Pipeline orchestration
//!
//! This module provides the public scoring API. It runs a session through
//! normalization, feature extraction, prediction and recommendation, and owns
//! the artifact chosen at startup.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::artifact::{ActiveArtifact, ArtifactLoader, ModelManifest};
use crate::config::EngineConfig;
use crate::error::ComputeError;
use crate::features::FeatureExtractor;
use crate::predictor::{risk_level, PredictionEngine};
use crate::recommend::RecommendationGenerator;
use crate::types::{ModelUsed, PredictionResult, Session, FEATURE_COUNT, FEATURE_NAMES};

/// Parse a session JSON string
pub fn parse_session(json: &str) -> Result<Session, ComputeError> {
    serde_json::from_str(json)
        .map_err(|e| ComputeError::ParseError(format!("Failed to parse session: {}", e)))
}

/// Stateless-per-request scorer holding the artifact selected at startup.
///
/// Cloning is cheap; clones share the same read-only artifact.
#[derive(Debug, Clone, Default)]
pub struct FatigueService {
    engine: PredictionEngine,
}

impl FatigueService {
    /// Score with the heuristic only
    pub fn heuristic_only() -> Self {
        Self {
            engine: PredictionEngine::heuristic_only(),
        }
    }

    /// Score with an already validated artifact
    pub fn with_artifact(artifact: ActiveArtifact) -> Self {
        Self {
            engine: PredictionEngine::new(Some(Arc::new(artifact))),
        }
    }

    /// Load and validate the configured artifact.
    ///
    /// Never fails: a refused artifact is logged and the service scores
    /// heuristically.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::from_loader(&ArtifactLoader::from_config(config))
    }

    pub fn from_loader(loader: &ArtifactLoader) -> Self {
        match loader.load_and_validate() {
            Ok(Some(artifact)) => Self::with_artifact(artifact),
            Ok(None) => Self::heuristic_only(),
            Err(e) => {
                log::warn!("Model validation failed: {}", e);
                log::warn!("Falling back to heuristic scoring");
                Self::heuristic_only()
            }
        }
    }

    pub fn artifact(&self) -> Option<&ActiveArtifact> {
        self.engine.artifact()
    }

    /// Score one session.
    ///
    /// Pipeline stages:
    /// 1. AnswerNormalizer - Collapse answer encodings
    /// 2. FeatureExtractor - Fixed-order vector and raw signals
    /// 3. PredictionEngine - ML path with heuristic fallback
    /// 4. RecommendationGenerator - Advice for the score
    pub fn score_session(&self, session: &Session) -> PredictionResult {
        let (features, raw) = FeatureExtractor::extract_all(session);
        let prediction = self.engine.predict(&features, &raw);

        PredictionResult {
            fatigue_score: round2(prediction.score),
            risk_level: risk_level(prediction.score),
            recommendations: RecommendationGenerator::recommend(prediction.score, &raw),
            model_used: prediction.model_used,
        }
    }

    /// Score a session JSON string and return the response JSON
    pub fn score_json(&self, session_json: &str) -> Result<String, ComputeError> {
        let session = parse_session(session_json)?;
        let result = self.score_session(&session);
        Ok(serde_json::to_string(&result)?)
    }

    pub fn status(&self) -> ModelStatus {
        let artifact = self.artifact();
        ModelStatus {
            model_loaded: artifact.is_some(),
            mode: if artifact.is_some() {
                ModelUsed::MlModel
            } else {
                ModelUsed::Heuristic
            },
            model_type: artifact.map(|a| a.estimator.kind().to_string()),
            loaded_at: artifact.map(|a| a.loaded_at),
        }
    }

    pub fn features_report(&self) -> FeatureReport {
        let expected_features = FEATURE_NAMES.iter().map(|s| s.to_string()).collect();
        match self.artifact() {
            Some(artifact) => FeatureReport {
                model_loaded: true,
                model_type: Some(artifact.estimator.kind().to_string()),
                feature_names: Some(artifact.feature_names.clone()),
                expected_feature_count: artifact.estimator.n_features(),
                expected_features,
            },
            None => FeatureReport {
                model_loaded: false,
                model_type: None,
                feature_names: None,
                expected_feature_count: FEATURE_COUNT,
                expected_features,
            },
        }
    }

    /// Manifest of the active artifact, if any
    pub fn manifest(&self) -> Option<&ModelManifest> {
        self.artifact().map(|a| &a.manifest)
    }
}

/// Which scoring mode the service runs in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStatus {
    pub model_loaded: bool,
    pub mode: ModelUsed,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded_at: Option<DateTime<Utc>>,
}

/// Feature expectations of the service and its model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureReport {
    pub model_loaded: bool,
    pub model_type: Option<String>,
    /// Names recorded in the bundle, when a model is loaded
    pub feature_names: Option<Vec<String>>,
    pub expected_feature_count: usize,
    /// Serving order produced by the extractor
    pub expected_features: Vec<String>,
}

fn round2(score: f64) -> f64 {
    (score * 100.0).round() / 100.0
}

//! Dual-path prediction
//!
//! The ML path runs only when a validated artifact was handed to the engine.
//! Any error it returns degrades that single request to the heuristic path,
//! which is closed-form and always yields a score in [0, 100].

use std::sync::Arc;

use crate::artifact::{ActiveArtifact, Capability};
use crate::error::PredictionError;
use crate::types::{FeatureVector, ModelUsed, Prediction, RawSignals, RiskLevel};

/// Answers mean assumed when a session supplied no answers
pub const NEUTRAL_ANSWERS_MEAN: f64 = 5.0;

/// Sleep window (hours) with no penalty
const SLEEP_LOWER_HOURS: f64 = 7.0;
const SLEEP_UPPER_HOURS: f64 = 9.0;

const LOW_RISK_CEILING: f64 = 30.0;
const MEDIUM_RISK_CEILING: f64 = 60.0;

/// Scores feature vectors, preferring the model when one is active
#[derive(Debug, Clone, Default)]
pub struct PredictionEngine {
    artifact: Option<Arc<ActiveArtifact>>,
}

impl PredictionEngine {
    pub fn new(artifact: Option<Arc<ActiveArtifact>>) -> Self {
        Self { artifact }
    }

    pub fn heuristic_only() -> Self {
        Self { artifact: None }
    }

    pub fn artifact(&self) -> Option<&ActiveArtifact> {
        self.artifact.as_deref()
    }

    /// Score one session's features
    pub fn predict(&self, features: &FeatureVector, raw: &RawSignals) -> Prediction {
        if let Some(artifact) = &self.artifact {
            match predict_ml(artifact, features) {
                Ok(score) => {
                    log::debug!("ML prediction: {:.2}", score);
                    return Prediction {
                        score,
                        model_used: ModelUsed::MlModel,
                    };
                }
                Err(e) => {
                    log::warn!("ML prediction failed ({}), using heuristic", e);
                }
            }
        }

        let score = heuristic_score(features, raw);
        log::debug!("Heuristic prediction: {:.2}", score);
        Prediction {
            score,
            model_used: ModelUsed::Heuristic,
        }
    }
}

/// Score with the artifact's estimator, scaled to [0, 100]
pub fn predict_ml(artifact: &ActiveArtifact, features: &FeatureVector) -> Result<f64, PredictionError> {
    let x = features.as_slice();
    artifact.estimator.check_shape(x)?;

    let score = match artifact.estimator.capability() {
        Capability::Probabilistic(model) => {
            let proba = model.predict_proba(x)?;
            // Positive class sits at index 1; a single-class model reports index 0
            let p = match proba.len() {
                0 => return Err(PredictionError::EmptyProbabilities),
                1 => proba[0],
                _ => proba[1],
            };
            p * 100.0
        }
        Capability::Scalar(model) => model.predict(x)?,
    };

    if !score.is_finite() {
        return Err(PredictionError::NonFinite);
    }
    Ok(score.clamp(0.0, 100.0))
}

/// Closed-form fatigue score; needs no model and always succeeds
pub fn heuristic_score(features: &FeatureVector, raw: &RawSignals) -> f64 {
    let sleep_hours = features.sleep_hours();
    let answers_mean = raw.answers_mean.unwrap_or(NEUTRAL_ANSWERS_MEAN);
    let activity_deficit = 10.0 - answers_mean;

    let sleep_penalty = if sleep_hours < SLEEP_LOWER_HOURS {
        (SLEEP_LOWER_HOURS - sleep_hours) * 8.0
    } else if sleep_hours > SLEEP_UPPER_HOURS {
        (sleep_hours - SLEEP_UPPER_HOURS) * 3.0
    } else {
        0.0
    };

    let latency_penalty = (features.avg_latency_ms() / 50.0).min(20.0);
    let reaction_penalty = (features.reaction_time_ms() / 30.0).min(20.0);

    clamp_score(sleep_penalty + activity_deficit * 4.0 + latency_penalty + reaction_penalty)
}

/// Risk tier: below 30 low, below 60 medium, otherwise high
pub fn risk_level(score: f64) -> RiskLevel {
    if score < LOW_RISK_CEILING {
        RiskLevel::Low
    } else if score < MEDIUM_RISK_CEILING {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 100.0)
    }
}

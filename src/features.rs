//! Feature extraction
//!
//! This module maps a session to the fixed-order feature vector consumed by
//! both prediction paths, and to the raw signals used by the heuristic and the
//! recommender:
//! - Answer-derived features (sleep, energy, stress)
//! - Typing cadence
//! - Reaction task outcome

use crate::normalizer::{AnswerNormalizer, NormalizedAnswers};
use crate::types::{
    FeatureVector, RawSignals, Session, ENERGY_LEVEL, SLEEP_HOURS, STRESS_LEVEL,
};

/// Feature extractor for sessions
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Extract the feature vector in [`crate::types::FEATURE_NAMES`] order
    pub fn extract(session: &Session) -> FeatureVector {
        let answers = AnswerNormalizer::normalize(&session.answers);
        Self::extract_normalized(session, &answers)
    }

    /// Extract raw, pre-vectorized signals
    pub fn raw_signals(session: &Session) -> RawSignals {
        let answers = AnswerNormalizer::normalize(&session.answers);
        Self::raw_from_normalized(session, &answers)
    }

    /// Extract both representations, normalizing answers once
    pub fn extract_all(session: &Session) -> (FeatureVector, RawSignals) {
        let answers = AnswerNormalizer::normalize(&session.answers);
        (
            Self::extract_normalized(session, &answers),
            Self::raw_from_normalized(session, &answers),
        )
    }

    fn extract_normalized(session: &Session, answers: &NormalizedAnswers) -> FeatureVector {
        let typing = &session.typing_features;
        let task = &session.task_performance;

        FeatureVector::new([
            answers.value_or_zero(SLEEP_HOURS),
            answers.value_or_zero(ENERGY_LEVEL),
            answers.value_or_zero(STRESS_LEVEL),
            metric(typing.average_latency_ms),
            metric(typing.total_duration_ms),
            metric(typing.backspace_rate),
            metric(task.reaction_time_ms),
            attempted(task.reaction_attempted),
        ])
    }

    fn raw_from_normalized(session: &Session, answers: &NormalizedAnswers) -> RawSignals {
        let typing = &session.typing_features;
        let task = &session.task_performance;

        RawSignals {
            answers_mean: answers.mean(),
            answers_count: answers.len(),
            sleep_hours: answers.get(SLEEP_HOURS),
            avg_latency: metric(typing.average_latency_ms),
            total_duration: metric(typing.total_duration_ms),
            backspace_rate: metric(typing.backspace_rate),
            reaction_time: metric(task.reaction_time_ms),
            reaction_attempted: task.reaction_attempted.unwrap_or(false),
        }
    }
}

/// Missing, non-finite or negative metrics read as 0.0
fn metric(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}

fn attempted(flag: Option<bool>) -> f64 {
    if flag.unwrap_or(false) {
        1.0
    } else {
        0.0
    }
}

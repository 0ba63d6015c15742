//! Core types for the fatigue engine
//!
//! This module defines the data structures that flow through each stage of
//! scoring: the incoming session, the fixed-order feature vector, the raw
//! signals used by the heuristic and recommendations, and the prediction result.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Number of features in the serving vector
pub const FEATURE_COUNT: usize = 8;

/// Feature order shared by extraction, both prediction paths and training.
///
/// Reordering this silently produces valid-looking but wrong predictions.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "sleep_hours",
    "energy_level",
    "stress_level",
    "avg_latency_ms",
    "total_duration_ms",
    "backspace_rate",
    "reaction_time_ms",
    "reaction_attempted",
];

/// Question ids read by the feature extractor
pub const SLEEP_HOURS: &str = "sleep_hours";
pub const ENERGY_LEVEL: &str = "energy_level";
pub const STRESS_LEVEL: &str = "stress_level";

/// User answers in either supported encoding.
///
/// Entries are kept as raw JSON so that malformed values degrade during
/// normalization instead of rejecting the whole session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answers {
    /// Ordered `{question_id, value}` pairs
    List(Vec<Value>),
    /// Direct `question_id -> value` mapping
    Map(BTreeMap<String, Value>),
}

impl Default for Answers {
    fn default() -> Self {
        Answers::Map(BTreeMap::new())
    }
}

impl Answers {
    /// Build the list encoding from `(question_id, value)` pairs
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        Answers::List(
            pairs
                .into_iter()
                .map(|(id, value)| serde_json::json!({ "question_id": id, "value": value }))
                .collect(),
        )
    }

    /// Build the mapping encoding from `(question_id, value)` pairs
    pub fn from_map<'a>(pairs: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        Answers::Map(
            pairs
                .into_iter()
                .map(|(id, value)| (id.to_string(), Value::from(value)))
                .collect(),
        )
    }
}

/// Keys accepted for each metrics block, in preference order
const TYPING_BLOCK_KEYS: [&str; 2] = ["typing_features", "typing_metrics"];
const TASK_BLOCK_KEYS: [&str; 2] = ["task_performance", "task_metrics"];

/// Keys accepted for the average typing latency, in preference order
const AVG_LATENCY_KEYS: [&str; 3] = ["average_latency_ms", "avg_latency_ms", "avg_key_latency_ms"];

/// Typing cadence captured during the questionnaire
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypingFeatures {
    /// Average inter-key latency (ms)
    pub average_latency_ms: Option<f64>,
    /// Total typing duration (ms)
    pub total_duration_ms: Option<f64>,
    /// Fraction of keystrokes that were backspaces
    pub backspace_rate: Option<f64>,
}

impl TypingFeatures {
    /// Read each field on its own; a bad or redundant key never affects the others
    pub fn from_value(value: &Value) -> Self {
        let Some(map) = value.as_object() else {
            return Self::default();
        };
        Self {
            average_latency_ms: first_f64(map, &AVG_LATENCY_KEYS),
            total_duration_ms: first_f64(map, &["total_duration_ms"]),
            backspace_rate: first_f64(map, &["backspace_rate"]),
        }
    }
}

/// Reaction-time task outcome
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskPerformance {
    /// Measured reaction time (ms), if the task produced one
    pub reaction_time_ms: Option<f64>,
    /// Whether the user attempted the task
    pub reaction_attempted: Option<bool>,
}

impl TaskPerformance {
    pub fn from_value(value: &Value) -> Self {
        let Some(map) = value.as_object() else {
            return Self::default();
        };
        Self {
            reaction_time_ms: first_f64(map, &["reaction_time_ms"]),
            reaction_attempted: map.get("reaction_attempted").and_then(coerce_bool),
        }
    }
}

/// One submitted self-report + telemetry bundle.
///
/// Deserialization is lenient: only a non-object payload is rejected. Every
/// other malformed piece degrades to its default on its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Session {
    /// Opaque identifier, never used for scoring
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Opaque client timestamp, never parsed
    pub timestamp: String,
    pub answers: Answers,
    pub typing_features: TypingFeatures,
    pub task_performance: TaskPerformance,
}

impl Session {
    fn from_map(map: &Map<String, Value>) -> Self {
        Self {
            user_id: map.get("user_id").and_then(Value::as_str).map(str::to_string),
            timestamp: map
                .get("timestamp")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            answers: map.get("answers").map(answers_from_value).unwrap_or_default(),
            typing_features: first_object(map, &TYPING_BLOCK_KEYS)
                .map(TypingFeatures::from_value)
                .unwrap_or_default(),
            task_performance: first_object(map, &TASK_BLOCK_KEYS)
                .map(TaskPerformance::from_value)
                .unwrap_or_default(),
        }
    }
}

impl<'de> Deserialize<'de> for Session {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Object(map) => Ok(Session::from_map(&map)),
            _ => Err(de::Error::custom("session must be a JSON object")),
        }
    }
}

impl<'de> Deserialize<'de> for TypingFeatures {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(TypingFeatures::from_value(&Value::deserialize(deserializer)?))
    }
}

impl<'de> Deserialize<'de> for TaskPerformance {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(TaskPerformance::from_value(&Value::deserialize(deserializer)?))
    }
}

/// Fixed-order numeric encoding of a session (see [`FEATURE_NAMES`])
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn new(values: [f64; FEATURE_COUNT]) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn to_array(self) -> [f64; FEATURE_COUNT] {
        self.0
    }

    /// Look up a feature by its name in [`FEATURE_NAMES`]
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|idx| self.0[idx])
    }

    pub fn sleep_hours(&self) -> f64 {
        self.0[0]
    }

    pub fn avg_latency_ms(&self) -> f64 {
        self.0[3]
    }

    pub fn reaction_time_ms(&self) -> f64 {
        self.0[6]
    }
}

/// Raw, pre-vectorized signals consumed by the heuristic and the recommender
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSignals {
    /// Mean of all normalized answers, `None` when nothing was answered
    pub answers_mean: Option<f64>,
    pub answers_count: usize,
    /// Answered `sleep_hours`, if present
    pub sleep_hours: Option<f64>,
    pub avg_latency: f64,
    pub total_duration: f64,
    pub backspace_rate: f64,
    pub reaction_time: f64,
    pub reaction_attempted: bool,
}

/// Three-level categorical summary of a fatigue score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

/// Which path produced a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelUsed {
    MlModel,
    Heuristic,
}

impl ModelUsed {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelUsed::MlModel => "ml_model",
            ModelUsed::Heuristic => "heuristic",
        }
    }
}

/// Score produced by the prediction engine, before rounding
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Always within [0, 100]
    pub score: f64,
    pub model_used: ModelUsed,
}

/// Response payload surfaced to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Fatigue score in [0, 100], rounded to two decimals
    pub fatigue_score: f64,
    pub risk_level: RiskLevel,
    pub recommendations: Vec<String>,
    pub model_used: ModelUsed,
}

/// Coerce a loosely-typed JSON value to a finite float.
///
/// Numbers, numeric strings and booleans are accepted; everything else
/// (including NaN/inf strings) yields `None`.
pub fn coerce_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

// First key holding a usable number; unusable values fall through to the next alias
fn first_f64(map: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| map.get(*key).and_then(coerce_f64))
}

// First key holding an object; a null or wrongly-typed block falls through
fn first_object<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find(|value| value.is_object())
}

fn answers_from_value(value: &Value) -> Answers {
    match value {
        Value::Array(items) => Answers::List(items.clone()),
        Value::Object(map) => Answers::Map(map.clone().into_iter().collect()),
        _ => Answers::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_accepts_list_answers() {
        let json = r#"{
            "timestamp": "2024-01-15T10:30:00",
            "answers": [{"question_id": "sleep_hours", "value": 6.0}],
            "typing_features": {"average_latency_ms": 120.0},
            "task_performance": {"reaction_time_ms": 300.0, "reaction_attempted": true}
        }"#;
        let session: Session = serde_json::from_str(json).unwrap();

        assert!(matches!(session.answers, Answers::List(ref items) if items.len() == 1));
        assert_eq!(session.typing_features.average_latency_ms, Some(120.0));
        assert_eq!(session.task_performance.reaction_attempted, Some(true));
    }

    #[test]
    fn test_session_accepts_map_answers_and_aliases() {
        let json = r#"{
            "timestamp": "t",
            "answers": {"sleep_hours": 7.5},
            "typing_metrics": {"avg_key_latency_ms": 150.0},
            "task_metrics": {"reaction_time_ms": null}
        }"#;
        let session: Session = serde_json::from_str(json).unwrap();

        assert!(matches!(session.answers, Answers::Map(ref m) if m.len() == 1));
        assert_eq!(session.typing_features.average_latency_ms, Some(150.0));
        assert_eq!(session.task_performance.reaction_time_ms, None);
        assert_eq!(session.task_performance.reaction_attempted, None);
    }

    #[test]
    fn test_invalid_values_degrade_instead_of_failing() {
        let json = r#"{
            "answers": 42,
            "typing_features": {"average_latency_ms": "fast", "backspace_rate": "0.1"},
            "task_performance": "broken"
        }"#;
        let session: Session = serde_json::from_str(json).unwrap();

        assert_eq!(session.answers, Answers::default());
        assert_eq!(session.typing_features.average_latency_ms, None);
        assert_eq!(session.typing_features.backspace_rate, Some(0.1));
        assert_eq!(session.task_performance, TaskPerformance::default());
        assert!(session.timestamp.is_empty());
    }

    #[test]
    fn test_redundant_latency_keys_keep_sibling_fields() {
        let json = r#"{
            "typing_features": {
                "average_latency_ms": 120,
                "avg_key_latency_ms": 130,
                "total_duration_ms": 5000,
                "backspace_rate": 0.03
            }
        }"#;
        let session: Session = serde_json::from_str(json).unwrap();

        assert_eq!(
            session.typing_features,
            TypingFeatures {
                average_latency_ms: Some(120.0),
                total_duration_ms: Some(5000.0),
                backspace_rate: Some(0.03),
            }
        );
    }

    #[test]
    fn test_unusable_latency_falls_through_to_next_key() {
        let json = r#"{"typing_features": {"average_latency_ms": "n/a", "avg_latency_ms": 95}}"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.typing_features.average_latency_ms, Some(95.0));
    }

    #[test]
    fn test_both_block_names_present() {
        let json = r#"{
            "typing_features": {"average_latency_ms": 120},
            "typing_metrics": {"average_latency_ms": 999},
            "task_performance": null,
            "task_metrics": {"reaction_time_ms": 410, "reaction_attempted": "yes"}
        }"#;
        let session: Session = serde_json::from_str(json).unwrap();

        assert_eq!(session.typing_features.average_latency_ms, Some(120.0));
        assert_eq!(session.task_performance.reaction_time_ms, Some(410.0));
        assert_eq!(session.task_performance.reaction_attempted, Some(true));
    }

    #[test]
    fn test_non_object_session_is_rejected() {
        assert!(serde_json::from_str::<Session>("[1, 2]").is_err());
        assert!(serde_json::from_str::<Session>("\"session\"").is_err());
    }

    #[test]
    fn test_coerce_rejects_non_finite() {
        assert_eq!(coerce_f64(&Value::from("NaN")), None);
        assert_eq!(coerce_f64(&Value::from("inf")), None);
        assert_eq!(coerce_f64(&Value::from(" 4.5 ")), Some(4.5));
        assert_eq!(coerce_f64(&Value::Null), None);
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_value(RiskLevel::Medium).unwrap(), "medium");
        assert_eq!(serde_json::to_value(ModelUsed::MlModel).unwrap(), "ml_model");
        assert_eq!(ModelUsed::Heuristic.as_str(), "heuristic");
    }

    #[test]
    fn test_feature_vector_lookup_by_name() {
        let v = FeatureVector::new([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 1.0]);
        assert_eq!(v.get("stress_level"), Some(3.0));
        assert_eq!(v.get("reaction_attempted"), Some(1.0));
        assert_eq!(v.get("unknown"), None);
    }
}

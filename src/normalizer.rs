//! Answer normalization
//!
//! This module collapses the two accepted answer encodings into one canonical
//! `question_id -> value` mapping before any feature logic runs.
//! - List entries with a missing id or an unparseable value are skipped
//! - Mapping values that cannot be parsed degrade to 0.0
//! - Negative values clamp to 0.0

use std::collections::BTreeMap;

use serde_json::Value;

use crate::types::{coerce_f64, Answers};

/// Canonical answers keyed by question id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedAnswers {
    values: BTreeMap<String, f64>,
}

impl NormalizedAnswers {
    pub fn get(&self, question_id: &str) -> Option<f64> {
        self.values.get(question_id).copied()
    }

    /// Value for `question_id`, or 0.0 when it was not answered
    pub fn value_or_zero(&self, question_id: &str) -> f64 {
        self.get(question_id).unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Mean over every answered question, `None` when nothing was answered.
    ///
    /// A question id repeated in list form counts once (its first value), so
    /// duplicates do not weigh the mean.
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        // Dividing per term keeps the mean finite for values near f64::MAX
        let n = self.values.len() as f64;
        Some(self.values.values().map(|v| v / n).sum())
    }
}

/// Normalizer for converting either answer encoding to [`NormalizedAnswers`]
pub struct AnswerNormalizer;

impl AnswerNormalizer {
    /// Normalize answers
    pub fn normalize(answers: &Answers) -> NormalizedAnswers {
        let mut values = BTreeMap::new();

        match answers {
            Answers::List(entries) => {
                for entry in entries {
                    if let Some((id, value)) = parse_list_entry(entry) {
                        // First occurrence of a question id wins
                        values.entry(id.to_string()).or_insert(value);
                    }
                }
            }
            Answers::Map(map) => {
                for (id, raw) in map {
                    let value = coerce_f64(raw).map(non_negative).unwrap_or(0.0);
                    values.insert(id.clone(), value);
                }
            }
        }

        NormalizedAnswers { values }
    }
}

fn parse_list_entry(entry: &Value) -> Option<(&str, f64)> {
    let id = entry.get("question_id")?.as_str()?;
    let value = coerce_f64(entry.get("value")?)?;
    Some((id, non_negative(value)))
}

fn non_negative(value: f64) -> f64 {
    value.max(0.0)
}

//! Training-time manifest and runtime version records

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version of the numeric encoding used by the estimators in this crate.
///
/// Bump whenever tree traversal, float handling or the bundle layout changes
/// in a way that alters predictions for an unchanged artifact.
pub const NUMERIC_VERSION: &str = "1.0.0";

/// Manifest written next to the artifact at training/export time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    /// Feature order the estimator was fitted on
    #[serde(default)]
    pub feature_names: Vec<String>,
    /// Numeric library version recorded at export
    #[serde(default)]
    pub numpy_version: Option<String>,
    /// ML library version recorded at export
    #[serde(default)]
    pub sklearn_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub train_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Any other fields, preserved for reporting
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ModelManifest {
    /// Training date, when it is a valid RFC 3339 timestamp
    pub fn trained_at(&self) -> Option<DateTime<Utc>> {
        self.train_date
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Library versions of the running process, compared against the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeVersions {
    pub numeric: String,
    pub ml: String,
}

impl RuntimeVersions {
    /// Versions of this build
    pub fn current() -> Self {
        Self {
            numeric: NUMERIC_VERSION.to_string(),
            ml: crate::ENGINE_VERSION.to_string(),
        }
    }

    pub fn new(numeric: impl Into<String>, ml: impl Into<String>) -> Self {
        Self {
            numeric: numeric.into(),
            ml: ml.into(),
        }
    }
}

impl Default for RuntimeVersions {
    fn default() -> Self {
        Self::current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_training_manifest() {
        let json = r#"{
            "model_version": "2024-01-15T10:30:00+00:00",
            "train_date": "2024-01-15T10:30:00.123456+00:00",
            "dataset_hash": "abc123",
            "numpy_version": "1.0.0",
            "sklearn_version": "0.1.0",
            "feature_names": ["sleep_hours", "energy_level"],
            "notes": "forest",
            "n_samples": 120
        }"#;
        let manifest: ModelManifest = serde_json::from_str(json).unwrap();

        assert_eq!(manifest.feature_names.len(), 2);
        assert_eq!(manifest.numpy_version.as_deref(), Some("1.0.0"));
        assert!(manifest.trained_at().is_some());
        assert_eq!(manifest.extra.get("n_samples"), Some(&Value::from(120)));
    }

    #[test]
    fn test_missing_fields_default() {
        let manifest: ModelManifest = serde_json::from_str("{}").unwrap();

        assert!(manifest.feature_names.is_empty());
        assert_eq!(manifest.numpy_version, None);
        assert_eq!(manifest.trained_at(), None);
    }
}

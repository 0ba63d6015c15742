//! Artifact loading and validation
//!
//! Runs once at startup. Terminal outcomes:
//! - no artifact file: `Ok(None)`, the service scores heuristically
//! - artifact present but refused: `Err(ValidationError)`
//! - artifact and manifest consistent: `Ok(Some(ActiveArtifact))`

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::Value;

use crate::artifact::estimator::SerializedEstimator;
use crate::artifact::manifest::{ModelManifest, RuntimeVersions};
use crate::artifact::ActiveArtifact;
use crate::config::EngineConfig;
use crate::error::ValidationError;
use crate::types::FEATURE_NAMES;

/// Loader bound to one artifact/manifest location pair
#[derive(Debug, Clone)]
pub struct ArtifactLoader {
    model_path: Option<PathBuf>,
    manifest_path: Option<PathBuf>,
    runtime: RuntimeVersions,
}

impl ArtifactLoader {
    pub fn new(model_path: impl Into<PathBuf>, manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: Some(model_path.into()),
            manifest_path: Some(manifest_path.into()),
            runtime: RuntimeVersions::current(),
        }
    }

    /// Resolve locations from configuration
    pub fn from_config(config: &EngineConfig) -> Self {
        let model_path = config.resolve_model_path();
        let manifest_path = config.resolve_manifest_path(model_path.as_deref());
        Self {
            model_path,
            manifest_path,
            runtime: RuntimeVersions::current(),
        }
    }

    /// Compare manifests against the given versions instead of this build's
    pub fn with_runtime(mut self, runtime: RuntimeVersions) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn model_path(&self) -> Option<&Path> {
        self.model_path.as_deref()
    }

    pub fn manifest_path(&self) -> Option<&Path> {
        self.manifest_path.as_deref()
    }

    /// Load the artifact and manifest and run every validation check
    pub fn load_and_validate(&self) -> Result<Option<ActiveArtifact>, ValidationError> {
        let model_path = match &self.model_path {
            Some(path) if path.exists() => path,
            Some(path) => {
                log::info!("Model file not found at {}; using heuristic", path.display());
                return Ok(None);
            }
            None => {
                log::info!("Model file not found; using heuristic");
                return Ok(None);
            }
        };

        let manifest_path = match &self.manifest_path {
            Some(path) if path.exists() => path,
            other => {
                return Err(ValidationError::ManifestMissing {
                    path: other
                        .clone()
                        .unwrap_or_else(|| PathBuf::from(crate::config::MANIFEST_FILE_NAME)),
                })
            }
        };

        let manifest = read_manifest(manifest_path)?;
        log::info!("Loaded manifest from {}", manifest_path.display());

        let bundle = read_bundle(model_path)?;
        log::info!("Loaded model from {}", model_path.display());

        let mut artifact = validate_artifact(bundle, manifest, &self.runtime)?;
        artifact.source = Some(model_path.clone());

        log::info!(
            "Model and manifest validation passed ({}, {} features)",
            artifact.estimator.kind(),
            artifact.feature_names.len()
        );
        Ok(Some(artifact))
    }
}

fn read_manifest(path: &Path) -> Result<ModelManifest, ValidationError> {
    let unreadable = |reason: String| ValidationError::ManifestUnreadable {
        path: path.to_path_buf(),
        reason,
    };
    let content = fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| unreadable(e.to_string()))
}

fn read_bundle(path: &Path) -> Result<Value, ValidationError> {
    let unreadable = |reason: String| ValidationError::ArtifactUnreadable {
        path: path.to_path_buf(),
        reason,
    };
    let content = fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| unreadable(e.to_string()))
}

/// Run the six activation checks, in order, against a parsed bundle.
///
/// 1. bundle exposes `model` and `feature_names`
/// 2. estimator declares `n_features_in`
/// 3. declared count equals the number of feature names
/// 4. manifest numeric version equals the runtime's
/// 5. manifest ML version equals the runtime's
/// 6. manifest feature names equal the bundle's, in order
pub fn validate_artifact(
    bundle: Value,
    manifest: ModelManifest,
    runtime: &RuntimeVersions,
) -> Result<ActiveArtifact, ValidationError> {
    let (estimator, feature_names) = split_bundle(bundle)?;

    let declared = estimator
        .n_features_in()
        .ok_or(ValidationError::MissingFeatureCount)?;

    if declared != feature_names.len() {
        return Err(ValidationError::FeatureCountMismatch {
            declared,
            names: feature_names.len(),
        });
    }

    if manifest.numpy_version.as_deref() != Some(runtime.numeric.as_str()) {
        return Err(ValidationError::NumericVersionMismatch {
            manifest: manifest.numpy_version.clone(),
            runtime: runtime.numeric.clone(),
        });
    }

    if manifest.sklearn_version.as_deref() != Some(runtime.ml.as_str()) {
        return Err(ValidationError::MlVersionMismatch {
            manifest: manifest.sklearn_version.clone(),
            runtime: runtime.ml.clone(),
        });
    }

    if manifest.feature_names != feature_names {
        return Err(ValidationError::FeatureNamesMismatch {
            manifest: manifest.feature_names.clone(),
            bundle: feature_names,
        });
    }

    if !feature_names.iter().map(String::as_str).eq(FEATURE_NAMES.iter().copied()) {
        log::warn!(
            "Model feature names {:?} differ from serving order {:?}",
            feature_names,
            FEATURE_NAMES
        );
    }

    Ok(ActiveArtifact {
        estimator: estimator.into_estimator(declared),
        feature_names,
        manifest,
        source: None,
        loaded_at: Utc::now(),
    })
}

fn split_bundle(bundle: Value) -> Result<(SerializedEstimator, Vec<String>), ValidationError> {
    let mut map = match bundle {
        Value::Object(map) => map,
        other => {
            return Err(ValidationError::NotABundle(format!(
                "expected an object, found {}",
                json_kind(&other)
            )))
        }
    };

    if map.contains_key("kind") && !map.contains_key("model") {
        return Err(ValidationError::NotABundle(
            "found a bare estimator without feature names".to_string(),
        ));
    }

    let model = map
        .remove("model")
        .ok_or_else(|| ValidationError::NotABundle("missing 'model' key".to_string()))?;
    let names = map
        .remove("feature_names")
        .ok_or_else(|| ValidationError::NotABundle("missing 'feature_names' key".to_string()))?;

    let estimator: SerializedEstimator = serde_json::from_value(model)
        .map_err(|e| ValidationError::NotABundle(format!("invalid estimator: {}", e)))?;
    let feature_names: Vec<String> = serde_json::from_value(names)
        .map_err(|e| ValidationError::NotABundle(format!("invalid feature_names: {}", e)))?;

    Ok((estimator, feature_names))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn runtime() -> RuntimeVersions {
        RuntimeVersions::new("1.26.4", "1.5.2")
    }

    fn names() -> Vec<String> {
        FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
    }

    fn bundle() -> Value {
        json!({
            "model": {
                "kind": "logistic_regression",
                "n_features_in": 8,
                "coefficients": [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                "intercept": 0.0
            },
            "feature_names": names()
        })
    }

    fn manifest() -> ModelManifest {
        serde_json::from_value(json!({
            "numpy_version": "1.26.4",
            "sklearn_version": "1.5.2",
            "feature_names": names()
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_bundle_activates() {
        let artifact = validate_artifact(bundle(), manifest(), &runtime()).unwrap();

        assert_eq!(artifact.estimator.kind(), "logistic_regression");
        assert_eq!(artifact.estimator.n_features(), 8);
        assert!(artifact.estimator.is_probabilistic());
        assert_eq!(artifact.feature_names, names());
    }

    #[test]
    fn test_check_1_bare_estimator() {
        let bare = bundle()["model"].clone();
        let err = validate_artifact(bare, manifest(), &runtime()).unwrap_err();
        assert_eq!(err.check_number(), Some(1));

        let err = validate_artifact(json!([1, 2]), manifest(), &runtime()).unwrap_err();
        assert!(matches!(err, ValidationError::NotABundle(_)));

        let mut missing = bundle();
        missing.as_object_mut().unwrap().remove("feature_names");
        let err = validate_artifact(missing, manifest(), &runtime()).unwrap_err();
        assert_eq!(err.check_number(), Some(1));
    }

    #[test]
    fn test_check_2_missing_feature_count() {
        let mut b = bundle();
        b["model"].as_object_mut().unwrap().remove("n_features_in");
        let err = validate_artifact(b, manifest(), &runtime()).unwrap_err();
        assert!(matches!(err, ValidationError::MissingFeatureCount));
    }

    #[test]
    fn test_check_3_feature_count_mismatch() {
        let mut b = bundle();
        b["model"]["n_features_in"] = json!(7);
        let err = validate_artifact(b, manifest(), &runtime()).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::FeatureCountMismatch {
                declared: 7,
                names: 8
            }
        ));
    }

    #[test]
    fn test_check_4_and_5_versions() {
        let err = validate_artifact(bundle(), manifest(), &RuntimeVersions::new("2.0.0", "1.5.2"))
            .unwrap_err();
        assert_eq!(err.check_number(), Some(4));

        let err = validate_artifact(bundle(), manifest(), &RuntimeVersions::new("1.26.4", "1.6.0"))
            .unwrap_err();
        assert_eq!(err.check_number(), Some(5));

        let mut m = manifest();
        m.numpy_version = None;
        let err = validate_artifact(bundle(), m, &runtime()).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::NumericVersionMismatch { manifest: None, .. }
        ));
    }

    #[test]
    fn test_check_6_feature_names_order() {
        let mut m = manifest();
        m.feature_names.swap(0, 1);
        let err = validate_artifact(bundle(), m, &runtime()).unwrap_err();

        assert_eq!(err.check_number(), Some(6));
        assert!(err.to_string().contains("Feature names mismatch"));
    }

    #[test]
    fn test_checks_fail_fast_in_order() {
        // Count mismatch and version mismatch together: count is reported
        let mut b = bundle();
        b["model"]["n_features_in"] = json!(3);
        let err = validate_artifact(b, manifest(), &RuntimeVersions::new("x", "y")).unwrap_err();
        assert_eq!(err.check_number(), Some(3));
    }

    #[test]
    fn test_absent_artifact_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ArtifactLoader::new(
            dir.path().join("fatigue_model.json"),
            dir.path().join("model_manifest.json"),
        );
        assert!(loader.load_and_validate().unwrap().is_none());
    }

    #[test]
    fn test_missing_manifest_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("fatigue_model.json");
        fs::write(&model, bundle().to_string()).unwrap();

        let loader = ArtifactLoader::new(&model, dir.path().join("model_manifest.json"));
        assert!(matches!(
            loader.load_and_validate(),
            Err(ValidationError::ManifestMissing { .. })
        ));
    }

    #[test]
    fn test_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("fatigue_model.json");
        let manifest_path = dir.path().join("model_manifest.json");
        fs::write(&model, "not json").unwrap();
        fs::write(&manifest_path, serde_json::to_string(&manifest()).unwrap()).unwrap();

        let loader = ArtifactLoader::new(&model, &manifest_path).with_runtime(runtime());
        assert!(matches!(
            loader.load_and_validate(),
            Err(ValidationError::ArtifactUnreadable { .. })
        ));

        fs::write(&manifest_path, "{").unwrap();
        assert!(matches!(
            loader.load_and_validate(),
            Err(ValidationError::ManifestUnreadable { .. })
        ));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("fatigue_model.json");
        let manifest_path = dir.path().join("model_manifest.json");
        fs::write(&model, bundle().to_string()).unwrap();
        fs::write(&manifest_path, serde_json::to_string(&manifest()).unwrap()).unwrap();

        let artifact = ArtifactLoader::new(&model, &manifest_path)
            .with_runtime(runtime())
            .load_and_validate()
            .unwrap()
            .unwrap();

        assert_eq!(artifact.source.as_deref(), Some(model.as_path()));
    }
}

//! Engine configuration
//!
//! Resolves where the model artifact and its manifest live. Explicit paths win;
//! otherwise a fixed list of locations under the search root is probed.
//!
//! Sources, highest priority first:
//! 1. `FATIGUE_MODEL_PATH`, `FATIGUE_MANIFEST_PATH`, `FATIGUE_MODEL_ROOT`
//! 2. Built-in defaults (search from the current directory)

use std::path::{Path, PathBuf};

use figment::providers::{Env, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Prefix of the environment variables read by [`EngineConfig::from_env`]
pub const ENV_PREFIX: &str = "FATIGUE_";

pub const MODEL_FILE_NAME: &str = "fatigue_model.json";
pub const MANIFEST_FILE_NAME: &str = "model_manifest.json";

/// Directories (relative to the search root) probed in order
const SEARCH_DIRS: [&str; 2] = ["models", "backend/models"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Explicit artifact path; disables the search
    pub model_path: Option<PathBuf>,
    /// Explicit manifest path
    pub manifest_path: Option<PathBuf>,
    /// Root for the default search locations
    pub search_root: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            manifest_path: None,
            search_root: PathBuf::from("."),
        }
    }
}

impl EngineConfig {
    /// Build a configuration from `FATIGUE_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: Self = Self::figment().extract()?;
        Ok(config.without_empty_paths())
    }

    /// Provider chain behind [`EngineConfig::from_env`]
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default())).merge(
            Env::prefixed(ENV_PREFIX).map(|key| {
                if key.as_str().eq_ignore_ascii_case("model_root") {
                    "search_root".into()
                } else {
                    key.as_str().to_ascii_lowercase().into()
                }
            }),
        )
    }

    // An exported-but-empty variable counts as unset
    fn without_empty_paths(mut self) -> Self {
        self.model_path = self.model_path.filter(|p| !p.as_os_str().is_empty());
        self.manifest_path = self.manifest_path.filter(|p| !p.as_os_str().is_empty());
        if self.search_root.as_os_str().is_empty() {
            self.search_root = PathBuf::from(".");
        }
        self
    }

    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    pub fn with_manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = Some(path.into());
        self
    }

    pub fn with_search_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.search_root = root.into();
        self
    }

    /// Artifact location: the explicit path, else the first existing default
    pub fn resolve_model_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.model_path {
            return Some(path.clone());
        }
        self.candidates(MODEL_FILE_NAME).into_iter().find(|p| p.exists())
    }

    /// Manifest location for the given artifact.
    ///
    /// Prefers the explicit path, then a manifest next to the artifact, then
    /// the default locations. When nothing exists the sibling path is returned
    /// so the caller can report where it looked.
    pub fn resolve_manifest_path(&self, model_path: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = &self.manifest_path {
            return Some(path.clone());
        }

        let sibling = model_path.map(|m| match m.parent() {
            Some(dir) => dir.join(MANIFEST_FILE_NAME),
            None => PathBuf::from(MANIFEST_FILE_NAME),
        });

        let mut candidates: Vec<PathBuf> = sibling.clone().into_iter().collect();
        candidates.extend(self.candidates(MANIFEST_FILE_NAME));

        let found = candidates.into_iter().find(|p| p.exists());
        found.or(sibling)
    }

    fn candidates(&self, file_name: &str) -> Vec<PathBuf> {
        SEARCH_DIRS
            .iter()
            .map(|dir| self.search_root.join(dir).join(file_name))
            .collect()
    }
}

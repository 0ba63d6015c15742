//! Model artifact handling
//!
//! An artifact is a JSON bundle `{ "model": <estimator>, "feature_names": [...] }`
//! accompanied by a manifest recorded at export time. The loader refuses to
//! activate a bundle unless both agree with each other and with the running
//! build.

mod estimator;
mod loader;
mod manifest;

pub use estimator::*;
pub use loader::*;
pub use manifest::*;

use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// A validated artifact; immutable once constructed
#[derive(Debug)]
pub struct ActiveArtifact {
    pub estimator: Estimator,
    pub feature_names: Vec<String>,
    pub manifest: ModelManifest,
    /// File the bundle was read from, when loaded from disk
    pub source: Option<PathBuf>,
    pub loaded_at: DateTime<Utc>,
}

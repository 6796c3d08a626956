//! Model Module - Anomaly model capability and its concrete forest
//!
//! Scoring depends only on the `AnomalyModel` trait. The isolation forest
//! and its on-disk artifact live here too, loaded once per process.

pub mod artifact;
pub mod inference;
pub mod isolation_forest;

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logic::features::LayoutInfo;

pub use artifact::{ArtifactError, ModelArtifact};
pub use inference::{
    AnomalyModel, Exclusive, InferenceError, Label, LabelVector, ScoreVector, SharedModel,
};
pub use isolation_forest::{FitError, ForestParams, IsolationForest};

/// Model metadata for status reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_path: String,
    pub model_type: String,
    pub n_features: usize,
    pub n_trees: usize,
    pub max_samples: usize,
    pub layout: LayoutInfo,
    pub trained_at: DateTime<Utc>,
    pub loaded_at: DateTime<Utc>,
}

/// A model ready to be injected into the scoring service
pub struct LoadedModel {
    pub model: SharedModel,
    pub metadata: ModelMetadata,
}

/// Load and verify the artifact at `path`.
pub fn load_model(path: impl AsRef<Path>) -> Result<LoadedModel, ArtifactError> {
    let path = path.as_ref();
    let artifact = ModelArtifact::load(path)?;

    let metadata = ModelMetadata {
        model_path: path.display().to_string(),
        model_type: artifact.model_type.clone(),
        n_features: artifact.model.n_features(),
        n_trees: artifact.model.n_trees(),
        max_samples: artifact.model.max_samples(),
        layout: artifact.layout(),
        trained_at: artifact.trained_at,
        loaded_at: Utc::now(),
    };

    Ok(LoadedModel {
        model: Arc::new(artifact.into_model()),
        metadata,
    })
}

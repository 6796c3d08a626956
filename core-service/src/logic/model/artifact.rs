//! Model Artifact - persisted, checksummed isolation forest
//!
//! Produced by the offline trainer, loaded once at server startup.
//! Loading is the only place a bad artifact is fatal.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::inference::AnomalyModel;
use super::isolation_forest::IsolationForest;
use crate::logic::features::layout::{
    validate_layout, LayoutInfo, FEATURE_COUNT, FEATURE_LAYOUT,
};

/// Current artifact format version
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Model type tag written into artifacts
pub const MODEL_TYPE: &str = "isolation_forest";

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("model artifact not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("cannot read model artifact {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model artifact {} is not valid: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot serialize model: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("model checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("unsupported artifact format version {0} (expected {})", ARTIFACT_FORMAT_VERSION)]
    UnsupportedVersion(u32),

    #[error("invalid model artifact: {0}")]
    Invalid(String),
}

impl ArtifactError {
    /// True when the file system is at fault (missing or unreadable file),
    /// false when the file was read but the model inside is bad.
    pub fn is_filesystem_fault(&self) -> bool {
        matches!(self, ArtifactError::NotFound(_) | ArtifactError::Io { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub model_type: String,
    pub feature_version: u8,
    pub layout_hash: u32,
    pub feature_names: Vec<String>,
    pub trained_at: DateTime<Utc>,
    pub n_training_samples: usize,
    /// Hex SHA-256 of the serialized `model`
    pub checksum: String,
    pub model: IsolationForest,
}

impl ModelArtifact {
    pub fn new(model: IsolationForest, n_training_samples: usize) -> Result<Self, ArtifactError> {
        let checksum = model_checksum(&model)?;
        let layout = LayoutInfo::current();
        Ok(Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            model_type: MODEL_TYPE.to_string(),
            feature_version: layout.version,
            layout_hash: layout.hash,
            feature_names: layout.feature_names,
            trained_at: Utc::now(),
            n_training_samples,
            checksum,
            model,
        })
    }

    /// Layout recorded in the artifact
    pub fn layout(&self) -> LayoutInfo {
        LayoutInfo {
            version: self.feature_version,
            hash: self.layout_hash,
            feature_names: self.feature_names.clone(),
        }
    }

    /// Read, parse and verify an artifact.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        log::info!("Loading model artifact from: {}", path.display());

        if !path.exists() {
            return Err(ArtifactError::NotFound(path.to_path_buf()));
        }

        let bytes = fs::read(path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let artifact: ModelArtifact =
            serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        artifact.verify()?;

        log::info!(
            "Model artifact loaded: {} trees, psi={}, trained {} on {} samples",
            artifact.model.n_trees(),
            artifact.model.max_samples(),
            artifact.trained_at,
            artifact.n_training_samples
        );

        Ok(artifact)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ArtifactError> {
        let path = path.as_ref();
        let json = serde_json::to_vec_pretty(self).map_err(ArtifactError::Serialize)?;
        fs::write(path, json).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Model artifact written to {}", path.display());
        Ok(())
    }

    pub fn verify(&self) -> Result<(), ArtifactError> {
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(ArtifactError::UnsupportedVersion(self.format_version));
        }
        if self.model_type != MODEL_TYPE {
            return Err(ArtifactError::Invalid(format!(
                "unknown model type '{}'",
                self.model_type
            )));
        }

        validate_layout(self.feature_version, self.layout_hash)
            .map_err(|e| ArtifactError::Invalid(e.to_string()))?;

        if self.feature_names.iter().map(String::as_str).ne(FEATURE_LAYOUT.iter().copied()) {
            return Err(ArtifactError::Invalid(format!(
                "feature names {:?} do not match layout {:?}",
                self.feature_names, FEATURE_LAYOUT
            )));
        }
        if self.model.n_features() != FEATURE_COUNT {
            return Err(ArtifactError::Invalid(format!(
                "model expects {} features, layout has {}",
                self.model.n_features(),
                FEATURE_COUNT
            )));
        }

        let actual = model_checksum(&self.model)?;
        if actual != self.checksum {
            return Err(ArtifactError::ChecksumMismatch {
                expected: self.checksum.clone(),
                actual,
            });
        }

        self.model.validate().map_err(ArtifactError::Invalid)
    }

    pub fn into_model(self) -> IsolationForest {
        self.model
    }
}

fn model_checksum(model: &IsolationForest) -> Result<String, ArtifactError> {
    let bytes = serde_json::to_vec(model).map_err(ArtifactError::Serialize)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::features::FeatureMatrix;
    use crate::logic::model::isolation_forest::ForestParams;
    use tempfile::tempdir;

    fn small_forest() -> IsolationForest {
        let powers: Vec<f64> = (0..64).map(|i| 0.5 + (i % 7) as f64 * 0.05).collect();
        let params = ForestParams {
            n_estimators: 10,
            ..Default::default()
        };
        IsolationForest::fit(&FeatureMatrix::from_power_column(&powers), &params).unwrap()
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");

        let artifact = ModelArtifact::new(small_forest(), 64).unwrap();
        artifact.save(&path).unwrap();

        let loaded = ModelArtifact::load(&path).unwrap();
        assert_eq!(loaded, artifact);
        assert_eq!(loaded.feature_names, vec!["power_kW".to_string()]);
        assert_eq!(loaded.layout(), LayoutInfo::current());
    }

    #[test]
    fn test_missing_file_is_filesystem_fault() {
        let dir = tempdir().unwrap();
        let err = ModelArtifact::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ArtifactError::NotFound(_)));
        assert!(err.is_filesystem_fault());
    }

    #[test]
    fn test_directory_is_filesystem_fault() {
        let dir = tempdir().unwrap();
        let err = ModelArtifact::load(dir.path()).unwrap_err();
        assert!(matches!(err, ArtifactError::Io { .. }));
        assert!(err.is_filesystem_fault());
    }

    #[test]
    fn test_garbage_is_model_fault() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        fs::write(&path, b"\x80\x04\x95 not json at all").unwrap();

        let err = ModelArtifact::load(&path).unwrap_err();
        assert!(matches!(err, ArtifactError::Parse { .. }));
        assert!(!err.is_filesystem_fault());
    }

    #[test]
    fn test_tampered_model_fails_checksum() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");

        let mut artifact = ModelArtifact::new(small_forest(), 64).unwrap();
        artifact.model = IsolationForest::fit(
            &FeatureMatrix::from_power_column(&[1.0, 2.0, 3.0, 4.0]),
            &ForestParams::default(),
        )
        .unwrap();
        artifact.save(&path).unwrap();

        let err = ModelArtifact::load(&path).unwrap_err();
        assert!(matches!(err, ArtifactError::ChecksumMismatch { .. }));
        assert!(!err.is_filesystem_fault());
    }

    #[test]
    fn test_version_and_layout_checked() {
        let mut artifact = ModelArtifact::new(small_forest(), 64).unwrap();
        artifact.format_version = 99;
        assert!(matches!(
            artifact.verify(),
            Err(ArtifactError::UnsupportedVersion(99))
        ));

        let mut artifact = ModelArtifact::new(small_forest(), 64).unwrap();
        artifact.layout_hash = artifact.layout_hash.wrapping_add(1);
        assert!(matches!(artifact.verify(), Err(ArtifactError::Invalid(_))));

        let mut artifact = ModelArtifact::new(small_forest(), 64).unwrap();
        artifact.model_type = "lstm".to_string();
        assert!(matches!(artifact.verify(), Err(ArtifactError::Invalid(_))));

        let mut artifact = ModelArtifact::new(small_forest(), 64).unwrap();
        artifact.feature_names = vec!["voltage".to_string()];
        assert!(matches!(artifact.verify(), Err(ArtifactError::Invalid(_))));
    }
}

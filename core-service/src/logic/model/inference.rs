//! Inference Contract - the capability every anomaly model provides
//!
//! The scoring pipeline only depends on this trait, so the concrete
//! algorithm (isolation forest, deterministic stub, ...) can be swapped
//! without touching the verdict engine or the service.

use std::sync::Arc;

use ndarray::Array1;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logic::features::FeatureMatrix;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Per-row hard decision from the model's own boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Normal,
    Anomalous,
}

impl Label {
    pub fn is_anomalous(self) -> bool {
        matches!(self, Label::Anomalous)
    }
}

/// One score per row; lower = more anomalous
pub type ScoreVector = Array1<f64>;

/// One label per row
pub type LabelVector = Vec<Label>;

/// Model handle shared read-only by every request
pub type SharedModel = Arc<dyn AnomalyModel + Send + Sync>;

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("feature arity mismatch: model expects {expected} features, got {actual}")]
    FeatureArity { expected: usize, actual: usize },

    #[error("model output length mismatch: {rows} rows, {scores} scores, {labels} labels")]
    LengthMismatch {
        rows: usize,
        scores: usize,
        labels: usize,
    },

    #[error("model returned an empty output")]
    EmptyOutput,

    #[error("model returned a non-finite score for row {row}")]
    NonFiniteScore { row: usize },

    #[error("model failure: {0}")]
    Model(String),
}

// ============================================================================
// INFERENCE TRAIT
// ============================================================================

/// Anomaly model capability.
///
/// Both functions must be pure with respect to the matrix: identical
/// input yields identical output for a fixed model.
pub trait AnomalyModel {
    /// Human readable model identifier
    fn name(&self) -> &str;

    /// Number of feature columns the model was fitted on
    fn n_features(&self) -> usize;

    /// Continuous score per row. Lower = more anomalous.
    fn score(&self, features: &FeatureMatrix) -> Result<ScoreVector, InferenceError>;

    /// Hard decision per row using the model's internal threshold.
    fn label(&self, features: &FeatureMatrix) -> Result<LabelVector, InferenceError>;

    /// Scores and labels in one call. Models that derive labels from
    /// scores should override this to avoid scoring twice.
    fn score_and_label(
        &self,
        features: &FeatureMatrix,
    ) -> Result<(ScoreVector, LabelVector), InferenceError> {
        Ok((self.score(features)?, self.label(features)?))
    }
}

/// Reject a matrix whose column count differs from the model's.
pub fn check_arity(expected: usize, features: &FeatureMatrix) -> Result<(), InferenceError> {
    if features.n_features() != expected {
        return Err(InferenceError::FeatureArity {
            expected,
            actual: features.n_features(),
        });
    }
    Ok(())
}

/// Enforce the output contract: one finite score and one label per row.
pub fn check_output(
    rows: usize,
    scores: &ScoreVector,
    labels: &LabelVector,
) -> Result<(), InferenceError> {
    if scores.len() != rows || labels.len() != rows {
        return Err(InferenceError::LengthMismatch {
            rows,
            scores: scores.len(),
            labels: labels.len(),
        });
    }
    if rows == 0 {
        return Err(InferenceError::EmptyOutput);
    }
    if let Some(row) = scores.iter().position(|s| !s.is_finite()) {
        return Err(InferenceError::NonFiniteScore { row });
    }
    Ok(())
}

// ============================================================================
// EXCLUSIVE ACCESS
// ============================================================================

/// Serializes every call into a model that is not safe to share between
/// threads. Inference throughput drops to one request at a time.
pub struct Exclusive<M> {
    name: String,
    n_features: usize,
    inner: Mutex<M>,
}

impl<M: AnomalyModel> Exclusive<M> {
    pub fn new(model: M) -> Self {
        Self {
            name: model.name().to_string(),
            n_features: model.n_features(),
            inner: Mutex::new(model),
        }
    }

    pub fn into_inner(self) -> M {
        self.inner.into_inner()
    }
}

impl<M: AnomalyModel> AnomalyModel for Exclusive<M> {
    fn name(&self) -> &str {
        &self.name
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn score(&self, features: &FeatureMatrix) -> Result<ScoreVector, InferenceError> {
        self.inner.lock().score(features)
    }

    fn label(&self, features: &FeatureMatrix) -> Result<LabelVector, InferenceError> {
        self.inner.lock().label(features)
    }

    fn score_and_label(
        &self,
        features: &FeatureMatrix,
    ) -> Result<(ScoreVector, LabelVector), InferenceError> {
        // one lock for both outputs so they come from the same call
        self.inner.lock().score_and_label(features)
    }
}

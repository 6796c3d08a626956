//! Isolation Forest - ensemble of random partitioning trees
//!
//! Scoring follows Liu et al. (2008): anomalies are isolated by fewer
//! random splits. The raw score `-2^(-E[h(x)] / c(psi))` is shifted by
//! an offset fixed at training time (the contamination percentile of the
//! training scores), so:
//!
//! - `score < 0` means the row lies beyond the model's own boundary
//! - scores do not depend on how many rows are scored together

use ndarray::{Array1, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::inference::{
    check_arity, AnomalyModel, InferenceError, Label, LabelVector, ScoreVector,
};
use crate::constants::{
    DEFAULT_CONTAMINATION, DEFAULT_MAX_SAMPLES, DEFAULT_N_ESTIMATORS, DEFAULT_SEED,
};
use crate::logic::features::FeatureMatrix;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

// ============================================================================
// PARAMETERS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of trees
    pub n_estimators: usize,
    /// Sub-sample size per tree (capped at the training set size)
    pub max_samples: usize,
    /// Expected share of anomalies in the training data, in (0, 0.5]
    pub contamination: f64,
    /// Seed for reproducible forests; `None` draws from the OS
    pub seed: Option<u64>,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: DEFAULT_N_ESTIMATORS,
            max_samples: DEFAULT_MAX_SAMPLES,
            contamination: DEFAULT_CONTAMINATION,
            seed: Some(DEFAULT_SEED),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("need at least 2 training rows, got {0}")]
    TooFewSamples(usize),

    #[error("n_estimators must be at least 1")]
    NoEstimators,

    #[error("contamination must be in (0, 0.5], got {0}")]
    InvalidContamination(f64),

    #[error("training data contains a non-finite value at row {0}")]
    NonFinite(usize),

    #[error("training data has no feature columns")]
    NoFeatures,

    #[error("scoring the training data failed: {0}")]
    Inference(#[from] InferenceError),
}

// ============================================================================
// TREE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// Rows with `x[feature] <= threshold` go left
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Terminal node holding `size` training rows
    Leaf { size: usize },
}

/// Flat tree; node 0 is the root and children always come after parents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn build(
        data: &FeatureMatrix,
        rows: Vec<usize>,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(data, rows, 0, max_depth, rng);
        tree
    }

    /// Appends the subtree for `rows` and returns its root index.
    fn grow(
        &mut self,
        data: &FeatureMatrix,
        rows: Vec<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { size: rows.len() });

        if depth >= max_depth || rows.len() <= 1 {
            return id;
        }

        let mut features: Vec<usize> = (0..data.n_features()).collect();
        features.shuffle(rng);

        for feature in features {
            let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
                let v = data.row(r)[feature];
                (lo.min(v), hi.max(v))
            });
            if lo >= hi {
                continue;
            }

            // lo <= threshold < hi keeps both sides non-empty
            let threshold = rng.gen_range(lo..hi);
            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                .iter()
                .partition(|&&r| data.row(r)[feature] <= threshold);

            let left = self.grow(data, left_rows, depth + 1, max_depth, rng);
            let right = self.grow(data, right_rows, depth + 1, max_depth, rng);
            self.nodes[id] = Node::Split {
                feature,
                threshold,
                left,
                right,
            };
            return id;
        }

        // every feature constant within this node
        id
    }

    /// Depth at which `row` is isolated, with the unbuilt-subtree correction.
    fn path_length(&self, row: ArrayView1<'_, f64>) -> Option<f64> {
        let mut id = 0;
        let mut depth = 0.0;
        loop {
            match self.nodes.get(id)? {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if *row.get(*feature)? <= *threshold { *left } else { *right };
                    depth += 1.0;
                }
                Node::Leaf { size } => return Some(depth + average_path_length(*size)),
            }
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (id, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature,
                threshold,
                left,
                right,
            } = node
            {
                if *feature >= n_features {
                    return Err(format!("node {} splits on feature {} of {}", id, feature, n_features));
                }
                if !threshold.is_finite() {
                    return Err(format!("node {} has a non-finite threshold", id));
                }
                // children after parent rules out cycles
                for child in [left, right] {
                    if *child <= id || *child >= self.nodes.len() {
                        return Err(format!("node {} has invalid child {}", id, child));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Average path length of an unsuccessful BST search over `n` items, c(n).
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated percentile of an ascending-sorted slice, `q` in [0, 100].
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let rank = (q / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

// ============================================================================
// FOREST
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    /// Effective sub-sample size psi used for every tree
    max_samples: usize,
    n_features: usize,
    contamination: f64,
    /// Subtracted from raw scores so the internal boundary sits at 0
    offset: f64,
}

impl IsolationForest {
    pub fn fit(data: &FeatureMatrix, params: &ForestParams) -> Result<Self, FitError> {
        let n = data.n_rows();
        if n < 2 {
            return Err(FitError::TooFewSamples(n));
        }
        if data.n_features() == 0 {
            return Err(FitError::NoFeatures);
        }
        if params.n_estimators == 0 {
            return Err(FitError::NoEstimators);
        }
        if !(params.contamination > 0.0 && params.contamination <= 0.5) {
            return Err(FitError::InvalidContamination(params.contamination));
        }
        if let Some(row) = data.rows().position(|r| r.iter().any(|v| !v.is_finite())) {
            return Err(FitError::NonFinite(row));
        }

        let psi = params.max_samples.clamp(2, n);
        let max_depth = (psi as f64).log2().ceil() as usize;
        let mut rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let trees = (0..params.n_estimators)
            .map(|_| {
                let rows = index::sample(&mut rng, n, psi).into_vec();
                IsolationTree::build(data, rows, max_depth, &mut rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            max_samples: psi,
            n_features: data.n_features(),
            contamination: params.contamination,
            offset: 0.0,
        };

        let mut training_scores = forest.score_samples(data)?.to_vec();
        training_scores.sort_by(|a, b| a.total_cmp(b));
        forest.offset = percentile(&training_scores, 100.0 * params.contamination);

        log::info!(
            "Isolation forest fitted: {} trees, psi={}, offset={:.6}",
            forest.trees.len(),
            psi,
            forest.offset
        );

        Ok(forest)
    }

    /// Raw scores in [-1, 0): closer to -1 = more anomalous.
    pub fn score_samples(&self, features: &FeatureMatrix) -> Result<Array1<f64>, InferenceError> {
        check_arity(self.n_features, features)?;

        let normalizer = average_path_length(self.max_samples);
        let n_trees = self.trees.len() as f64;

        features
            .rows()
            .enumerate()
            .map(|(row_index, row)| {
                let mut total = 0.0;
                for tree in &self.trees {
                    total += tree.path_length(row).ok_or_else(|| {
                        InferenceError::Model(format!("corrupt tree while scoring row {}", row_index))
                    })?;
                }
                Ok(-(2f64).powf(-(total / n_trees) / normalizer))
            })
            .collect()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn max_samples(&self) -> usize {
        self.max_samples
    }

    pub fn contamination(&self) -> f64 {
        self.contamination
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Structural checks for deserialized forests.
    pub fn validate(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        if self.max_samples < 2 {
            return Err(format!("max_samples must be >= 2, got {}", self.max_samples));
        }
        if self.n_features == 0 {
            return Err("forest has no features".to_string());
        }
        if !self.offset.is_finite() {
            return Err("offset is not finite".to_string());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features)
                .map_err(|e| format!("tree {}: {}", i, e))?;
        }
        Ok(())
    }
}

impl AnomalyModel for IsolationForest {
    fn name(&self) -> &str {
        "isolation_forest"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn score(&self, features: &FeatureMatrix) -> Result<ScoreVector, InferenceError> {
        Ok(self.score_samples(features)? - self.offset)
    }

    fn label(&self, features: &FeatureMatrix) -> Result<LabelVector, InferenceError> {
        Ok(labels_from_scores(&self.score(features)?))
    }

    fn score_and_label(
        &self,
        features: &FeatureMatrix,
    ) -> Result<(ScoreVector, LabelVector), InferenceError> {
        let scores = self.score(features)?;
        let labels = labels_from_scores(&scores);
        Ok((scores, labels))
    }
}

fn labels_from_scores(scores: &ScoreVector) -> LabelVector {
    scores
        .iter()
        .map(|&s| if s < 0.0 { Label::Anomalous } else { Label::Normal })
        .collect()
}

//! Offline training on labelled readings

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::simulator::SimulatedPoint;
use crate::logic::features::FeatureMatrix;
use crate::logic::model::{
    AnomalyModel, FitError, ForestParams, InferenceError, IsolationForest,
};

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("no training data")]
    Empty,

    #[error("negative or non-finite power at row {0}")]
    BadReading(usize),

    #[error(transparent)]
    Fit(#[from] FitError),

    #[error("scoring training data failed: {0}")]
    Inference(#[from] InferenceError),
}

/// Detection quality on the training set itself
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub n_samples: usize,
    pub true_anomalies: usize,
    pub detected: usize,
    pub true_positives: usize,
    pub false_negatives: usize,
    pub false_positives: usize,
    pub offset: f64,
}

impl TrainingReport {
    pub fn recall(&self) -> Option<f64> {
        (self.true_anomalies > 0).then(|| self.true_positives as f64 / self.true_anomalies as f64)
    }

    pub fn precision(&self) -> Option<f64> {
        (self.detected > 0).then(|| self.true_positives as f64 / self.detected as f64)
    }
}

impl fmt::Display for TrainingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "samples:          {}", self.n_samples)?;
        writeln!(f, "true anomalies:   {}", self.true_anomalies)?;
        writeln!(f, "detected:         {}", self.detected)?;
        writeln!(f, "true positives:   {}", self.true_positives)?;
        writeln!(f, "false negatives:  {}", self.false_negatives)?;
        write!(f, "false positives:  {}", self.false_positives)
    }
}

/// Fit a forest on the power column, then compare its labels with the
/// ground-truth flags.
pub fn train(
    points: &[SimulatedPoint],
    params: &ForestParams,
) -> Result<(IsolationForest, TrainingReport), TrainingError> {
    if points.is_empty() {
        return Err(TrainingError::Empty);
    }
    if let Some(row) = points
        .iter()
        .position(|p| !p.power_kw.is_finite() || p.power_kw < 0.0)
    {
        return Err(TrainingError::BadReading(row));
    }

    let powers: Vec<f64> = points.iter().map(|p| p.power_kw).collect();
    let features = FeatureMatrix::from_power_column(&powers);
    let forest = IsolationForest::fit(&features, params)?;

    let labels = forest.label(&features)?;
    let mut report = TrainingReport {
        n_samples: points.len(),
        offset: forest.offset(),
        ..Default::default()
    };

    for (point, label) in points.iter().zip(&labels) {
        let predicted = label.is_anomalous();
        match (point.is_anomaly, predicted) {
            (true, true) => report.true_positives += 1,
            (true, false) => report.false_negatives += 1,
            (false, true) => report.false_positives += 1,
            (false, false) => {}
        }
        report.true_anomalies += usize::from(point.is_anomaly);
        report.detected += usize::from(predicted);
    }

    log::info!(
        "Training done: {}/{} anomalies detected, {} false positives",
        report.true_positives,
        report.true_anomalies,
        report.false_positives
    );

    Ok((forest, report))
}

//! Scoring Service - validate → extract → infer → decide
//!
//! Stateless per request. The model handle is the only shared object and
//! it is only read.

use thiserror::Error;

use crate::logic::features::FeatureMatrix;
use crate::logic::model::inference::check_output;
use crate::logic::model::{InferenceError, LabelVector, ScoreVector, SharedModel};
use crate::logic::series::{RawPoint, TimeSeries, TimeSeriesValidator, ValidationError};
use crate::logic::verdict::{DecisionConfig, Verdict, VerdictEngine};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("inference failed: {0}")]
    Inference(#[from] InferenceError),
}

impl ScoringError {
    /// Caller's fault (400-class) vs. ours (500-class)
    pub fn is_client_error(&self) -> bool {
        matches!(self, ScoringError::Validation(_))
    }
}

#[derive(Clone)]
pub struct ScoringService {
    model: SharedModel,
    engine: VerdictEngine,
}

impl ScoringService {
    pub fn new(model: SharedModel, config: DecisionConfig) -> Self {
        Self {
            model,
            engine: VerdictEngine::new(config),
        }
    }

    pub fn model(&self) -> &SharedModel {
        &self.model
    }

    pub fn config(&self) -> &DecisionConfig {
        self.engine.config()
    }

    /// Score caller-supplied points. Validation failures never reach the model.
    pub fn score(&self, raw: &[RawPoint]) -> Result<Verdict, ScoringError> {
        let series = TimeSeriesValidator::validate(raw).map_err(|e| {
            log::debug!("rejected series of {} points: {}", raw.len(), e);
            e
        })?;
        self.score_series(&series)
    }

    /// Score an already validated series.
    pub fn score_series(&self, series: &TimeSeries) -> Result<Verdict, ScoringError> {
        let features = FeatureMatrix::from_series(series);

        let verdict = self
            .infer(&features)
            .and_then(|(scores, labels)| self.engine.decide(&scores, &labels))
            .map_err(|e| {
                // sole error-level record of the failure; callers only map it
                log::error!(
                    "inference with model '{}' failed on {} rows: {}",
                    self.model.name(),
                    features.n_rows(),
                    e
                );
                e
            })?;

        Ok(verdict)
    }

    fn infer(&self, features: &FeatureMatrix) -> Result<(ScoreVector, LabelVector), InferenceError> {
        let (scores, labels) = self.model.score_and_label(features)?;
        check_output(features.n_rows(), &scores, &labels)?;
        Ok((scores, labels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::model::inference::check_arity;
    use crate::logic::model::{AnomalyModel, Label};
    use crate::logic::verdict::Status;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Deterministic per-row lookup: power → (score, label).
    struct LookupModel {
        table: Vec<(f64, f64, Label)>,
        calls: AtomicUsize,
    }

    impl LookupModel {
        fn new(table: Vec<(f64, f64, Label)>) -> Arc<Self> {
            Arc::new(Self {
                table,
                calls: AtomicUsize::new(0),
            })
        }

        fn lookup(&self, power: f64) -> (f64, Label) {
            self.table
                .iter()
                .find(|(p, _, _)| *p == power)
                .map(|&(_, s, l)| (s, l))
                .unwrap_or((0.2, Label::Normal))
        }
    }

    impl AnomalyModel for LookupModel {
        fn name(&self) -> &str {
            "lookup"
        }

        fn n_features(&self) -> usize {
            1
        }

        fn score(&self, features: &FeatureMatrix) -> Result<ScoreVector, InferenceError> {
            check_arity(1, features)?;
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(features.rows().map(|r| self.lookup(r[0]).0).collect())
        }

        fn label(&self, features: &FeatureMatrix) -> Result<LabelVector, InferenceError> {
            check_arity(1, features)?;
            Ok(features.rows().map(|r| self.lookup(r[0]).1).collect())
        }
    }

    /// Breaks the output contract by dropping the last score.
    struct TruncatingModel;

    impl AnomalyModel for TruncatingModel {
        fn name(&self) -> &str {
            "truncating"
        }

        fn n_features(&self) -> usize {
            1
        }

        fn score(&self, features: &FeatureMatrix) -> Result<ScoreVector, InferenceError> {
            Ok(features.rows().skip(1).map(|r| r[0]).collect())
        }

        fn label(&self, features: &FeatureMatrix) -> Result<LabelVector, InferenceError> {
            Ok(vec![Label::Normal; features.n_rows()])
        }
    }

    /// Score grows with row position and only the last row can be a hard
    /// anomaly, so any reordering of the rows changes the verdict.
    struct PositionalModel;

    impl AnomalyModel for PositionalModel {
        fn name(&self) -> &str {
            "positional"
        }

        fn n_features(&self) -> usize {
            1
        }

        fn score(&self, features: &FeatureMatrix) -> Result<ScoreVector, InferenceError> {
            check_arity(1, features)?;
            Ok(features
                .rows()
                .enumerate()
                .map(|(i, r)| r[0] * (i + 1) as f64 / 10.0)
                .collect())
        }

        fn label(&self, features: &FeatureMatrix) -> Result<LabelVector, InferenceError> {
            check_arity(1, features)?;
            let last = features.n_rows() - 1;
            Ok(features
                .rows()
                .enumerate()
                .map(|(i, r)| {
                    if i == last && r[0] >= 3.0 {
                        Label::Anomalous
                    } else {
                        Label::Normal
                    }
                })
                .collect())
        }
    }

    struct FailingModel;

    impl AnomalyModel for FailingModel {
        fn name(&self) -> &str {
            "failing"
        }

        fn n_features(&self) -> usize {
            1
        }

        fn score(&self, _: &FeatureMatrix) -> Result<ScoreVector, InferenceError> {
            Err(InferenceError::Model("numerical failure".to_string()))
        }

        fn label(&self, _: &FeatureMatrix) -> Result<LabelVector, InferenceError> {
            Err(InferenceError::Model("numerical failure".to_string()))
        }
    }

    fn scenario_model() -> Arc<LookupModel> {
        LookupModel::new(vec![
            (0.5, 0.3, Label::Normal),
            (0.6, 0.28, Label::Normal),
            (5.0, -0.1, Label::Anomalous),
            (0.4, 0.2, Label::Normal),
        ])
    }

    fn service(model: SharedModel) -> ScoringService {
        ScoringService::new(model, DecisionConfig::default())
    }

    fn points(pairs: &[(&str, f64)]) -> Vec<RawPoint> {
        pairs.iter().map(|&(t, p)| RawPoint::new(t, p)).collect()
    }

    #[test]
    fn test_scenario_spike_with_good_average_warns() {
        let svc = service(scenario_model());
        let verdict = svc
            .score(&points(&[
                ("2025-10-16T08:00:00", 0.5),
                ("2025-10-16T08:10:00", 0.6),
                ("2025-10-16T08:20:00", 5.0),
            ]))
            .unwrap();

        assert_eq!(verdict.status, Status::Warning);
        assert!((verdict.average_score - 0.16).abs() < 1e-12);
    }

    #[test]
    fn test_scenario_single_normal_point() {
        let svc = service(scenario_model());
        let verdict = svc.score(&points(&[("2025-10-16T08:00:00", 0.4)])).unwrap();
        assert_eq!(verdict.status, Status::Normal);
        // exact: the mean of one score is that score
        assert_eq!(verdict.average_score, 0.2);
    }

    #[test]
    fn test_scenario_empty_series() {
        let model = scenario_model();
        let svc = service(model.clone());
        let err = svc.score(&[]).unwrap_err();
        assert_eq!(err, ScoringError::Validation(ValidationError::EmptySeries));
        assert!(err.is_client_error());
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_negative_power_never_reaches_model() {
        let model = scenario_model();
        let svc = service(model.clone());
        let err = svc
            .score(&points(&[("2025-10-16T08:00:00", 0.5), ("2025-10-16T08:10:00", -1.0)]))
            .unwrap_err();
        assert!(matches!(
            err,
            ScoringError::Validation(ValidationError::NegativePower { index: 1, .. })
        ));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_verdict_invariant_to_input_order() {
        let svc = service(Arc::new(PositionalModel));
        let powers = [0.5, 0.6, 5.0];
        let ordered = points(&[
            ("2025-10-16T08:00:00", powers[0]),
            ("2025-10-16T08:10:00", powers[1]),
            ("2025-10-16T08:20:00", powers[2]),
        ]);
        let expected = svc.score(&ordered).unwrap();
        assert_eq!(expected.status, Status::Warning);
        assert!((expected.average_score - (0.05 + 0.12 + 1.5) / 3.0).abs() < 1e-12);

        let permutations = [[0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
        for perm in permutations {
            // the model itself would disagree if handed the rows unsorted
            let unsorted: Vec<f64> = perm.iter().map(|&i| powers[i]).collect();
            let raw_scores = PositionalModel
                .score(&FeatureMatrix::from_power_column(&unsorted))
                .unwrap();
            assert_ne!(raw_scores.mean(), Some(expected.average_score), "permutation {:?}", perm);

            let shuffled: Vec<RawPoint> = perm.iter().map(|&i| ordered[i].clone()).collect();
            let verdict = svc.score(&shuffled).unwrap();
            assert_eq!(verdict, expected, "permutation {:?}", perm);
        }
    }

    #[test]
    fn test_scoring_is_idempotent() {
        let svc = service(scenario_model());
        let input = points(&[
            ("2025-10-16T08:00:00", 0.5),
            ("2025-10-16T08:10:00", 0.6),
            ("2025-10-16T08:20:00", 0.4),
        ]);
        let first = svc.score(&input).unwrap();
        let second = svc.score(&input).unwrap();
        assert_eq!(first.average_score.to_bits(), second.average_score.to_bits());
        assert_eq!(first, second);
    }

    #[test]
    fn test_model_failure_is_inference_error() {
        let svc = service(Arc::new(FailingModel));
        let err = svc.score(&points(&[("2025-10-16T08:00:00", 0.5)])).unwrap_err();
        assert_eq!(
            err,
            ScoringError::Inference(InferenceError::Model("numerical failure".to_string()))
        );
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_contract_violation_is_inference_error() {
        let svc = service(Arc::new(TruncatingModel));
        let err = svc
            .score(&points(&[("2025-10-16T08:00:00", 0.5), ("2025-10-16T08:10:00", 0.6)]))
            .unwrap_err();
        assert_eq!(
            err,
            ScoringError::Inference(InferenceError::LengthMismatch { rows: 2, scores: 1, labels: 2 })
        );
    }

    #[test]
    fn test_threshold_from_config() {
        let svc = ScoringService::new(scenario_model(), DecisionConfig::new(0.25));
        let verdict = svc.score(&points(&[("2025-10-16T08:00:00", 0.4)])).unwrap();
        assert_eq!(verdict.status, Status::Warning);
        assert_eq!(svc.config().anomaly_score_threshold, 0.25);
        assert_eq!(svc.model().name(), "lookup");
    }

    #[test]
    fn test_service_shared_across_threads() {
        let svc = service(scenario_model());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let svc = svc.clone();
                std::thread::spawn(move || {
                    svc.score(&points(&[("2025-10-16T08:00:00", 0.4)])).unwrap()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().status, Status::Normal);
        }
    }
}

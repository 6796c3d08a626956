//! Verdict Engine - fuses per-row model output into one session verdict

use super::threshold::DecisionConfig;
use super::types::{Status, Verdict};
use crate::logic::model::{InferenceError, LabelVector, ScoreVector};

#[derive(Debug, Clone, Default)]
pub struct VerdictEngine {
    config: DecisionConfig,
}

impl VerdictEngine {
    pub fn new(config: DecisionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    /// Mean score + any hard label, combined by the configured fusion rule.
    ///
    /// Errors only when the inputs break the model output contract
    /// (empty or mismatched lengths).
    pub fn decide(
        &self,
        scores: &ScoreVector,
        labels: &LabelVector,
    ) -> Result<Verdict, InferenceError> {
        if scores.len() != labels.len() {
            return Err(InferenceError::LengthMismatch {
                rows: scores.len(),
                scores: scores.len(),
                labels: labels.len(),
            });
        }
        let average_score = scores.mean().ok_or(InferenceError::EmptyOutput)?;

        let hard_flag = labels.iter().any(|label| label.is_anomalous());
        let soft_flag = self.config.is_soft_anomaly(average_score);

        let status = if self.config.fusion.combine(hard_flag, soft_flag) {
            Status::Warning
        } else {
            Status::Normal
        };

        log::debug!(
            "verdict: n={} avg={:.6} hard={} soft={} fusion={} -> {}",
            scores.len(),
            average_score,
            hard_flag,
            soft_flag,
            self.config.fusion,
            status
        );

        Ok(Verdict {
            status,
            average_score,
            message: status.message().to_string(),
        })
    }
}

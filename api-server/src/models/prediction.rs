//! Prediction request/response bodies

use powerwatch_core::{RawPoint, Status, Verdict};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct PredictRequest {
    pub time_series: Vec<RawPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResponse {
    pub status: Status,
    pub average_anomaly_score: f64,
    pub message: String,
}

impl From<Verdict> for PredictionResponse {
    fn from(verdict: Verdict) -> Self {
        Self {
            status: verdict.status,
            average_anomaly_score: verdict.average_score,
            message: verdict.message,
        }
    }
}

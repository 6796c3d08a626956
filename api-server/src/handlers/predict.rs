//! Anomaly prediction handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use crate::models::{PredictRequest, PredictionResponse};
use crate::{AppResult, AppState};

/// POST /predict_anomaly
///
/// Scoring is CPU-bound, so it runs on the blocking pool.
pub async fn predict_anomaly(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> AppResult<Json<PredictionResponse>> {
    let Json(request) = payload?;
    let service = state.service.clone();
    let n_points = request.time_series.len();

    let verdict = tokio::task::spawn_blocking(move || service.score(&request.time_series)).await??;

    tracing::info!(
        "Scored {} points: {} (avg {:.6})",
        n_points,
        verdict.status,
        verdict.average_score
    );

    Ok(Json(verdict.into()))
}

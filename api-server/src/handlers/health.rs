//! Health check handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::{AppState, ModelInfo};

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    model: ModelInfo,
    timestamp: i64,
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        model: state.model_info.clone(),
        timestamp: chrono::Utc::now().timestamp(),
    })
}

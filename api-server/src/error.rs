//! Error handling

use axum::{
    extract::rejection::JsonRejection,
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use powerwatch_core::ScoringError;
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    // Caller errors
    #[error("invalid input: {0}")]
    ValidationError(String),

    // Model errors
    #[error("inference failed: {0}")]
    InferenceError(String),

    // Generic errors
    #[error("internal error: {0}")]
    InternalError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = match &self {
            AppError::ValidationError(msg) => {
                tracing::debug!("Rejected request: {}", self);
                json!({
                    "error": msg,
                    "status": StatusCode::BAD_REQUEST.as_u16()
                })
            }
            AppError::InferenceError(msg) => {
                // already logged at error level by the scoring service
                tracing::debug!("Responding 500: {}", self);
                json!({
                    "error": "Model inference failed",
                    "detail": msg,
                    "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16()
                })
            }
            AppError::InternalError(_) => {
                tracing::error!("{}", self);
                json!({
                    "error": "Internal server error",
                    "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16()
                })
            }
        };

        (self.status_code(), Json(body)).into_response()
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::InferenceError(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ScoringError> for AppError {
    fn from(err: ScoringError) -> Self {
        match err {
            ScoringError::Validation(e) => AppError::ValidationError(e.to_string()),
            ScoringError::Inference(e) => AppError::InferenceError(e.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::InternalError(format!("scoring task failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use powerwatch_core::{InferenceError, ValidationError};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    #[test]
    fn test_scoring_errors_map_to_categories() {
        let validation: AppError = ScoringError::Validation(ValidationError::EmptySeries).into();
        assert_eq!(validation.status_code(), StatusCode::BAD_REQUEST);

        let inference: AppError =
            ScoringError::Inference(InferenceError::Model("boom".to_string())).into();
        assert_eq!(inference.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(
            AppError::InternalError("x".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    /// Counts error-level events seen by the subscriber.
    struct ErrorCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for ErrorCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::ERROR {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn error_events(err: AppError) -> usize {
        let count = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(ErrorCounter(count.clone()));
        tracing::subscriber::with_default(subscriber, || {
            let _ = err.into_response();
        });
        count.load(Ordering::SeqCst)
    }

    #[test]
    fn test_inference_failure_is_not_logged_again() {
        let inference = ScoringError::Inference(InferenceError::Model("boom".to_string()));
        assert_eq!(error_events(inference.into()), 0);
        assert_eq!(error_events(AppError::InternalError("join".to_string())), 1);
    }

    #[test]
    fn test_validation_reason_is_kept() {
        match AppError::from(ScoringError::Validation(ValidationError::EmptySeries)) {
            AppError::ValidationError(msg) => assert_eq!(msg, ValidationError::EmptySeries.to_string()),
            other => panic!("expected ValidationError, got {:?}", other),
        }
    }
}

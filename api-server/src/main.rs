//! PowerWatch Scoring Server
//!
//! HTTP front for the power consumption anomaly scorer.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   POWERWATCH SERVER                      │
//! ├──────────────────────────────────────────────────────────┤
//! │  POST /predict_anomaly ──► ScoringService                │
//! │                             validate → features →        │
//! │                             model (Arc, read-only) →     │
//! │                             verdict                      │
//! │  GET  /health                                            │
//! │                                                          │
//! │  Model artifact loaded once at startup, never reloaded   │
//! └──────────────────────────────────────────────────────────┘
//! ```

mod config;
mod models;
mod handlers;
mod error;


use anyhow::Context;
use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use powerwatch_core::logic::features::LayoutInfo;
use powerwatch_core::{load_model, LoadedModel, ModelMetadata, ScoringService};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use error::{AppError, AppResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env first so RUST_LOG can come from it
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "powerwatch_server=debug,powerwatch_core=info,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::from_env().context("invalid configuration")?;

    tracing::info!("PowerWatch server starting ({})...", config.environment);
    tracing::info!("Model: {}", config.model_path);
    tracing::info!(
        "Decision: threshold={} fusion={}",
        config.anomaly_score_threshold,
        config.fusion
    );

    // Load the model once; refuse to serve without it
    let loaded = load_startup_model(&config.model_path)?;
    tracing::info!(
        "Model loaded: {} trees, {} feature(s), trained {}",
        loaded.metadata.n_trees,
        loaded.metadata.n_features,
        loaded.metadata.trained_at
    );

    // Build application state
    let state = AppState {
        service: ScoringService::new(loaded.model, config.decision_config()),
        model_info: ModelInfo::from(&loaded.metadata),
        config: config.clone(),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind((config.bind_addr.as_str(), config.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", config.bind_addr, config.port))?;
    tracing::info!("🚀 Server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Load the artifact, naming which side failed (file system or model).
fn load_startup_model(path: &str) -> anyhow::Result<LoadedModel> {
    load_model(path).map_err(|e| {
        let fault = if e.is_filesystem_fault() {
            "file system"
        } else {
            "model"
        };
        anyhow::Error::new(e).context(format!(
            "refusing to start: {} fault while loading model artifact '{}'",
            fault, path
        ))
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: ScoringService,
    pub model_info: ModelInfo,
    pub config: config::Config,
}

/// Model summary exposed by /health
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub n_features: usize,
    pub n_trees: usize,
    pub layout: LayoutInfo,
}

impl From<&ModelMetadata> for ModelInfo {
    fn from(metadata: &ModelMetadata) -> Self {
        Self {
            name: metadata.model_type.clone(),
            n_features: metadata.n_features,
            n_trees: metadata.n_trees,
            layout: metadata.layout.clone(),
        }
    }
}

/// `*` anywhere in the list opens CORS to every origin.
fn cors_layer(config: &config::Config) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if config.allows_any_origin() {
        tracing::warn!("CORS open to any origin");
        return cors.allow_origin(AllowOrigin::any());
    }

    let allowed: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(allowed))
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(handlers::health::check))
        .route("/predict_anomaly", post(handlers::predict::predict_anomaly))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

//! Central Configuration Constants
//!
//! Single source of truth for scoring defaults.
//! The HTTP server and the offline tooling both read from here.

/// Default location of the trained model artifact
pub const DEFAULT_MODEL_PATH: &str = "anomaly_detector.json";

/// Default session-level warning threshold.
///
/// Isolation forest decision scores: lower means more anomalous.
/// A session whose average score falls below this value is flagged.
pub const DEFAULT_ANOMALY_SCORE_THRESHOLD: f64 = 0.05;

/// Message returned with a `Warning` verdict
pub const WARNING_MESSAGE: &str =
    "Abnormal power consumption pattern detected. Inspect the related equipment immediately.";

/// Message returned with a `Normal` verdict
pub const NORMAL_MESSAGE: &str =
    "Power consumption pattern is stable. No anomaly detected.";

/// Default contamination rate used when training
pub const DEFAULT_CONTAMINATION: f64 = 0.05;

/// Default number of trees in the forest
pub const DEFAULT_N_ESTIMATORS: usize = 100;

/// Default sub-sample size per tree
pub const DEFAULT_MAX_SAMPLES: usize = 256;

/// Default training seed (reproducible artifacts)
pub const DEFAULT_SEED: u64 = 42;

/// Core version
pub const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

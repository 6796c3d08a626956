//! PowerWatch Core - power consumption anomaly scoring
//!
//! Turns a caller-supplied power time series into a `Normal`/`Warning`
//! verdict using a pre-trained isolation forest.

pub mod constants;
pub mod logic;

pub use logic::model::{
    load_model, AnomalyModel, ArtifactError, InferenceError, Label, LoadedModel, ModelMetadata,
    SharedModel,
};
pub use logic::series::{RawPoint, TimeSeries, TimeSeriesValidator, ValidationError};
pub use logic::service::{ScoringError, ScoringService};
pub use logic::verdict::{DecisionConfig, FusionRule, Status, Verdict, VerdictEngine};

//! Verdict Module - Session-level decision
//!
//! Combines per-row scores and labels into `Normal` or `Warning`.

pub mod engine;
pub mod threshold;
pub mod types;

pub use engine::VerdictEngine;
pub use threshold::{DecisionConfig, FusionRule};
pub use types::{Status, Verdict};

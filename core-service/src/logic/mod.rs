//! Logic Module - Scoring pipeline & offline tooling
//!
//! Request path: `series` (validate) → `features` (extract) → `model`
//! (infer) → `verdict` (decide), wired together by `service`.
//!
//! `training` is offline only (simulation + fitting).

// Scoring pipeline
pub mod series;
pub mod features;
pub mod model;
pub mod verdict;
pub mod service;

// Offline tooling
pub mod training;

//! Time series data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point exactly as the caller submitted it, before validation.
///
/// `power_kw` is optional so a missing reading surfaces as a validation
/// failure with a point index instead of an opaque decode error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPoint {
    pub timestamp: String,
    #[serde(rename = "power_kW", default)]
    pub power_kw: Option<f64>,
}

impl RawPoint {
    pub fn new(timestamp: impl Into<String>, power_kw: f64) -> Self {
        Self {
            timestamp: timestamp.into(),
            power_kw: Some(power_kw),
        }
    }
}

/// A validated reading. Power is finite and non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DataPoint {
    timestamp: DateTime<Utc>,
    power_kw: f64,
}

impl DataPoint {
    /// Only the validator builds points, so the invariant holds everywhere else.
    pub(crate) fn new(timestamp: DateTime<Utc>, power_kw: f64) -> Self {
        Self { timestamp, power_kw }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn power_kw(&self) -> f64 {
        self.power_kw
    }
}

/// Non-empty, timestamp-ordered sequence of validated points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    points: Vec<DataPoint>,
}

impl TimeSeries {
    pub(crate) fn from_sorted(points: Vec<DataPoint>) -> Self {
        debug_assert!(!points.is_empty());
        debug_assert!(points.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        Self { points }
    }

    pub fn points(&self) -> &[DataPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn powers(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.power_kw)
    }
}

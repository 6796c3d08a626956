use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

use super::types::{DataPoint, RawPoint, TimeSeries};

/// Naive (offset-less) ISO 8601 layouts accepted after RFC 3339.
/// Naive values are read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("time series must contain at least one point")]
    EmptySeries,

    #[error("point {index}: power_kW is missing")]
    MissingPower { index: usize },

    #[error("point {index}: power_kW must be >= 0, got {value}")]
    NegativePower { index: usize, value: f64 },

    #[error("point {index}: power_kW must be a finite number")]
    NonFinitePower { index: usize },

    #[error("point {index}: cannot parse timestamp '{value}' as ISO 8601")]
    InvalidTimestamp { index: usize, value: String },
}

/// Parse an ISO 8601 timestamp.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Boundary validation for caller-supplied series.
///
/// Rejects the whole request on the first invalid point; nothing is
/// dropped or clamped.
pub struct TimeSeriesValidator;

impl TimeSeriesValidator {
    pub fn validate(raw: &[RawPoint]) -> Result<TimeSeries, ValidationError> {
        if raw.is_empty() {
            return Err(ValidationError::EmptySeries);
        }

        let mut points = raw
            .iter()
            .enumerate()
            .map(|(index, point)| Self::validate_point(index, point))
            .collect::<Result<Vec<_>, _>>()?;

        // Vec::sort_by is stable: equal timestamps keep submission order
        points.sort_by(|a, b| a.timestamp().cmp(&b.timestamp()));

        Ok(TimeSeries::from_sorted(points))
    }

    fn validate_point(index: usize, point: &RawPoint) -> Result<DataPoint, ValidationError> {
        let power = point
            .power_kw
            .ok_or(ValidationError::MissingPower { index })?;

        if !power.is_finite() {
            return Err(ValidationError::NonFinitePower { index });
        }
        if power < 0.0 {
            return Err(ValidationError::NegativePower { index, value: power });
        }

        let timestamp = parse_timestamp(&point.timestamp).ok_or_else(|| {
            ValidationError::InvalidTimestamp {
                index,
                value: point.timestamp.clone(),
            }
        })?;

        Ok(DataPoint::new(timestamp, power))
    }
}

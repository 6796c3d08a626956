//! Series Module - Boundary validation of incoming readings
//!
//! Raw caller records are validated exactly once here and turned into a
//! time-ordered `TimeSeries`. Nothing downstream re-validates.

pub mod types;
pub mod validate;

pub use types::{DataPoint, RawPoint, TimeSeries};
pub use validate::{parse_timestamp, TimeSeriesValidator, ValidationError};

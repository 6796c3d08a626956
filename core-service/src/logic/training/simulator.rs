//! Synthetic power data for training and demos
//!
//! Time-of-day base load plus Gaussian noise, with a few high-power spikes
//! injected at random interior positions.

use std::io::{self, Read, Write};

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logic::series::{parse_timestamp, RawPoint};

/// Base load by hour range `[start, end)` in kW
const BASE_POWER_LEVELS: &[(u32, u32, f64)] = &[
    (0, 6, 0.2),   // night, low-power mode
    (6, 9, 0.8),   // early morning
    (9, 17, 0.6),  // daytime
    (17, 22, 1.5), // evening peak
    (22, 24, 0.4), // late evening
];

const CSV_HEADER: [&str; 3] = ["timestamp", "power_kW", "is_anomaly"];

/// Upper bound on one simulated series
pub const MAX_SIMULATED_POINTS: usize = 10_000_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub start: DateTime<Utc>,
    pub days: u32,
    pub interval_minutes: u32,
    pub anomaly_count: usize,
    pub noise_std: f64,
    pub anomaly_min_kw: f64,
    pub anomaly_max_kw: f64,
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start: Utc.with_ymd_and_hms(2025, 10, 16, 0, 0, 0).single().unwrap_or_default(),
            days: 2,
            interval_minutes: 10,
            anomaly_count: 8,
            noise_std: 0.1,
            anomaly_min_kw: 3.0,
            anomaly_max_kw: 6.0,
            seed: None,
        }
    }
}

impl SimulationConfig {
    /// Minutes covered by the whole series. Cannot overflow: `u32::MAX` days
    /// still fits in `u64` minutes.
    pub fn span_minutes(&self) -> u64 {
        u64::from(self.days) * 24 * 60
    }

    /// `None` when the interval is zero or the count does not fit `usize`
    pub fn total_points(&self) -> Option<usize> {
        if self.interval_minutes == 0 {
            return None;
        }
        usize::try_from(self.span_minutes() / u64::from(self.interval_minutes)).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("interval must be at least 1 minute")]
    ZeroInterval,

    #[error("{days} days at {interval_minutes} min intervals exceeds {max} points", max = MAX_SIMULATED_POINTS)]
    TooManyPoints { days: u32, interval_minutes: u32 },

    #[error("series end falls outside the representable date range")]
    OutOfRange,

    #[error("noise standard deviation must be finite and non-negative, got {0}")]
    InvalidNoise(f64),

    #[error("anomaly range {min}..={max} kW is empty or not finite")]
    InvalidAnomalyRange { min: f64, max: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedPoint {
    pub timestamp: DateTime<Utc>,
    pub power_kw: f64,
    pub is_anomaly: bool,
}

impl SimulatedPoint {
    pub fn to_raw(&self) -> RawPoint {
        RawPoint::new(self.timestamp.to_rfc3339(), self.power_kw)
    }
}

/// One CSV row. The label column is optional so unlabelled recordings can
/// be scored too.
#[derive(Debug, Serialize, Deserialize)]
struct CsvRecord {
    timestamp: String,
    #[serde(rename = "power_kW")]
    power_kw: f64,
    #[serde(default)]
    is_anomaly: Option<u8>,
}

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}: {reason}")]
    Malformed { line: u64, reason: String },
}

/// Base load for an hour of the day
pub fn base_power_level(hour: u32) -> f64 {
    BASE_POWER_LEVELS
        .iter()
        .find(|(start, end, _)| (*start..*end).contains(&hour))
        .map(|(_, _, level)| *level)
        .unwrap_or(0.0)
}

pub fn simulate(config: &SimulationConfig) -> Result<Vec<SimulatedPoint>, SimulationError> {
    let total = config.total_points().ok_or(if config.interval_minutes == 0 {
        SimulationError::ZeroInterval
    } else {
        SimulationError::TooManyPoints {
            days: config.days,
            interval_minutes: config.interval_minutes,
        }
    })?;
    if total > MAX_SIMULATED_POINTS {
        return Err(SimulationError::TooManyPoints {
            days: config.days,
            interval_minutes: config.interval_minutes,
        });
    }

    // span_minutes() <= u32::MAX * 1440, well inside what Duration holds
    config
        .start
        .checked_add_signed(Duration::minutes(config.span_minutes() as i64))
        .ok_or(SimulationError::OutOfRange)?;

    let noise = Normal::new(0.0, config.noise_std)
        .map_err(|_| SimulationError::InvalidNoise(config.noise_std))?;
    let (min_kw, max_kw) = (config.anomaly_min_kw, config.anomaly_max_kw);
    if !(min_kw.is_finite() && max_kw.is_finite() && min_kw <= max_kw) {
        return Err(SimulationError::InvalidAnomalyRange {
            min: min_kw,
            max: max_kw,
        });
    }

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let interval = i64::from(config.interval_minutes);

    let mut points: Vec<SimulatedPoint> = (0..total)
        .map(|i| {
            let timestamp = config.start + Duration::minutes(interval * i as i64);
            let power_kw = (base_power_level(timestamp.hour()) + rng.sample(noise)).max(0.0);
            SimulatedPoint {
                timestamp,
                power_kw,
                is_anomaly: false,
            }
        })
        .collect();

    // first and last stay normal
    if total > 2 {
        let count = config.anomaly_count.min(total - 2);
        for offset in index::sample(&mut rng, total - 2, count) {
            let point = &mut points[offset + 1];
            point.power_kw = rng.gen_range(min_kw..=max_kw);
            point.is_anomaly = true;
        }
    }

    log::info!(
        "Simulated {} points ({} anomalies)",
        points.len(),
        points.iter().filter(|p| p.is_anomaly).count()
    );

    Ok(points)
}

pub fn write_csv<W: Write>(points: &[SimulatedPoint], out: W) -> Result<(), CsvError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(out);

    // explicit header so an empty series still gets one
    writer.write_record(CSV_HEADER)?;
    for p in points {
        writer.serialize(CsvRecord {
            timestamp: p.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
            power_kw: p.power_kw,
            is_anomaly: Some(u8::from(p.is_anomaly)),
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Read `timestamp,power_kW[,is_anomaly]` rows, header required
pub fn read_csv<R: Read>(input: R) -> Result<Vec<SimulatedPoint>, CsvError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input);
    let headers = reader.headers()?.clone();

    let mut points = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let malformed = |reason: String| CsvError::Malformed { line, reason };

        let row: CsvRecord = record
            .deserialize(Some(&headers))
            .map_err(|e| malformed(e.to_string()))?;

        let timestamp = parse_timestamp(&row.timestamp)
            .ok_or_else(|| malformed(format!("bad timestamp '{}'", row.timestamp)))?;
        let is_anomaly = match row.is_anomaly {
            None | Some(0) => false,
            Some(1) => true,
            Some(other) => return Err(malformed(format!("bad is_anomaly flag '{}'", other))),
        };

        points.push(SimulatedPoint {
            timestamp,
            power_kw: row.power_kw,
            is_anomaly,
        });
    }

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn seeded() -> SimulationConfig {
        SimulationConfig {
            seed: Some(7),
            ..Default::default()
        }
    }

    #[test]
    fn test_base_power_levels() {
        assert_eq!(base_power_level(0), 0.2);
        assert_eq!(base_power_level(5), 0.2);
        assert_eq!(base_power_level(6), 0.8);
        assert_eq!(base_power_level(12), 0.6);
        assert_eq!(base_power_level(18), 1.5);
        assert_eq!(base_power_level(23), 0.4);
        assert_eq!(base_power_level(24), 0.0);
    }

    #[test]
    fn test_default_shape() {
        let points = simulate(&seeded()).unwrap();
        assert_eq!(points.len(), 288);
        assert_eq!(points.iter().filter(|p| p.is_anomaly).count(), 8);
        assert!(!points[0].is_anomaly);
        assert!(!points[287].is_anomaly);
        assert!(points.iter().all(|p| p.power_kw >= 0.0));
        assert!(points
            .iter()
            .filter(|p| p.is_anomaly)
            .all(|p| (3.0..=6.0).contains(&p.power_kw)));
        assert_eq!(points[1].timestamp - points[0].timestamp, Duration::minutes(10));
    }

    #[test]
    fn test_seeded_simulation_is_reproducible() {
        assert_eq!(simulate(&seeded()).unwrap(), simulate(&seeded()).unwrap());
    }

    #[test]
    fn test_tiny_series_has_no_room_for_anomalies() {
        let config = SimulationConfig {
            days: 1,
            interval_minutes: 720,
            ..seeded()
        };
        let points = simulate(&config).unwrap();
        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|p| !p.is_anomaly));
    }

    #[test]
    fn test_csv_round_trip_keeps_labels() {
        let points = simulate(&seeded()).unwrap();
        let mut buf = Vec::new();
        write_csv(&points, &mut buf).unwrap();

        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("timestamp,power_kW,is_anomaly\n"));

        let read = read_csv(Cursor::new(buf)).unwrap();
        assert_eq!(read.len(), points.len());
        for (a, b) in read.iter().zip(&points) {
            assert_eq!(a.timestamp, b.timestamp);
            assert_eq!(a.is_anomaly, b.is_anomaly);
            assert_eq!(a.power_kw, b.power_kw);
        }
    }

    #[test]
    fn test_read_csv_without_label_column() {
        let input = "timestamp,power_kW\n2025-10-16T08:00:00,0.5\n\n2025-10-16T08:10:00,0.7\n";
        let points = read_csv(Cursor::new(input)).unwrap();
        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|p| !p.is_anomaly));
    }

    #[test]
    fn test_read_csv_reports_line() {
        let input = "timestamp,power_kW,is_anomaly\n2025-10-16T08:00:00,abc,0\n";
        match read_csv(Cursor::new(input)) {
            Err(CsvError::Malformed { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_read_csv_accepts_quoted_fields() {
        let input = "timestamp,power_kW,is_anomaly\n\"2025-10-16T08:00:00\",0.5,0\n\"2025-10-16T08:10:00\",\"4.2\",1\n";
        let points = read_csv(Cursor::new(input)).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].timestamp, parse_timestamp("2025-10-16T08:00:00").unwrap());
        assert_eq!(points[1].power_kw, 4.2);
        assert!(points[1].is_anomaly);
    }

    #[test]
    fn test_read_csv_rejects_unknown_flag() {
        let input = "timestamp,power_kW,is_anomaly\n2025-10-16T08:00:00,0.5,0\n2025-10-16T08:10:00,0.5,7\n";
        match read_csv(Cursor::new(input)) {
            Err(CsvError::Malformed { line, reason }) => {
                assert_eq!(line, 3);
                assert!(reason.contains("is_anomaly"));
            }
            other => panic!("expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_series_still_writes_header() {
        let mut buf = Vec::new();
        write_csv(&[], &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf.clone()).unwrap(), "timestamp,power_kW,is_anomaly\n");
        assert!(read_csv(Cursor::new(buf)).unwrap().is_empty());
    }

    #[test]
    fn test_huge_day_count_is_rejected_not_overflowed() {
        let config = SimulationConfig {
            days: u32::MAX,
            interval_minutes: 1,
            ..seeded()
        };
        assert_eq!(config.span_minutes(), u64::from(u32::MAX) * 1440);
        assert!(matches!(
            simulate(&config),
            Err(SimulationError::TooManyPoints { days: u32::MAX, .. })
        ));

        // few points, but the end date is past what chrono can represent
        let sparse = SimulationConfig {
            interval_minutes: u32::MAX,
            ..config
        };
        assert_eq!(simulate(&sparse), Err(SimulationError::OutOfRange));
    }

    #[test]
    fn test_bad_parameters_are_rejected() {
        let zero = SimulationConfig {
            interval_minutes: 0,
            ..seeded()
        };
        assert_eq!(zero.total_points(), None);
        assert_eq!(simulate(&zero), Err(SimulationError::ZeroInterval));

        let noisy = SimulationConfig {
            noise_std: -1.0,
            ..seeded()
        };
        assert!(matches!(simulate(&noisy), Err(SimulationError::InvalidNoise(_))));

        let inverted = SimulationConfig {
            anomaly_min_kw: 6.0,
            anomaly_max_kw: 3.0,
            ..seeded()
        };
        assert!(matches!(
            simulate(&inverted),
            Err(SimulationError::InvalidAnomalyRange { .. })
        ));
    }

    #[test]
    fn test_zero_noise_follows_base_load() {
        let config = SimulationConfig {
            noise_std: 0.0,
            anomaly_count: 0,
            ..seeded()
        };
        let points = simulate(&config).unwrap();
        assert!(points
            .iter()
            .all(|p| p.power_kw == base_power_level(p.timestamp.hour())));
    }

    #[test]
    fn test_to_raw_is_valid_input() {
        let point = &simulate(&seeded()).unwrap()[0];
        let raw = point.to_raw();
        assert_eq!(parse_timestamp(&raw.timestamp), Some(point.timestamp));
        assert_eq!(raw.power_kw, Some(point.power_kw));
    }
}

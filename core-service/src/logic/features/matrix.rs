//! Feature Matrix - Core data structure for model input
//!
//! One row per validated point, in time order, with columns laid out
//! by `layout.rs`.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use super::layout::{FEATURE_COUNT, POWER_COLUMN};
use crate::logic::series::TimeSeries;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    values: Array2<f64>,
}

impl FeatureMatrix {
    /// Extract features from a validated series. Row order = series order.
    pub fn from_series(series: &TimeSeries) -> Self {
        let mut values = Array2::<f64>::zeros((series.len(), FEATURE_COUNT));
        for (row, power) in series.powers().enumerate() {
            values[[row, POWER_COLUMN]] = power;
        }
        Self { values }
    }

    /// Single-column matrix from raw power readings (offline training).
    pub fn from_power_column(powers: &[f64]) -> Self {
        let values = Array2::from_shape_fn((powers.len(), FEATURE_COUNT), |(row, col)| {
            if col == POWER_COLUMN {
                powers[row]
            } else {
                0.0
            }
        });
        Self { values }
    }

    /// Wrap an arbitrary array. Column count is not checked here;
    /// models check arity against what they were trained on.
    pub fn from_array(values: Array2<f64>) -> Self {
        Self { values }
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.values.ncols()
    }

    pub fn row(&self, index: usize) -> ArrayView1<'_, f64> {
        self.values.row(index)
    }

    pub fn rows(&self) -> impl Iterator<Item = ArrayView1<'_, f64>> {
        self.values.axis_iter(Axis(0))
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }
}

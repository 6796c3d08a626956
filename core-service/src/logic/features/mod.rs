//! Features Module - Feature extraction from validated series
//!
//! The layout is versioned so trained artifacts can be checked against it.

pub mod layout;
pub mod matrix;


pub use layout::{LayoutInfo, FEATURE_COUNT, FEATURE_LAYOUT, FEATURE_VERSION, POWER_COLUMN};
pub use matrix::FeatureMatrix;

//! Training Module - Offline data simulation and model fitting
//!
//! Used by the `train-model` binary. Nothing here runs in the server.

pub mod simulator;
pub mod trainer;

pub use simulator::{
    base_power_level, read_csv, simulate, write_csv, CsvError, SimulatedPoint, SimulationConfig,
    SimulationError, MAX_SIMULATED_POINTS,
};
pub use trainer::{train, TrainingError, TrainingReport};

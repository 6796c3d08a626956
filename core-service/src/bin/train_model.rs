//! train-model - offline data simulation, training and batch scoring

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use powerwatch_core::constants::{
    DEFAULT_ANOMALY_SCORE_THRESHOLD, DEFAULT_CONTAMINATION, DEFAULT_MAX_SAMPLES,
    DEFAULT_MODEL_PATH, DEFAULT_N_ESTIMATORS, DEFAULT_SEED,
};
use powerwatch_core::logic::model::{load_model, ForestParams, ModelArtifact};
use powerwatch_core::logic::training::{self, SimulatedPoint, SimulationConfig};
use powerwatch_core::{DecisionConfig, FusionRule, RawPoint, ScoringService};

#[derive(Parser)]
#[command(name = "train-model")]
#[command(about = "Simulate power data, train and try out the anomaly model", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a synthetic labelled power series as CSV
    Simulate {
        /// Output CSV file
        #[arg(short, long, default_value = "simulated_power_data.csv")]
        output: PathBuf,

        /// Days of data
        #[arg(long, default_value = "2")]
        days: u32,

        /// Sampling interval in minutes
        #[arg(long, default_value = "10")]
        interval: u32,

        /// Number of injected spikes
        #[arg(long, default_value = "8")]
        anomalies: usize,

        /// RNG seed (random if omitted)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Train an isolation forest and write the model artifact
    Train {
        /// Input CSV (timestamp,power_kW,is_anomaly); simulated data if omitted
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output artifact
        #[arg(short, long, default_value = DEFAULT_MODEL_PATH)]
        output: PathBuf,

        #[arg(long, default_value_t = DEFAULT_N_ESTIMATORS)]
        n_estimators: usize,

        #[arg(long, default_value_t = DEFAULT_MAX_SAMPLES)]
        max_samples: usize,

        /// Expected anomaly share in the training data
        #[arg(long, default_value_t = DEFAULT_CONTAMINATION)]
        contamination: f64,

        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,
    },

    /// Score a CSV file as one session with a trained artifact
    Score {
        /// Input CSV (timestamp,power_kW[,is_anomaly])
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, default_value = DEFAULT_MODEL_PATH)]
        model: PathBuf,

        #[arg(long, default_value_t = DEFAULT_ANOMALY_SCORE_THRESHOLD)]
        threshold: f64,

        /// Fusion rule (either, both, hard_only, soft_only)
        #[arg(long, default_value = "either")]
        fusion: FusionRule,
    },
}

fn read_points(path: &Path) -> Result<Vec<SimulatedPoint>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    training::read_csv(BufReader::new(file))
        .with_context(|| format!("failed to read {}", path.display()))
}

fn write_points(path: &Path, points: &[SimulatedPoint]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    training::write_csv(points, BufWriter::new(file))
        .with_context(|| format!("failed to write {}", path.display()))
}

fn simulate(output: &Path, config: SimulationConfig) -> Result<()> {
    let points = training::simulate(&config).context("cannot simulate with these settings")?;
    write_points(output, &points)?;
    println!("Wrote {} points to {}", points.len(), output.display());
    Ok(())
}

fn train(input: Option<&Path>, output: &Path, params: ForestParams) -> Result<()> {
    let points = match input {
        Some(path) => read_points(path)?,
        None => {
            log::info!("No input given, training on simulated data");
            training::simulate(&SimulationConfig {
                seed: params.seed,
                ..Default::default()
            })?
        }
    };

    let (forest, report) = training::train(&points, &params).context("training failed")?;
    ModelArtifact::new(forest, points.len())?.save(output)?;

    println!("{}", report);
    println!("Model saved to {}", output.display());
    Ok(())
}

fn score(input: &Path, model: &Path, config: DecisionConfig) -> Result<()> {
    let loaded = load_model(model)
        .with_context(|| format!("failed to load model from {}", model.display()))?;
    let service = ScoringService::new(loaded.model, config);

    let raw: Vec<RawPoint> = read_points(input)?.iter().map(SimulatedPoint::to_raw).collect();
    let verdict = service.score(&raw)?;

    println!("{}", serde_json::to_string_pretty(&verdict)?);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Simulate {
            output,
            days,
            interval,
            anomalies,
            seed,
        } => simulate(
            &output,
            SimulationConfig {
                days,
                interval_minutes: interval,
                anomaly_count: anomalies,
                seed,
                ..Default::default()
            },
        ),
        Commands::Train {
            input,
            output,
            n_estimators,
            max_samples,
            contamination,
            seed,
        } => train(
            input.as_deref(),
            &output,
            ForestParams {
                n_estimators,
                max_samples,
                contamination,
                seed: Some(seed),
            },
        ),
        Commands::Score {
            input,
            model,
            threshold,
            fusion,
        } => score(
            &input,
            &model,
            DecisionConfig::new(threshold).with_fusion(fusion),
        ),
    }
}

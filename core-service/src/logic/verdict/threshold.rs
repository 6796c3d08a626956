//! Decision Threshold Configuration
//!
//! Session-level threshold and the rule that fuses the two warning
//! signals (per-row hard anomaly, low average score).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_ANOMALY_SCORE_THRESHOLD;

/// How the hard and soft signals combine into a Warning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionRule {
    /// Warning if either signal fires
    #[default]
    Either,
    /// Warning only if both fire
    Both,
    /// Ignore the average score
    HardOnly,
    /// Ignore per-row labels
    SoftOnly,
}

impl FusionRule {
    pub fn combine(self, hard: bool, soft: bool) -> bool {
        match self {
            FusionRule::Either => hard || soft,
            FusionRule::Both => hard && soft,
            FusionRule::HardOnly => hard,
            FusionRule::SoftOnly => soft,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FusionRule::Either => "either",
            FusionRule::Both => "both",
            FusionRule::HardOnly => "hard_only",
            FusionRule::SoftOnly => "soft_only",
        }
    }
}

impl fmt::Display for FusionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FusionRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "either" | "or" => Ok(FusionRule::Either),
            "both" | "and" => Ok(FusionRule::Both),
            "hard_only" | "hard" => Ok(FusionRule::HardOnly),
            "soft_only" | "soft" => Ok(FusionRule::SoftOnly),
            other => Err(format!("unknown fusion rule '{}'", other)),
        }
    }
}

/// Decision Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// Session is soft-flagged when its average score is below this
    pub anomaly_score_threshold: f64,

    /// Signal fusion rule
    pub fusion: FusionRule,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            anomaly_score_threshold: DEFAULT_ANOMALY_SCORE_THRESHOLD,
            fusion: FusionRule::Either,
        }
    }
}

impl DecisionConfig {
    pub fn new(anomaly_score_threshold: f64) -> Self {
        Self {
            anomaly_score_threshold,
            ..Default::default()
        }
    }

    /// More warnings (higher threshold)
    pub fn strict() -> Self {
        Self::new(0.1)
    }

    /// Fewer warnings: only sessions averaging past the model boundary
    pub fn lenient() -> Self {
        Self::new(0.0)
    }

    pub fn with_fusion(mut self, fusion: FusionRule) -> Self {
        self.fusion = fusion;
        self
    }

    pub fn is_soft_anomaly(&self, average_score: f64) -> bool {
        average_score < self.anomaly_score_threshold
    }
}

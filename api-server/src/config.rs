//! Configuration module

use std::env;
use std::str::FromStr;

use anyhow::{bail, Result};
use powerwatch_core::constants::{DEFAULT_ANOMALY_SCORE_THRESHOLD, DEFAULT_MODEL_PATH};
use powerwatch_core::{DecisionConfig, FusionRule};

/// `ALLOWED_ORIGINS` entry that allows every origin
const ANY_ORIGIN: &str = "*";

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:5173,http://127.0.0.1:5173,http://localhost:8000";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Bind address
    pub bind_addr: String,

    /// Model artifact path, loaded once at startup
    pub model_path: String,

    /// Session warning threshold
    pub anomaly_score_threshold: f64,

    /// How hard and soft signals combine
    pub fusion: FusionRule,

    /// Origins allowed by CORS
    pub allowed_origins: Vec<String>,

    /// Environment (development, production)
    pub environment: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            bind_addr: "0.0.0.0".to_string(),
            model_path: DEFAULT_MODEL_PATH.to_string(),
            anomaly_score_threshold: DEFAULT_ANOMALY_SCORE_THRESHOLD,
            fusion: FusionRule::Either,
            allowed_origins: split_origins(DEFAULT_ALLOWED_ORIGINS),
            environment: "development".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Unparsable numbers fall back to defaults
    /// with a warning; a bad threshold or fusion rule is an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let anomaly_score_threshold =
            parse_or("ANOMALY_SCORE_THRESHOLD", &lookup, defaults.anomaly_score_threshold);
        if !anomaly_score_threshold.is_finite() {
            bail!("ANOMALY_SCORE_THRESHOLD must be a finite number, got {}", anomaly_score_threshold);
        }

        let fusion = match lookup("FUSION_RULE") {
            Some(raw) => raw
                .parse::<FusionRule>()
                .map_err(|e| anyhow::anyhow!("FUSION_RULE: {}", e))?,
            None => defaults.fusion,
        };

        Ok(Self {
            port: parse_or("PORT", &lookup, defaults.port),

            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),

            model_path: lookup("MODEL_PATH").unwrap_or(defaults.model_path),

            anomaly_score_threshold,

            fusion,

            allowed_origins: lookup("ALLOWED_ORIGINS")
                .map(|raw| split_origins(&raw))
                .unwrap_or(defaults.allowed_origins),

            environment: lookup("ENVIRONMENT").unwrap_or(defaults.environment),
        })
    }

    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|origin| origin == ANY_ORIGIN)
    }

    pub fn decision_config(&self) -> DecisionConfig {
        DecisionConfig::new(self.anomaly_score_threshold).with_fusion(self.fusion)
    }
}

fn parse_or<T: FromStr>(key: &str, lookup: &impl Fn(&str) -> Option<String>, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparsable {}='{}', using default", key, raw);
            default
        }),
        None => default,
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.bind_addr, "0.0.0.0");
        assert_eq!(config.model_path, "anomaly_detector.json");
        assert_eq!(config.anomaly_score_threshold, 0.05);
        assert_eq!(config.fusion, FusionRule::Either);
        assert_eq!(config.allowed_origins.len(), 3);
        assert_eq!(config.environment, "development");
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("PORT", "9001"),
            ("MODEL_PATH", "/models/forest.json"),
            ("ANOMALY_SCORE_THRESHOLD", "0.1"),
            ("FUSION_RULE", "both"),
            ("ALLOWED_ORIGINS", "https://a.example, ,https://b.example"),
            ("ENVIRONMENT", "production"),
        ])
        .unwrap();

        assert_eq!(config.port, 9001);
        assert_eq!(config.model_path, "/models/forest.json");
        assert_eq!(config.allowed_origins, vec!["https://a.example", "https://b.example"]);
        assert_eq!(config.environment, "production");

        let decision = config.decision_config();
        assert_eq!(decision.anomaly_score_threshold, 0.1);
        assert_eq!(decision.fusion, FusionRule::Both);
    }

    #[test]
    fn test_unparsable_numbers_fall_back() {
        let config = from_pairs(&[("PORT", "eighty"), ("ANOMALY_SCORE_THRESHOLD", "low")]).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.anomaly_score_threshold, 0.05);
    }

    #[test]
    fn test_wildcard_origin() {
        let config = from_pairs(&[("ALLOWED_ORIGINS", " * ")]).unwrap();
        assert_eq!(config.allowed_origins, vec!["*"]);
        assert!(config.allows_any_origin());
        assert!(!from_pairs(&[]).unwrap().allows_any_origin());
    }

    #[test]
    fn test_rejects_non_finite_threshold() {
        assert!(from_pairs(&[("ANOMALY_SCORE_THRESHOLD", "NaN")]).is_err());
        assert!(from_pairs(&[("ANOMALY_SCORE_THRESHOLD", "inf")]).is_err());
    }

    #[test]
    fn test_rejects_unknown_fusion_rule() {
        assert!(from_pairs(&[("FUSION_RULE", "xor")]).is_err());
    }
}

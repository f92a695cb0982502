//! Oracle configuration: seed and crash budget.
//!
//! The seed is fixed for the lifetime of an oracle.  Reproducing a run
//! means constructing an oracle from the same [`OracleConfig`] and
//! replaying the same queries.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// Environment variable overriding [`OracleConfig::seed`].
pub const SEED_ENV: &str = "CRASHCHECK_SEED";

/// Environment variable overriding [`OracleConfig::expected_crashes`].
pub const EXPECTED_CRASHES_ENV: &str = "CRASHCHECK_EXPECTED_CRASHES";

/// Default seed of the shared draw source.
pub const DEFAULT_SEED: u64 = 42;

/// Default target mean number of crashes per run.
pub const DEFAULT_EXPECTED_CRASHES: i64 = 10;

/// Errors loading an oracle configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Configuration for a [`FaultOracle`](crate::oracle::FaultOracle).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Seed of the shared draw source.
    pub seed: u64,
    /// Target mean number of crashes per run.
    pub expected_crashes: i64,
    /// Record every draw in the oracle's draw log.
    pub record_draws: bool,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            expected_crashes: DEFAULT_EXPECTED_CRASHES,
            record_draws: false,
        }
    }
}

impl OracleConfig {
    /// Defaults overridden by `CRASHCHECK_SEED` and
    /// `CRASHCHECK_EXPECTED_CRASHES` where set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup(SEED_ENV) {
            config.seed = parse_var(SEED_ENV, &value)?;
        }
        if let Some(value) = lookup(EXPECTED_CRASHES_ENV) {
            config.expected_crashes = parse_var(EXPECTED_CRASHES_ENV, &value)?;
        }
        Ok(config)
    }

    /// Load a configuration from a JSON file.  Missing fields take
    /// their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config = serde_json::from_reader(file)?;
        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        })
}

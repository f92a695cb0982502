//! Test configuration: scenario shape, iteration counts, crash budget.

use crate::execution::{Actor, ExecutionScenario};
use crashcheck_fault::oracle::FaultOracle;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_ITERATIONS: usize = 200;
pub const DEFAULT_THREADS: usize = 2;
pub const DEFAULT_ACTORS_PER_THREAD: usize = 5;
pub const DEFAULT_ACTORS_BEFORE: usize = 5;
pub const DEFAULT_ACTORS_AFTER: usize = 5;
pub const DEFAULT_INVOCATIONS_PER_ITERATION: usize = 10_000;

/// Errors loading or validating a [`TestConfiguration`].
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Configuration of one concurrent test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfiguration {
    /// Number of scenarios to generate and run.
    pub iterations: usize,
    /// Threads in the parallel part.
    pub threads: usize,
    /// Actors per thread in the parallel part.
    pub actors_per_thread: usize,
    /// Actors in the initial sequential part.
    pub actors_before: usize,
    /// Actors in the final sequential part.
    pub actors_after: usize,
    /// Invocations of each scenario.
    pub invocations_per_iteration: usize,
    /// Target mean number of crashes per invocation.
    pub expected_crashes: i64,
}

impl Default for TestConfiguration {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            threads: DEFAULT_THREADS,
            actors_per_thread: DEFAULT_ACTORS_PER_THREAD,
            actors_before: DEFAULT_ACTORS_BEFORE,
            actors_after: DEFAULT_ACTORS_AFTER,
            invocations_per_iteration: DEFAULT_INVOCATIONS_PER_ITERATION,
            expected_crashes: crashcheck_fault::config::DEFAULT_EXPECTED_CRASHES,
        }
    }
}

impl TestConfiguration {
    /// Reject configurations that cannot run anything.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.iterations == 0 {
            return Err(invalid("iterations", "must be at least 1"));
        }
        if self.threads == 0 {
            return Err(invalid("threads", "must be at least 1"));
        }
        if self.invocations_per_iteration == 0 {
            return Err(invalid("invocations_per_iteration", "must be at least 1"));
        }
        Ok(())
    }

    /// Load and validate a configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let file = File::open(path)?;
        let config: Self = serde_json::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    /// Upper bound on actors in a generated scenario.
    pub fn max_actors(&self) -> usize {
        self.actors_before + self.threads * self.actors_per_thread + self.actors_after
    }

    /// Total invocations over all iterations.
    pub fn total_invocations(&self) -> u64 {
        (self.iterations as u64).saturating_mul(self.invocations_per_iteration as u64)
    }

    /// A scenario of the configured shape in which every actor calls `method`.
    pub fn uniform_scenario(&self, method: &str) -> ExecutionScenario {
        let actors = |n: usize| (0..n).map(|_| Actor::new(method, Vec::new())).collect::<Vec<_>>();
        ExecutionScenario::new(
            actors(self.actors_before),
            (0..self.threads).map(|_| actors(self.actors_per_thread)).collect(),
            actors(self.actors_after),
        )
    }

    /// Point `oracle` at `scenario` before its invocations start.
    ///
    /// `possible_crashes` is the number of crash-eligible points the
    /// instrumentation found per actor.
    pub fn apply_to_oracle(
        &self,
        oracle: &FaultOracle,
        scenario: &ExecutionScenario,
        possible_crashes: i64,
    ) {
        let actors = i64::try_from(scenario.total_actors()).unwrap_or(i64::MAX);
        oracle.configure(possible_crashes, actors, self.expected_crashes);
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigurationError {
    ConfigurationError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crashcheck_fault::config::OracleConfig;
    use crashcheck_fault::tracker::RecoverableStateTracker;
    use std::io::Write;
    use std::sync::Arc;

    #[test]
    fn defaults() {
        let config = TestConfiguration::default();
        assert_eq!(config.iterations, 200);
        assert_eq!(config.threads, 2);
        assert_eq!(config.actors_per_thread, 5);
        assert_eq!(config.actors_before, 5);
        assert_eq!(config.actors_after, 5);
        assert_eq!(config.total_invocations(), 2_000_000);
        assert_eq!(config.expected_crashes, 10);
        assert_eq!(config.max_actors(), 20);
        config.validate().unwrap();
    }

    #[test]
    fn zero_threads_rejected() {
        let config = TestConfiguration {
            threads: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "Invalid threads: must be at least 1");
    }

    #[test]
    fn zero_iterations_rejected() {
        let config = TestConfiguration {
            iterations: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::Invalid { field: "iterations", .. })
        ));
    }

    #[test]
    fn uniform_scenario_has_configured_shape() {
        let config = TestConfiguration {
            threads: 3,
            actors_per_thread: 2,
            actors_before: 1,
            actors_after: 4,
            ..Default::default()
        };
        let scenario = config.uniform_scenario("op");
        assert_eq!(scenario.init.len(), 1);
        assert_eq!(scenario.threads(), 3);
        assert!(scenario.parallel.iter().all(|t| t.len() == 2));
        assert_eq!(scenario.post.len(), 4);
        assert_eq!(scenario.total_actors(), config.max_actors());
    }

    #[test]
    fn load_validates() {
        let path = std::env::temp_dir().join(format!(
            "crashcheck-test-config-{}.json",
            std::process::id()
        ));
        let mut file = File::create(&path).unwrap();
        file.write_all(br#"{ "threads": 0 }"#).unwrap();
        drop(file);

        let result = TestConfiguration::load(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(ConfigurationError::Invalid { .. })));
    }

    #[test]
    fn apply_to_oracle_uses_scenario_actors() {
        let oracle = FaultOracle::new(
            OracleConfig::default(),
            Arc::new(RecoverableStateTracker::new()),
        );
        let scenario = ExecutionScenario::new(
            vec![Actor::new("init", Vec::new())],
            vec![
                vec![Actor::new("a", Vec::new()), Actor::new("b", Vec::new())],
                vec![Actor::new("c", Vec::new())],
            ],
            Vec::new(),
        );
        let config = TestConfiguration {
            expected_crashes: 4,
            ..Default::default()
        };

        config.apply_to_oracle(&oracle, &scenario, 10);
        let p = oracle.parameters();
        assert_eq!(p.total_possible_crashes(), 10);
        assert_eq!(p.total_actors(), 4);
        assert_eq!(p.expected_crashes(), 4);
        assert_eq!(p.single_crash_probability(), 0.1);
    }
}

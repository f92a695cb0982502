//! Synthetic invocations that exercise the fault oracle end to end.
//!
//! The scenario shape comes from a [`TestConfiguration`]: sequential
//! init actors, `threads` parallel threads of `actors_per_thread` actors,
//! then sequential post actors.  Every actor walks through its
//! crash-eligible points and at each one asks the oracle whether to flush
//! and whether to crash; a crash is recorded with the tracker and may
//! escalate to a system crash.  The actor's result is the number of
//! crashes it suffered.  This is how the crash budget is checked to hold
//! on average without a real recoverable data structure.

use crate::configuration::TestConfiguration;
use crate::execution::{ExecutionResult, ExecutionScenario, OperationResult};
use crate::outcome::{CapturedError, InvocationOutcome};
use crate::report::OutcomeSummary;
use crashcheck_fault::oracle::{FaultOracle, OracleStats};
use crashcheck_fault::tracker::{CrashTracker, RecoverableStateTracker};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::thread;

/// Shape of a simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Scenario shape, invocation counts and crash budget.
    #[serde(flatten)]
    pub test: TestConfiguration,
    /// Crash-eligible points each actor passes.
    pub crash_points_per_actor: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            test: TestConfiguration {
                iterations: 1,
                threads: 4,
                actors_per_thread: 1,
                actors_before: 0,
                actors_after: 0,
                invocations_per_iteration: 100,
                ..Default::default()
            },
            crash_points_per_actor: 50,
        }
    }
}

/// Counters of one actor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ActorTally {
    flushes: u64,
    crashes: u64,
    system_crashes: u64,
}

impl ActorTally {
    fn result(&self) -> OperationResult {
        OperationResult::Value(self.crashes.to_string())
    }
}

/// What a simulation observed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub config: SimulationConfig,
    /// Crashes per invocation, in invocation order.
    pub crashes_per_invocation: Vec<u64>,
    pub flushes: u64,
    pub system_crashes: u64,
    pub outcomes: Vec<OutcomeSummary>,
    pub stats: OracleStats,
}

impl SimulationReport {
    /// Mean crashes per invocation.
    pub fn mean_crashes(&self) -> f64 {
        if self.crashes_per_invocation.is_empty() {
            return 0.0;
        }
        self.crashes_per_invocation.iter().sum::<u64>() as f64
            / self.crashes_per_invocation.len() as f64
    }

    /// Number of invocations that did not complete normally.
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.failure).count()
    }
}

/// Run every invocation of every iteration of `config.test` against `oracle`.
///
/// `tracker` must be the tracker `oracle` was built with.  It is reset
/// before every invocation and left disabled afterwards.
pub fn simulate(
    config: &SimulationConfig,
    oracle: &FaultOracle,
    tracker: &RecoverableStateTracker,
) -> SimulationReport {
    let test = &config.test;
    info!(
        "Simulating {} x {} invocations: {} actors, {} crash points each, {} expected crashes",
        test.iterations,
        test.invocations_per_iteration,
        test.max_actors(),
        config.crash_points_per_actor,
        test.expected_crashes
    );

    let scenario = test.uniform_scenario("run_to_completion");
    let possible = i64::try_from(config.crash_points_per_actor).unwrap_or(i64::MAX);
    test.apply_to_oracle(oracle, &scenario, possible);

    let mut report = SimulationReport {
        config: config.clone(),
        crashes_per_invocation: Vec::new(),
        flushes: 0,
        system_crashes: 0,
        outcomes: Vec::new(),
        stats: OracleStats::default(),
    };

    for invocation in 0..test.total_invocations() {
        tracker.reset();
        tracker.enable_crashes();
        let run = run_invocation(&scenario, config.crash_points_per_actor, oracle, tracker);
        tracker.disable_crashes();

        let outcome = match run {
            Ok(tallies) => {
                for tally in tallies.iter() {
                    report.flushes += tally.flushes;
                    report.system_crashes += tally.system_crashes;
                }
                InvocationOutcome::completed(tallies.into_results())
            }
            Err(error) => InvocationOutcome::unexpected_exception(error),
        };

        report.crashes_per_invocation.push(tracker.crashes_count());
        report.outcomes.push(OutcomeSummary::new(invocation, &outcome));
        debug!(
            "Invocation {} finished as {} with {} crashes",
            invocation,
            outcome.kind(),
            tracker.crashes_count()
        );
    }

    report.stats = oracle.stats();
    report
}

/// Tallies of one invocation, laid out like the scenario.
struct InvocationTallies {
    init: Vec<ActorTally>,
    parallel: Vec<Vec<ActorTally>>,
    post: Vec<ActorTally>,
}

impl InvocationTallies {
    fn iter(&self) -> impl Iterator<Item = &ActorTally> {
        self.init
            .iter()
            .chain(self.parallel.iter().flatten())
            .chain(&self.post)
    }

    fn into_results(self) -> ExecutionResult {
        let results = |tallies: &[ActorTally]| -> Vec<OperationResult> {
            tallies.iter().map(ActorTally::result).collect()
        };
        ExecutionResult::new(
            results(&self.init),
            self.parallel.iter().map(|t| results(t)).collect(),
            results(&self.post),
        )
    }
}

fn run_invocation(
    scenario: &ExecutionScenario,
    crash_points: usize,
    oracle: &FaultOracle,
    tracker: &RecoverableStateTracker,
) -> Result<InvocationTallies, CapturedError> {
    let init = run_actors(scenario.init.len(), crash_points, oracle, tracker);
    let parallel = thread::scope(|scope| {
        let handles: Vec<_> = scenario
            .parallel
            .iter()
            .map(|actors| {
                let count = actors.len();
                scope.spawn(move || run_actors(count, crash_points, oracle, tracker))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().map_err(CapturedError::from_panic))
            .collect::<Result<Vec<_>, _>>()
    })?;
    let post = run_actors(scenario.post.len(), crash_points, oracle, tracker);

    Ok(InvocationTallies {
        init,
        parallel,
        post,
    })
}

fn run_actors(
    count: usize,
    crash_points: usize,
    oracle: &FaultOracle,
    tracker: &RecoverableStateTracker,
) -> Vec<ActorTally> {
    (0..count)
        .map(|_| run_actor(crash_points, oracle, tracker))
        .collect()
}

fn run_actor(
    crash_points: usize,
    oracle: &FaultOracle,
    tracker: &RecoverableStateTracker,
) -> ActorTally {
    let mut tally = ActorTally::default();
    for _ in 0..crash_points {
        if oracle.should_flush() {
            tally.flushes += 1;
        }
        if oracle.should_crash() {
            tracker.record_crash();
            tally.crashes += 1;
            if oracle.should_system_crash() {
                tally.system_crashes += 1;
            }
        }
    }
    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::OutcomeKind;
    use crashcheck_fault::config::OracleConfig;
    use std::sync::Arc;

    fn setup() -> (FaultOracle, Arc<RecoverableStateTracker>) {
        let tracker = Arc::new(RecoverableStateTracker::new());
        let oracle = FaultOracle::new(OracleConfig::default(), tracker.clone());
        (oracle, tracker)
    }

    fn parallel_only(
        invocations: usize,
        threads: usize,
        crash_points_per_actor: usize,
        expected_crashes: i64,
    ) -> SimulationConfig {
        SimulationConfig {
            test: TestConfiguration {
                iterations: 1,
                threads,
                actors_per_thread: 1,
                actors_before: 0,
                actors_after: 0,
                invocations_per_iteration: invocations,
                expected_crashes,
            },
            crash_points_per_actor,
        }
    }

    #[test]
    fn mean_crashes_near_budget() {
        let (oracle, tracker) = setup();
        let report = simulate(&parallel_only(200, 4, 50, 10), &oracle, &tracker);

        assert_eq!(report.crashes_per_invocation.len(), 200);
        assert_eq!(report.outcomes.len(), 200);
        assert_eq!(report.failures(), 0);
        let mean = report.mean_crashes();
        assert!((6.0..=11.0).contains(&mean), "mean crashes {mean}");
        assert!(!tracker.crashes_enabled());
    }

    #[test]
    fn crash_count_never_far_over_budget() {
        let (oracle, tracker) = setup();
        let report = simulate(&parallel_only(50, 2, 20, 2), &oracle, &tracker);
        // Each thread can pass the budget check once before the other's
        // crash is recorded, so the overshoot is bounded by the threads.
        for crashes in &report.crashes_per_invocation {
            assert!(*crashes <= 2 + 1 + 2, "crashes {crashes}");
        }
    }

    #[test]
    fn stats_account_for_every_point() {
        let (oracle, tracker) = setup();
        let report = simulate(&parallel_only(3, 2, 10, 1), &oracle, &tracker);
        assert_eq!(report.stats.flush.queries, 60);
        assert_eq!(report.stats.crash.queries, 60);
        assert_eq!(report.flushes, report.stats.flush.fired);
        assert_eq!(report.system_crashes, report.stats.system_crash.fired);
        assert_eq!(report.stats.system_crash.queries, report.stats.crash.fired);
    }

    #[test]
    fn completed_results_carry_per_thread_crashes() {
        let (oracle, tracker) = setup();
        let report = simulate(&parallel_only(1, 3, 5, 10), &oracle, &tracker);
        let summary = &report.outcomes[0];
        assert_eq!(summary.kind, OutcomeKind::Completed);
        assert_eq!(summary.message, "3 results");
    }

    #[test]
    fn every_invocation_gets_one_summary_in_order() {
        let (oracle, tracker) = setup();
        let mut config = parallel_only(4, 2, 5, 3);
        config.test.iterations = 3;
        let report = simulate(&config, &oracle, &tracker);

        let indices: Vec<u64> = report.outcomes.iter().map(|o| o.invocation).collect();
        assert_eq!(indices, (0..12).collect::<Vec<u64>>());
        assert!(report.outcomes.iter().all(|o| o.kind == OutcomeKind::Completed));
    }

    #[test]
    fn sequential_actors_run_and_count_toward_probability() {
        let (oracle, tracker) = setup();
        let config = SimulationConfig {
            test: TestConfiguration {
                iterations: 1,
                threads: 2,
                actors_per_thread: 2,
                actors_before: 1,
                actors_after: 3,
                invocations_per_iteration: 2,
                expected_crashes: 8,
            },
            crash_points_per_actor: 10,
        };
        let report = simulate(&config, &oracle, &tracker);

        // 1 + 2 * 2 + 3 actors, 10 points each, 2 invocations.
        assert_eq!(report.stats.flush.queries, 2 * 8 * 10);
        assert_eq!(report.outcomes[0].message, "8 results");
        let p = oracle.parameters();
        assert_eq!(p.total_actors(), 8);
        assert_eq!(p.single_crash_probability(), 0.1);
    }

    #[test]
    fn config_json_is_flat() {
        let config: SimulationConfig =
            serde_json::from_str(r#"{ "threads": 3, "crash_points_per_actor": 7 }"#).unwrap();
        assert_eq!(config.test.threads, 3);
        assert_eq!(config.crash_points_per_actor, 7);
        assert_eq!(config.test.iterations, crate::configuration::DEFAULT_ITERATIONS);
    }

    #[test]
    fn empty_report_mean_is_zero() {
        let (oracle, tracker) = setup();
        let mut config = SimulationConfig::default();
        config.test.invocations_per_iteration = 0;
        let report = simulate(&config, &oracle, &tracker);
        assert_eq!(report.mean_crashes(), 0.0);
    }
}

//! End-to-end: oracle, tracker and outcome slot working together.

use crashcheck_fault::config::OracleConfig;
use crashcheck_fault::oracle::FaultOracle;
use crashcheck_fault::tracker::{CrashTracker, RecoverableStateTracker};
use crashcheck_runner::{
    format_outcome, simulate, Actor, ExecutionResult, ExecutionScenario, InvocationOutcome,
    InvocationSlot, OperationResult, OutcomeKind, SimulationConfig, SlotError, TestConfiguration,
    ThreadDump, ThreadState,
};
use std::sync::{Arc, Barrier};
use std::thread;

fn oracle_with_seed(seed: u64) -> (FaultOracle, Arc<RecoverableStateTracker>) {
    let tracker = Arc::new(RecoverableStateTracker::new());
    let config = OracleConfig {
        seed,
        ..Default::default()
    };
    (FaultOracle::new(config, tracker.clone()), tracker)
}

fn scenario(threads: usize) -> ExecutionScenario {
    ExecutionScenario::new(
        vec![Actor::new("init", Vec::new())],
        (0..threads)
            .map(|t| vec![Actor::new("push", vec![t.to_string()])])
            .collect(),
        Vec::new(),
    )
}

#[test]
fn configured_invocation_completes_with_crashes_counted() {
    let (oracle, tracker) = oracle_with_seed(42);
    let config = TestConfiguration {
        expected_crashes: 3,
        ..Default::default()
    };
    let scenario = scenario(2);
    config.apply_to_oracle(&oracle, &scenario, 20);
    assert_eq!(oracle.parameters().total_actors(), 3);

    tracker.enable_crashes();
    let mut crashes = 0;
    for _ in 0..20 {
        if oracle.should_crash() {
            crashes = tracker.record_crash();
        }
    }
    tracker.disable_crashes();

    assert_eq!(tracker.crashes_count(), crashes);
    assert!(crashes <= 4, "crashes {crashes}");

    let slot = InvocationSlot::new(0);
    slot.record(InvocationOutcome::completed(ExecutionResult::new(
        Vec::new(),
        vec![vec![OperationResult::Void], vec![OperationResult::Void]],
        Vec::new(),
    )))
    .unwrap();
    let outcome = slot.into_outcome().unwrap();
    assert_eq!(outcome.kind(), OutcomeKind::Completed);
    assert!(format_outcome(&outcome).contains("Thread 2: [void]"));
}

#[test]
fn watchdog_and_runner_race_for_one_outcome() {
    for invocation in 0..20 {
        let slot = Arc::new(InvocationSlot::new(invocation));
        let barrier = Arc::new(Barrier::new(2));

        let watchdog = {
            let slot = slot.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                slot.record(InvocationOutcome::deadlock(ThreadDump::new(vec![
                    ThreadState::new("actor-0", "blocked", vec!["lock".into()]),
                ])))
            })
        };
        let runner = {
            let slot = slot.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                slot.record(InvocationOutcome::completed(ExecutionResult::empty()))
            })
        };

        let results = [watchdog.join().unwrap(), runner.join().unwrap()];
        let accepted = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(accepted, 1);

        let kind = slot.outcome().unwrap().kind();
        let rejected = results.iter().find_map(|r| r.as_ref().err()).unwrap();
        match rejected {
            SlotError::AlreadyClassified { existing, .. } => assert_eq!(*existing, kind),
        }
    }
}

#[test]
fn same_seed_same_simulation() {
    let config = SimulationConfig {
        test: TestConfiguration {
            iterations: 2,
            threads: 1,
            actors_per_thread: 1,
            actors_before: 1,
            actors_after: 1,
            invocations_per_iteration: 10,
            expected_crashes: 5,
        },
        crash_points_per_actor: 30,
    };

    let (oracle_a, tracker_a) = oracle_with_seed(7);
    let (oracle_b, tracker_b) = oracle_with_seed(7);
    let a = simulate(&config, &oracle_a, &tracker_a);
    let b = simulate(&config, &oracle_b, &tracker_b);

    assert_eq!(a.crashes_per_invocation, b.crashes_per_invocation);
    assert_eq!(a.flushes, b.flushes);
    assert_eq!(a.stats, b.stats);
    assert_eq!(a.crashes_per_invocation.len(), 20);
}

#[test]
fn disabled_tracker_means_no_crashes() {
    let (oracle, tracker) = oracle_with_seed(1);
    oracle.configure(1, 1, 10);
    assert!(!tracker.crashes_enabled());
    for _ in 0..1000 {
        assert!(!oracle.should_crash());
    }
    assert_eq!(oracle.stats().crash.draws, 0);
}

//! Format invocation outcomes for humans and for tooling.

use crate::outcome::{InvocationOutcome, OutcomeKind};
use crate::simulation::SimulationReport;
use crashcheck_fault::decision::DecisionKind;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while saving reports.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Format an outcome the way a failing test prints it.
pub fn format_outcome(outcome: &InvocationOutcome) -> String {
    let mut output = String::new();

    match outcome {
        InvocationOutcome::Completed(completed) => {
            output.push_str("= Invocation completed =\n");
            output.push_str(&completed.results().to_string());
        }
        InvocationOutcome::UnexpectedException(failure) => {
            output.push_str("= The execution failed with an unexpected exception =\n");
            output.push_str(&format!("{}\n", failure.error()));
            if let Some(backtrace) = failure.error().backtrace() {
                output.push_str(backtrace);
                output.push('\n');
            }
        }
        InvocationOutcome::ValidationFailure(failure) => {
            output.push_str(&format!(
                "= Validation function {} has failed =\n",
                failure.function_name()
            ));
            output.push_str(&failure.scenario().to_string());
            output.push('\n');
            output.push_str(&format!("{}\n", failure.error()));
        }
        InvocationOutcome::ObstructionFreedomViolation(violation) => {
            output.push_str("= Obstruction-freedom is required but a blocking has been found =\n");
            output.push_str(violation.reason());
            output.push('\n');
        }
        InvocationOutcome::Deadlock(deadlock) => {
            output.push_str("= The execution has hung, see the thread dump =\n");
            output.push_str(&deadlock.thread_dump().to_string());
        }
    }

    output
}

/// Format a simulation report for human consumption.
pub fn format_simulation(report: &SimulationReport, seed: u64) -> String {
    let mut output = String::new();

    output.push_str("═══════════════════════════════════════════════════════════════════════\n");
    output.push_str("  crashcheck Simulation Report\n");
    output.push_str("═══════════════════════════════════════════════════════════════════════\n\n");

    output.push_str(&format!("Seed:                   {}\n", seed));
    let test = &report.config.test;
    output.push_str(&format!(
        "Invocations:            {} ({} iterations x {})\n",
        test.total_invocations(),
        test.iterations,
        test.invocations_per_iteration
    ));
    output.push_str(&format!(
        "Actors:                 {} ({} init, {} x {} parallel, {} post)\n",
        test.max_actors(),
        test.actors_before,
        test.threads,
        test.actors_per_thread,
        test.actors_after
    ));
    output.push_str(&format!(
        "Crash points/actor:     {}\n",
        report.config.crash_points_per_actor
    ));
    output.push_str(&format!("Expected crashes:       {}\n", test.expected_crashes));
    output.push_str(&format!("Mean crashes:           {:.2}\n", report.mean_crashes()));
    output.push_str(&format!("Flushes:                {}\n", report.flushes));
    output.push_str(&format!("System crashes:         {}\n", report.system_crashes));
    output.push_str(&format!("Failed invocations:     {}\n", report.failures()));
    output.push('\n');

    output.push_str("─── Oracle Decisions ──────────────────────────────────────────────────\n");
    for kind in DecisionKind::ALL {
        let stats = report.stats.get(kind);
        output.push_str(&format!(
            "{:<14} queries {:>9}  draws {:>9}  fired {:>8}  ({:.4})\n",
            kind.to_string(),
            stats.queries,
            stats.draws,
            stats.fired,
            stats.fire_rate()
        ));
    }
    output.push_str(&format!("Total draws:            {}\n", report.stats.total_draws));

    output.push_str("═══════════════════════════════════════════════════════════════════════\n");

    output
}

/// Machine-readable summary of one outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeSummary {
    /// Invocation index within its iteration.
    pub invocation: u64,
    pub kind: OutcomeKind,
    pub failure: bool,
    /// One-line description.
    pub message: String,
}

impl OutcomeSummary {
    pub fn new(invocation: u64, outcome: &InvocationOutcome) -> Self {
        let message = match outcome {
            InvocationOutcome::Completed(completed) => {
                format!("{} results", completed.results().len())
            }
            InvocationOutcome::UnexpectedException(failure) => failure.error().to_string(),
            InvocationOutcome::ValidationFailure(failure) => {
                format!("{}: {}", failure.function_name(), failure.error())
            }
            InvocationOutcome::ObstructionFreedomViolation(violation) => {
                violation.reason().to_string()
            }
            InvocationOutcome::Deadlock(deadlock) => {
                format!("{} threads hung", deadlock.thread_dump().len())
            }
        };

        Self {
            invocation,
            kind: outcome.kind(),
            failure: outcome.is_failure(),
            message,
        }
    }
}

/// Save outcome summaries as JSON.
pub fn save_summaries_json(summaries: &[OutcomeSummary], path: &Path) -> Result<(), ReportError> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, summaries)?;
    Ok(())
}

/// Load outcome summaries saved by [`save_summaries_json`].
pub fn load_summaries_json(path: &Path) -> Result<Vec<OutcomeSummary>, ReportError> {
    let file = File::open(path)?;
    let summaries = serde_json::from_reader(file)?;
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{Actor, ExecutionResult, ExecutionScenario, OperationResult};
    use crate::outcome::CapturedError;
    use crate::thread_dump::{ThreadDump, ThreadState};
    use std::sync::Arc;

    #[test]
    fn test_format_completed() {
        let outcome = InvocationOutcome::completed(ExecutionResult::new(
            Vec::new(),
            vec![vec![OperationResult::Value("5".into())]],
            Vec::new(),
        ));
        let formatted = format_outcome(&outcome);
        assert!(formatted.starts_with("= Invocation completed =\n"));
        assert!(formatted.contains("Thread 1: [5]"));
    }

    #[test]
    fn test_format_unexpected_exception_keeps_message() {
        let outcome = InvocationOutcome::unexpected_exception(
            CapturedError::new("panic", "index out of bounds: the len is 0")
                .with_backtrace("0: stack::pop"),
        );
        let formatted = format_outcome(&outcome);
        assert!(formatted.contains("unexpected exception"));
        assert!(formatted.contains("panic: index out of bounds: the len is 0"));
        assert!(formatted.contains("0: stack::pop"));
    }

    #[test]
    fn test_format_validation_failure() {
        let scenario = Arc::new(ExecutionScenario::new(
            Vec::new(),
            vec![vec![Actor::new("offer", vec!["1".into()])]],
            Vec::new(),
        ));
        let outcome = InvocationOutcome::validation_failure(
            scenario,
            "check_invariants",
            CapturedError::new("panic", "head is dangling"),
        );
        let formatted = format_outcome(&outcome);
        assert!(formatted.contains("= Validation function check_invariants has failed ="));
        assert!(formatted.contains("| offer(1) |"));
        assert!(formatted.contains("head is dangling"));
    }

    #[test]
    fn test_format_obstruction_freedom() {
        let outcome = InvocationOutcome::obstruction_freedom_violation("lock acquired in push()");
        let formatted = format_outcome(&outcome);
        assert!(formatted.contains("Obstruction-freedom is required"));
        assert!(formatted.contains("lock acquired in push()"));
    }

    #[test]
    fn test_format_deadlock() {
        let outcome = InvocationOutcome::deadlock(ThreadDump::new(vec![ThreadState::new(
            "actor-1",
            "blocked",
            vec!["mutex::lock".into()],
        )]));
        let formatted = format_outcome(&outcome);
        assert!(formatted.contains("has hung"));
        assert!(formatted.contains("Thread \"actor-1\" (blocked):"));
        assert!(formatted.contains("    mutex::lock"));
    }

    #[test]
    fn test_summary_messages() {
        let s = OutcomeSummary::new(0, &InvocationOutcome::completed(ExecutionResult::empty()));
        assert_eq!(s.kind, OutcomeKind::Completed);
        assert!(!s.failure);
        assert_eq!(s.message, "0 results");

        let s = OutcomeSummary::new(
            4,
            &InvocationOutcome::deadlock(ThreadDump::new(vec![
                ThreadState::new("a", "parked", Vec::new()),
                ThreadState::new("b", "parked", Vec::new()),
            ])),
        );
        assert_eq!(s.invocation, 4);
        assert!(s.failure);
        assert_eq!(s.message, "2 threads hung");
    }

    #[test]
    fn test_format_simulation() {
        use crate::configuration::TestConfiguration;
        use crate::simulation::SimulationConfig;
        use crashcheck_fault::oracle::OracleStats;

        let report = SimulationReport {
            config: SimulationConfig {
                test: TestConfiguration {
                    iterations: 1,
                    threads: 3,
                    actors_per_thread: 1,
                    actors_before: 0,
                    actors_after: 0,
                    invocations_per_iteration: 2,
                    expected_crashes: 4,
                },
                crash_points_per_actor: 10,
            },
            crashes_per_invocation: vec![3, 5],
            flushes: 12,
            system_crashes: 2,
            outcomes: Vec::new(),
            stats: OracleStats::default(),
        };
        let formatted = format_simulation(&report, 42);
        assert!(formatted.contains("Seed:                   42"));
        assert!(formatted.contains("Invocations:            2 (1 iterations x 2)"));
        assert!(formatted.contains("Actors:                 3 (0 init, 3 x 1 parallel, 0 post)"));
        assert!(formatted.contains("Mean crashes:           4.00"));
        assert!(formatted.contains("Flushes:                12"));
        assert!(formatted.contains("system-crash"));
        assert!(formatted.contains("Failed invocations:     0"));
    }

    #[test]
    fn test_summaries_json_file() {
        let path = std::env::temp_dir().join(format!(
            "crashcheck-summaries-{}.json",
            std::process::id()
        ));
        let summaries = vec![
            OutcomeSummary::new(0, &InvocationOutcome::completed(ExecutionResult::empty())),
            OutcomeSummary::new(
                1,
                &InvocationOutcome::obstruction_freedom_violation("spin"),
            ),
        ];
        save_summaries_json(&summaries, &path).unwrap();
        let loaded = load_summaries_json(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, summaries);
    }
}

//! Runner-side half of crashcheck: how invocations end, and the glue
//! that feeds the fault oracle.
//!
//! # Module Structure
//!
//! - [`execution`] — Scenarios (init / parallel / post actors) and their results
//! - [`outcome`] — The closed set of invocation outcomes
//! - [`thread_dump`] — Thread snapshots attached to deadlocks
//! - [`slot`] — Once-only outcome cell shared by everyone who can end an invocation
//! - [`configuration`] — Test configuration and oracle setup per scenario
//! - [`report`] — Human-readable and JSON outcome reports
//! - [`simulation`] — Synthetic invocations driving the oracle end to end
//!
//! # Flow
//!
//! ```text
//! TestConfiguration ──apply_to_oracle──→ FaultOracle ←──queries── actors
//!                                                                   │
//!                     InvocationSlot ←──record(outcome)─── runner ←─┘
//!                           │
//!                           └──→ format_outcome / OutcomeSummary
//! ```

pub mod configuration;
pub mod execution;
pub mod outcome;
pub mod report;
pub mod simulation;
pub mod slot;
pub mod thread_dump;

pub use configuration::{ConfigurationError, TestConfiguration};
pub use execution::{Actor, ExecutionResult, ExecutionScenario, OperationResult};
pub use outcome::{CapturedError, InvocationOutcome, OutcomeKind};
pub use report::{format_outcome, format_simulation, OutcomeSummary, ReportError};
pub use simulation::{simulate, SimulationConfig, SimulationReport};
pub use slot::{InvocationSlot, SlotError};
pub use thread_dump::{ThreadDump, ThreadDumpProvider, ThreadState};

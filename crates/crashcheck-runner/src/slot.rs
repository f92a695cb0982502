//! Once-only outcome cell for a single invocation.
//!
//! Several parties can notice that an invocation ended: the thread that
//! saw the last actor finish, the watchdog that gave up waiting, the
//! obstruction-freedom checker.  Whoever records first decides the
//! outcome; later attempts are rejected and the stored outcome stays.

use crate::outcome::{InvocationOutcome, OutcomeKind};
use log::{info, warn};
use std::sync::OnceLock;
use thiserror::Error;

/// Errors from an [`InvocationSlot`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    #[error("Invocation {invocation} already classified as {existing}, rejected {rejected}")]
    AlreadyClassified {
        invocation: u64,
        existing: OutcomeKind,
        rejected: OutcomeKind,
    },
}

/// Holds the outcome of one invocation, decided at most once.
///
/// # Example
///
/// ```
/// use crashcheck_runner::execution::ExecutionResult;
/// use crashcheck_runner::outcome::{InvocationOutcome, OutcomeKind};
/// use crashcheck_runner::slot::InvocationSlot;
///
/// let slot = InvocationSlot::new(0);
/// slot.record(InvocationOutcome::completed(ExecutionResult::empty())).unwrap();
///
/// let late = slot.record(InvocationOutcome::obstruction_freedom_violation("timeout"));
/// assert!(late.is_err());
/// assert_eq!(slot.outcome().unwrap().kind(), OutcomeKind::Completed);
/// ```
#[derive(Debug)]
pub struct InvocationSlot {
    invocation: u64,
    outcome: OnceLock<InvocationOutcome>,
}

impl InvocationSlot {
    pub fn new(invocation: u64) -> Self {
        Self {
            invocation,
            outcome: OnceLock::new(),
        }
    }

    /// Index of the invocation this slot belongs to.
    pub fn invocation(&self) -> u64 {
        self.invocation
    }

    /// Record the outcome.  Fails if one was already recorded.
    pub fn record(&self, outcome: InvocationOutcome) -> Result<(), SlotError> {
        let kind = outcome.kind();
        match self.outcome.set(outcome) {
            Ok(()) => {
                info!("Invocation {} classified as {}", self.invocation, kind);
                Ok(())
            }
            Err(rejected) => {
                let existing = self
                    .outcome
                    .get()
                    .map_or(rejected.kind(), InvocationOutcome::kind);
                warn!(
                    "Invocation {} already classified as {}, ignoring {}",
                    self.invocation, existing, kind
                );
                Err(SlotError::AlreadyClassified {
                    invocation: self.invocation,
                    existing,
                    rejected: kind,
                })
            }
        }
    }

    pub fn outcome(&self) -> Option<&InvocationOutcome> {
        self.outcome.get()
    }

    pub fn is_classified(&self) -> bool {
        self.outcome.get().is_some()
    }

    /// Consume the slot, handing the outcome on to reporting.
    pub fn into_outcome(self) -> Option<InvocationOutcome> {
        self.outcome.into_inner()
    }
}

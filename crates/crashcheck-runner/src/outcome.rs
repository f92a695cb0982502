//! How an invocation ended.
//!
//! Every controlled execution ends in exactly one [`InvocationOutcome`].
//! The set is closed: reporting and verification `match` on it without a
//! fallback arm, so a new kind of ending has to be handled everywhere.
//!
//! | Variant                        | Evidence                                   |
//! |--------------------------------|--------------------------------------------|
//! | `Completed`                    | per-thread operation results               |
//! | `UnexpectedException`          | the captured error                         |
//! | `ValidationFailure`            | scenario, validation function, error       |
//! | `ObstructionFreedomViolation`  | why the invocation was considered blocked  |
//! | `Deadlock`                     | thread dump taken when progress stopped    |
//!
//! Payloads are only reachable through `&` accessors; an outcome cannot
//! be changed once built.

use crate::execution::{ExecutionResult, ExecutionScenario};
use crate::thread_dump::{ThreadDump, ThreadDumpProvider};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// An error raised by the code under test, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedError {
    type_name: String,
    message: String,
    /// `source()` chain, outermost first.
    causes: Vec<String>,
    backtrace: Option<String>,
}

impl CapturedError {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            causes: Vec::new(),
            backtrace: None,
        }
    }

    /// Capture a Rust error together with its `source()` chain.
    pub fn from_error<E>(error: &E) -> Self
    where
        E: std::error::Error + 'static,
    {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Self {
            type_name: std::any::type_name::<E>().to_string(),
            message: error.to_string(),
            causes,
            backtrace: None,
        }
    }

    /// Capture the payload of a caught panic.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(message) => (*message).to_string(),
                Err(_) => "Box<dyn Any>".to_string(),
            },
        };
        Self::new("panic", message)
    }

    pub fn with_backtrace(mut self, backtrace: impl Into<String>) -> Self {
        self.backtrace = Some(backtrace.into());
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn causes(&self) -> &[String] {
        &self.causes
    }

    pub fn backtrace(&self) -> Option<&str> {
        self.backtrace.as_deref()
    }
}

impl fmt::Display for CapturedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)?;
        for cause in &self.causes {
            write!(f, "\nCaused by: {cause}")?;
        }
        Ok(())
    }
}

/// Payload-free tag of an [`InvocationOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Completed,
    UnexpectedException,
    ValidationFailure,
    ObstructionFreedomViolation,
    Deadlock,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeKind::Completed => write!(f, "completed"),
            OutcomeKind::UnexpectedException => write!(f, "unexpected-exception"),
            OutcomeKind::ValidationFailure => write!(f, "validation-failure"),
            OutcomeKind::ObstructionFreedomViolation => write!(f, "obstruction-freedom-violation"),
            OutcomeKind::Deadlock => write!(f, "deadlock"),
        }
    }
}

/// The invocation ran to completion under the schedule.
#[derive(Debug, Clone)]
pub struct CompletedOutcome {
    results: ExecutionResult,
}

impl CompletedOutcome {
    pub fn results(&self) -> &ExecutionResult {
        &self.results
    }
}

/// The code under test raised an error outside its declared contract.
#[derive(Debug, Clone)]
pub struct UnexpectedExceptionOutcome {
    error: CapturedError,
}

impl UnexpectedExceptionOutcome {
    pub fn error(&self) -> &CapturedError {
        &self.error
    }
}

/// A validation function failed after an otherwise normal run.
#[derive(Debug, Clone)]
pub struct ValidationFailureOutcome {
    scenario: Arc<ExecutionScenario>,
    function_name: String,
    error: CapturedError,
}

impl ValidationFailureOutcome {
    /// The scenario that was running, shared with the runner.
    pub fn scenario(&self) -> &Arc<ExecutionScenario> {
        &self.scenario
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn error(&self) -> &CapturedError {
        &self.error
    }
}

/// Obstruction freedom was required but the invocation hung.
#[derive(Debug, Clone)]
pub struct ObstructionFreedomViolationOutcome {
    reason: String,
}

impl ObstructionFreedomViolationOutcome {
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// The invocation stopped making progress.
#[derive(Debug, Clone)]
pub struct DeadlockOutcome {
    thread_dump: Arc<ThreadDump>,
}

impl DeadlockOutcome {
    pub fn thread_dump(&self) -> &Arc<ThreadDump> {
        &self.thread_dump
    }
}

/// The terminal state of one invocation.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use crashcheck_runner::execution::ExecutionScenario;
/// use crashcheck_runner::outcome::{CapturedError, InvocationOutcome, OutcomeKind};
///
/// let scenario = Arc::new(ExecutionScenario::default());
/// let outcome = InvocationOutcome::validation_failure(
///     scenario.clone(),
///     "check_size",
///     CapturedError::new("panic", "size went negative"),
/// );
///
/// assert_eq!(outcome.kind(), OutcomeKind::ValidationFailure);
/// match &outcome {
///     InvocationOutcome::ValidationFailure(failure) => {
///         assert!(Arc::ptr_eq(failure.scenario(), &scenario));
///         assert_eq!(failure.function_name(), "check_size");
///     }
///     InvocationOutcome::Completed(_)
///     | InvocationOutcome::UnexpectedException(_)
///     | InvocationOutcome::ObstructionFreedomViolation(_)
///     | InvocationOutcome::Deadlock(_) => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone)]
pub enum InvocationOutcome {
    Completed(CompletedOutcome),
    UnexpectedException(UnexpectedExceptionOutcome),
    ValidationFailure(ValidationFailureOutcome),
    ObstructionFreedomViolation(ObstructionFreedomViolationOutcome),
    Deadlock(DeadlockOutcome),
}

impl InvocationOutcome {
    pub fn completed(results: ExecutionResult) -> Self {
        Self::Completed(CompletedOutcome { results })
    }

    pub fn unexpected_exception(error: CapturedError) -> Self {
        Self::UnexpectedException(UnexpectedExceptionOutcome { error })
    }

    pub fn validation_failure(
        scenario: Arc<ExecutionScenario>,
        function_name: impl Into<String>,
        error: CapturedError,
    ) -> Self {
        Self::ValidationFailure(ValidationFailureOutcome {
            scenario,
            function_name: function_name.into(),
            error,
        })
    }

    pub fn obstruction_freedom_violation(reason: impl Into<String>) -> Self {
        Self::ObstructionFreedomViolation(ObstructionFreedomViolationOutcome {
            reason: reason.into(),
        })
    }

    pub fn deadlock(thread_dump: ThreadDump) -> Self {
        Self::Deadlock(DeadlockOutcome {
            thread_dump: Arc::new(thread_dump),
        })
    }

    /// Capture a thread dump from `provider` (exactly once) and build a
    /// deadlock outcome from it.
    pub fn deadlock_captured(provider: &dyn ThreadDumpProvider) -> Self {
        Self::deadlock(provider.capture())
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Completed(_) => OutcomeKind::Completed,
            Self::UnexpectedException(_) => OutcomeKind::UnexpectedException,
            Self::ValidationFailure(_) => OutcomeKind::ValidationFailure,
            Self::ObstructionFreedomViolation(_) => OutcomeKind::ObstructionFreedomViolation,
            Self::Deadlock(_) => OutcomeKind::Deadlock,
        }
    }

    /// Everything except a normal completion.
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Completed(_))
    }

    /// The results, if the invocation completed.
    pub fn results(&self) -> Option<&ExecutionResult> {
        match self {
            Self::Completed(completed) => Some(completed.results()),
            _ => None,
        }
    }

    /// The captured error, for the two variants that carry one.
    pub fn error(&self) -> Option<&CapturedError> {
        match self {
            Self::UnexpectedException(e) => Some(e.error()),
            Self::ValidationFailure(v) => Some(v.error()),
            Self::Completed(_) | Self::ObstructionFreedomViolation(_) | Self::Deadlock(_) => None,
        }
    }
}

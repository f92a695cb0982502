//! Decision kinds the oracle answers.
//!
//! Flush and system-crash decisions use fixed probabilities.  The
//! per-actor crash probability is derived from the run's crash
//! parameters, see [`CrashParameters`](crate::oracle::CrashParameters).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Probability that a candidate flush point performs a flush.
pub const FLUSH_PROBABILITY: f32 = 0.2;

/// Probability that a crash, once triggered, also takes down system state.
pub const SYSTEM_CRASH_PROBABILITY: f32 = 0.3;

/// A question the instrumentation layer can ask the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    /// Simulate a cache-to-persistent-memory write-back now.
    Flush,
    /// Crash the current actor now.
    Crash,
    /// Extend a triggered crash to the whole system.
    SystemCrash,
}

impl DecisionKind {
    /// Every decision kind, in counter order.
    pub const ALL: [DecisionKind; 3] = [
        DecisionKind::Flush,
        DecisionKind::Crash,
        DecisionKind::SystemCrash,
    ];

    /// The fixed probability of this decision, if it does not depend on
    /// the crash parameters.
    pub fn fixed_probability(self) -> Option<f32> {
        match self {
            DecisionKind::Flush => Some(FLUSH_PROBABILITY),
            DecisionKind::Crash => None,
            DecisionKind::SystemCrash => Some(SYSTEM_CRASH_PROBABILITY),
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            DecisionKind::Flush => 0,
            DecisionKind::Crash => 1,
            DecisionKind::SystemCrash => 2,
        }
    }
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionKind::Flush => write!(f, "flush"),
            DecisionKind::Crash => write!(f, "crash"),
            DecisionKind::SystemCrash => write!(f, "system-crash"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_probabilities() {
        assert_eq!(DecisionKind::Flush.fixed_probability(), Some(0.2));
        assert_eq!(DecisionKind::SystemCrash.fixed_probability(), Some(0.3));
        assert_eq!(DecisionKind::Crash.fixed_probability(), None);
    }

    #[test]
    fn indices_follow_all_order() {
        for (i, kind) in DecisionKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn decision_display() {
        assert_eq!(DecisionKind::Flush.to_string(), "flush");
        assert_eq!(DecisionKind::Crash.to_string(), "crash");
        assert_eq!(DecisionKind::SystemCrash.to_string(), "system-crash");
    }

    #[test]
    fn decision_serializes_snake_case() {
        let json = serde_json::to_string(&DecisionKind::SystemCrash).unwrap();
        assert_eq!(json, "\"system_crash\"");
    }
}

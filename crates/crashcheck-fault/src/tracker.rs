//! Crash-budget tracking seam.
//!
//! The oracle only *reads* the tracker: whether crash injection is
//! currently enabled, and how many crashes the current run has already
//! seen.  Who flips the switch and who counts crashes is up to the
//! recoverable-state machinery driving the run.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Read-only view of the crash budget consulted by
/// [`FaultOracle::should_crash`](crate::oracle::FaultOracle::should_crash).
pub trait CrashTracker: Send + Sync {
    /// Whether crash injection is currently enabled.
    fn crashes_enabled(&self) -> bool;

    /// Number of crashes recorded in the current run.
    fn crashes_count(&self) -> u64;
}

/// Atomic crash tracker shared between the runner and the oracle.
///
/// Injection starts disabled.  The runner enables it around the parts of
/// an invocation where crashes are meaningful and records every crash it
/// actually performs.
///
/// # Example
///
/// ```
/// use crashcheck_fault::tracker::{CrashTracker, RecoverableStateTracker};
///
/// let tracker = RecoverableStateTracker::new();
/// assert!(!tracker.crashes_enabled());
///
/// tracker.enable_crashes();
/// tracker.record_crash();
/// assert_eq!(tracker.crashes_count(), 1);
///
/// tracker.reset();
/// assert_eq!(tracker.crashes_count(), 0);
/// assert!(!tracker.crashes_enabled());
/// ```
#[derive(Debug, Default)]
pub struct RecoverableStateTracker {
    enabled: AtomicBool,
    count: AtomicU64,
}

impl RecoverableStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide tracker used by [`FaultOracle::global`](crate::oracle::FaultOracle::global).
    pub fn global() -> Arc<RecoverableStateTracker> {
        static GLOBAL: OnceLock<Arc<RecoverableStateTracker>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(RecoverableStateTracker::new())))
    }

    pub fn enable_crashes(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    pub fn disable_crashes(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    /// Record a performed crash.  Returns the new count.
    pub fn record_crash(&self) -> u64 {
        self.count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Disable injection and zero the count, ready for the next run.
    pub fn reset(&self) {
        self.enabled.store(false, Ordering::Release);
        self.count.store(0, Ordering::Release);
    }
}

impl CrashTracker for RecoverableStateTracker {
    fn crashes_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn crashes_count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn starts_disabled_and_empty() {
        let tracker = RecoverableStateTracker::new();
        assert!(!tracker.crashes_enabled());
        assert_eq!(tracker.crashes_count(), 0);
    }

    #[test]
    fn enable_disable_toggles() {
        let tracker = RecoverableStateTracker::new();
        tracker.enable_crashes();
        assert!(tracker.crashes_enabled());
        tracker.disable_crashes();
        assert!(!tracker.crashes_enabled());
    }

    #[test]
    fn record_crash_returns_running_count() {
        let tracker = RecoverableStateTracker::new();
        assert_eq!(tracker.record_crash(), 1);
        assert_eq!(tracker.record_crash(), 2);
        assert_eq!(tracker.crashes_count(), 2);
    }

    #[test]
    fn concurrent_records_are_not_lost() {
        let tracker = Arc::new(RecoverableStateTracker::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        tracker.record_crash();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(tracker.crashes_count(), 8000);
    }

    #[test]
    fn global_is_shared() {
        let a = RecoverableStateTracker::global();
        let b = RecoverableStateTracker::global();
        assert!(Arc::ptr_eq(&a, &b));
    }
}

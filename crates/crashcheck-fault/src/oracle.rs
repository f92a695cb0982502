//! Fault oracle — decides when to flush, crash an actor, or crash the
//! whole system.
//!
//! # Crash probability
//!
//! The runner tells the oracle how many crash-eligible points the
//! scenario has and how many actors run it.  The oracle then aims for
//! `expected_crashes` crashes per run in expectation:
//!
//! ```text
//! single_crash_probability = expected_crashes / max(1, possible_crashes * actors)
//! ```
//!
//! Zero or negative products are floored to 1 rather than rejected, so a
//! misconfigured run degrades to "crash with probability
//! `expected_crashes`" (that is, almost always) instead of failing.
//!
//! # Decisions
//!
//! | Query                   | Fires when                                          |
//! |-------------------------|-----------------------------------------------------|
//! | `should_flush`          | draw < 0.2                                          |
//! | `should_crash`          | enabled && count <= expected && draw < probability  |
//! | `should_system_crash`   | draw < 0.3                                          |
//!
//! `should_crash` checks its conditions left to right and only draws when
//! the first two hold.  Changing that order changes which draw every
//! later query sees, and with it every reproduced run.

use crate::config::OracleConfig;
use crate::decision::{DecisionKind, FLUSH_PROBABILITY, SYSTEM_CRASH_PROBABILITY};
use crate::draw::{DrawRecord, DrawSnapshot, DrawSource};
use crate::tracker::{CrashTracker, RecoverableStateTracker};
use log::{debug, trace, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// The inputs of the crash probability and the probability itself.
///
/// Immutable: every change builds a new record, so the derived
/// probability can never disagree with the inputs it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrashParameters {
    total_possible_crashes: i64,
    total_actors: i64,
    expected_crashes: i64,
    single_crash_probability: f32,
}

impl CrashParameters {
    pub fn new(total_possible_crashes: i64, total_actors: i64, expected_crashes: i64) -> Self {
        let denominator = total_possible_crashes.saturating_mul(total_actors).max(1);
        Self {
            total_possible_crashes,
            total_actors,
            expected_crashes,
            single_crash_probability: expected_crashes as f32 / denominator as f32,
        }
    }

    pub fn total_possible_crashes(&self) -> i64 {
        self.total_possible_crashes
    }

    pub fn total_actors(&self) -> i64 {
        self.total_actors
    }

    pub fn expected_crashes(&self) -> i64 {
        self.expected_crashes
    }

    /// Probability that one crash-eligible point crashes its actor.
    pub fn single_crash_probability(&self) -> f32 {
        self.single_crash_probability
    }

    /// Whether the denominator was floored to 1.
    pub fn is_floored(&self) -> bool {
        self.total_possible_crashes.saturating_mul(self.total_actors) < 1
    }

    /// Whether `crashes_so_far` still fits the budget.
    pub fn within_budget(&self, crashes_so_far: u64) -> bool {
        i64::try_from(crashes_so_far).is_ok_and(|count| count <= self.expected_crashes)
    }
}

impl Default for CrashParameters {
    fn default() -> Self {
        Self::new(0, 0, crate::config::DEFAULT_EXPECTED_CRASHES)
    }
}

/// Per-decision counters.
#[derive(Debug, Default)]
struct DecisionCounters {
    queries: AtomicU64,
    draws: AtomicU64,
    fired: AtomicU64,
}

impl DecisionCounters {
    fn snapshot(&self) -> DecisionStats {
        DecisionStats {
            queries: self.queries.load(Ordering::Relaxed),
            draws: self.draws.load(Ordering::Relaxed),
            fired: self.fired.load(Ordering::Relaxed),
        }
    }

    fn clear(&self) {
        self.set(&DecisionStats::default());
    }

    fn set(&self, stats: &DecisionStats) {
        self.queries.store(stats.queries, Ordering::Relaxed);
        self.draws.store(stats.draws, Ordering::Relaxed);
        self.fired.store(stats.fired, Ordering::Relaxed);
    }
}

/// Counters for one decision kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionStats {
    /// Number of times the query was asked.
    pub queries: u64,
    /// Number of draws consumed (lower than `queries` for skipped crash checks).
    pub draws: u64,
    /// Number of positive answers.
    pub fired: u64,
}

impl DecisionStats {
    /// Fraction of queries answered positively.
    pub fn fire_rate(&self) -> f64 {
        if self.queries == 0 {
            0.0
        } else {
            self.fired as f64 / self.queries as f64
        }
    }
}

/// Statistics of an oracle since creation or the last reset.
///
/// [`FaultOracle::restore`] puts the counters back to their values at
/// the snapshot, so they always describe the current draw position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OracleStats {
    pub flush: DecisionStats,
    pub crash: DecisionStats,
    pub system_crash: DecisionStats,
    /// Total draws consumed from the shared source.
    pub total_draws: u64,
}

impl OracleStats {
    pub fn get(&self, kind: DecisionKind) -> &DecisionStats {
        match kind {
            DecisionKind::Flush => &self.flush,
            DecisionKind::Crash => &self.crash,
            DecisionKind::SystemCrash => &self.system_crash,
        }
    }
}

/// Snapshot of a [`FaultOracle`].
#[derive(Debug, Clone)]
pub struct OracleSnapshot {
    draw: DrawSnapshot,
    parameters: CrashParameters,
    counters: [DecisionStats; 3],
}

/// Seeded decision oracle shared by all actors of an invocation.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use crashcheck_fault::config::OracleConfig;
/// use crashcheck_fault::oracle::FaultOracle;
/// use crashcheck_fault::tracker::RecoverableStateTracker;
///
/// let tracker = Arc::new(RecoverableStateTracker::new());
/// let oracle = FaultOracle::new(OracleConfig::default(), tracker.clone());
///
/// // 20 crash points, 4 actors, 10 expected crashes per run
/// oracle.configure(20, 4, 10);
/// assert_eq!(oracle.single_crash_probability(), 10.0 / 80.0);
///
/// // Injection is disabled until the tracker enables it
/// assert!(!oracle.should_crash());
/// assert_eq!(oracle.draws(), 0);
///
/// tracker.enable_crashes();
/// let _ = oracle.should_crash();
/// assert_eq!(oracle.draws(), 1);
/// ```
pub struct FaultOracle {
    parameters: RwLock<CrashParameters>,
    source: Mutex<DrawSource>,
    tracker: Arc<dyn CrashTracker>,
    counters: [DecisionCounters; 3],
}

impl FaultOracle {
    /// Create an oracle with the given configuration and crash tracker.
    pub fn new(config: OracleConfig, tracker: Arc<dyn CrashTracker>) -> Self {
        let source = if config.record_draws {
            DrawSource::with_log(config.seed)
        } else {
            DrawSource::new(config.seed)
        };

        Self {
            parameters: RwLock::new(CrashParameters::new(0, 0, config.expected_crashes)),
            source: Mutex::new(source),
            tracker,
            counters: Default::default(),
        }
    }

    /// The process-wide oracle.
    ///
    /// Built on first use from [`OracleConfig::from_env`] and the global
    /// [`RecoverableStateTracker`].  A malformed environment falls back to
    /// the defaults.
    pub fn global() -> &'static FaultOracle {
        static GLOBAL: OnceLock<FaultOracle> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let config = OracleConfig::from_env().unwrap_or_else(|e| {
                warn!("Ignoring oracle environment: {}", e);
                OracleConfig::default()
            });
            FaultOracle::new(config, RecoverableStateTracker::global())
        })
    }

    // ── Configuration ───────────────────────────────────────────

    /// Set all three crash inputs at once.
    pub fn configure(&self, total_possible_crashes: i64, total_actors: i64, expected_crashes: i64) {
        self.update(|_| CrashParameters::new(total_possible_crashes, total_actors, expected_crashes));
    }

    pub fn set_total_possible_crashes(&self, value: i64) {
        self.update(|p| CrashParameters::new(value, p.total_actors, p.expected_crashes));
    }

    pub fn set_total_actors(&self, value: i64) {
        self.update(|p| CrashParameters::new(p.total_possible_crashes, value, p.expected_crashes));
    }

    pub fn set_expected_crashes(&self, value: i64) {
        self.update(|p| CrashParameters::new(p.total_possible_crashes, p.total_actors, value));
    }

    /// The current crash parameters, read as one consistent record.
    pub fn parameters(&self) -> CrashParameters {
        *self.parameters.read()
    }

    pub fn single_crash_probability(&self) -> f32 {
        self.parameters.read().single_crash_probability
    }

    pub fn expected_crashes(&self) -> i64 {
        self.parameters.read().expected_crashes
    }

    /// The seed of the shared draw source.
    pub fn seed(&self) -> u64 {
        self.source.lock().seed()
    }

    // ── Decisions ───────────────────────────────────────────────

    /// Whether to simulate a flush at this point.  One draw.
    pub fn should_flush(&self) -> bool {
        self.count_query(DecisionKind::Flush);
        self.draw(DecisionKind::Flush, FLUSH_PROBABILITY)
    }

    /// Whether to crash the current actor at this point.
    ///
    /// Draws only if crash injection is enabled and the run's crash count
    /// is still within `expected_crashes`.
    pub fn should_crash(&self) -> bool {
        self.count_query(DecisionKind::Crash);
        let parameters = self.parameters();

        let fired = self.tracker.crashes_enabled()
            && parameters.within_budget(self.tracker.crashes_count())
            && self.draw(DecisionKind::Crash, parameters.single_crash_probability);

        if fired {
            trace!(
                "Crash injected (p={}, crashes so far {})",
                parameters.single_crash_probability,
                self.tracker.crashes_count()
            );
        }
        fired
    }

    /// Whether a triggered crash should take down system state too.  One draw.
    pub fn should_system_crash(&self) -> bool {
        self.count_query(DecisionKind::SystemCrash);
        self.draw(DecisionKind::SystemCrash, SYSTEM_CRASH_PROBABILITY)
    }

    /// Answer a query by kind.
    pub fn decide(&self, kind: DecisionKind) -> bool {
        match kind {
            DecisionKind::Flush => self.should_flush(),
            DecisionKind::Crash => self.should_crash(),
            DecisionKind::SystemCrash => self.should_system_crash(),
        }
    }

    // ── Statistics and draw log ─────────────────────────────────

    /// Total draws consumed from the shared source.
    pub fn draws(&self) -> u64 {
        self.source.lock().draws()
    }

    pub fn stats(&self) -> OracleStats {
        OracleStats {
            flush: self.counters[DecisionKind::Flush.index()].snapshot(),
            crash: self.counters[DecisionKind::Crash.index()].snapshot(),
            system_crash: self.counters[DecisionKind::SystemCrash.index()].snapshot(),
            total_draws: self.draws(),
        }
    }

    /// Copy of the draw log.  Empty unless `record_draws` was configured.
    pub fn draw_log(&self) -> Vec<DrawRecord> {
        self.source.lock().log().map(<[_]>::to_vec).unwrap_or_default()
    }

    /// Drain the draw log.
    pub fn take_draw_log(&self) -> Vec<DrawRecord> {
        self.source.lock().take_log()
    }

    // ── Reset / snapshot ────────────────────────────────────────

    /// Rewind the draw source to its seed and clear statistics and the
    /// draw log.  Crash parameters are kept.
    pub fn reset(&self) {
        let mut source = self.source.lock();
        source.reset();
        for counters in &self.counters {
            counters.clear();
        }
        debug!("Oracle reset to seed {}", source.seed());
    }

    /// Capture the draw position, crash parameters and statistics.
    pub fn snapshot(&self) -> OracleSnapshot {
        let source = self.source.lock();
        OracleSnapshot {
            draw: source.snapshot(),
            parameters: *self.parameters.read(),
            counters: DecisionKind::ALL.map(|kind| self.counters[kind.index()].snapshot()),
        }
    }

    /// Restore a snapshot; the following decisions repeat those made
    /// after the snapshot was taken.  Statistics and the draw log are
    /// rolled back to the snapshot too.
    pub fn restore(&self, snapshot: &OracleSnapshot) {
        let mut source = self.source.lock();
        source.restore(&snapshot.draw);
        for kind in DecisionKind::ALL {
            self.counters[kind.index()].set(&snapshot.counters[kind.index()]);
        }
        *self.parameters.write() = snapshot.parameters;
    }

    // ── Internal ────────────────────────────────────────────────

    fn update(&self, f: impl FnOnce(&CrashParameters) -> CrashParameters) {
        let mut guard = self.parameters.write();
        let next = f(&*guard);
        *guard = next;
        drop(guard);

        if next.is_floored() {
            warn!(
                "Crash parameters floored: {} possible crashes x {} actors, probability {}",
                next.total_possible_crashes, next.total_actors, next.single_crash_probability
            );
        } else {
            debug!(
                "Crash parameters: {} possible crashes x {} actors, {} expected, probability {}",
                next.total_possible_crashes,
                next.total_actors,
                next.expected_crashes,
                next.single_crash_probability
            );
        }
    }

    fn count_query(&self, kind: DecisionKind) {
        self.counters[kind.index()]
            .queries
            .fetch_add(1, Ordering::Relaxed);
    }

    fn draw(&self, kind: DecisionKind, probability: f32) -> bool {
        let fired = self.source.lock().bernoulli(kind, probability);
        let counters = &self.counters[kind.index()];
        counters.draws.fetch_add(1, Ordering::Relaxed);
        if fired {
            counters.fired.fetch_add(1, Ordering::Relaxed);
        }
        fired
    }
}

impl std::fmt::Debug for FaultOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultOracle")
            .field("parameters", &self.parameters())
            .field("draws", &self.draws())
            .finish_non_exhaustive()
    }
}

//! Crash and flush decision oracle for crashcheck.
//!
//! Recoverable (persistence-aware) algorithms are tested by crashing
//! actors, or the whole system, at arbitrary points of an invocation and
//! then running the recovery path.  This crate decides *when* that
//! happens.  Every decision is a Bernoulli draw from one seeded
//! generator, so a run is reproduced exactly by replaying the same
//! sequence of queries against the same seed.
//!
//! This crate provides four main components:
//!
//! 1. **[`oracle`]** — The [`FaultOracle`](oracle::FaultOracle): crash
//!    parameters, the three decision queries, statistics
//! 2. **[`draw`]** — The shared seeded draw source, with optional draw log
//!    and snapshot/restore
//! 3. **[`tracker`]** — The crash-budget seam: whether injection is
//!    enabled and how many crashes already happened
//! 4. **[`config`]** — Seed and crash budget, from defaults, env or JSON
//!
//! # Architecture
//!
//! ```text
//! Runner                   Instrumentation            FaultOracle
//! ──────                   ───────────────            ───────────
//! apply configuration ───────────────────────────→ configure()
//!                          flush point?   ─────────→ should_flush()
//!                          crash point?   ─────────→ should_crash() ──→ CrashTracker
//!                          crash fired    ─────────→ should_system_crash()
//! ```

pub mod config;
pub mod decision;
pub mod draw;
pub mod oracle;
pub mod tracker;

pub use config::{ConfigError, OracleConfig};
pub use decision::DecisionKind;
pub use draw::{DrawRecord, DrawSource};
pub use oracle::{CrashParameters, FaultOracle, OracleSnapshot, OracleStats};
pub use tracker::{CrashTracker, RecoverableStateTracker};

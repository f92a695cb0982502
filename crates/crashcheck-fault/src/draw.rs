//! Seeded draw source shared by every oracle query.
//!
//! All decisions come from one ChaCha20 stream.  Each draw is numbered;
//! the number is assigned while the source is borrowed mutably, so under
//! the oracle's mutex no two queries can observe the same position.

use crate::decision::DecisionKind;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

/// One logged Bernoulli draw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawRecord {
    /// Position of this draw in the stream (0-based).
    pub sequence: u64,
    /// Which query consumed the draw.
    pub kind: DecisionKind,
    /// The uniform value drawn from `[0, 1)`.
    pub value: f32,
    /// Probability the value was compared against.
    pub probability: f32,
    /// Whether the decision fired (`value < probability`).
    pub fired: bool,
}

/// Snapshot of a [`DrawSource`]'s position.
#[derive(Debug, Clone)]
pub struct DrawSnapshot {
    rng_seed: [u8; 32],
    rng_stream: u64,
    rng_word_pos: u128,
    next_sequence: u64,
}

/// Deterministic generator plus draw bookkeeping.
///
/// # Example
///
/// ```
/// use crashcheck_fault::decision::DecisionKind;
/// use crashcheck_fault::draw::DrawSource;
///
/// let mut a = DrawSource::new(7);
/// let mut b = DrawSource::new(7);
/// for _ in 0..16 {
///     assert_eq!(
///         a.bernoulli(DecisionKind::Flush, 0.5),
///         b.bernoulli(DecisionKind::Flush, 0.5),
///     );
/// }
/// assert_eq!(a.draws(), 16);
/// ```
#[derive(Debug, Clone)]
pub struct DrawSource {
    seed: u64,
    rng: ChaCha20Rng,
    next_sequence: u64,
    /// Present only when draw logging is enabled.
    log: Option<Vec<DrawRecord>>,
}

impl DrawSource {
    /// Create a source without a draw log.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: rng_from_seed(seed),
            next_sequence: 0,
            log: None,
        }
    }

    /// Create a source that records every draw.
    pub fn with_log(seed: u64) -> Self {
        Self {
            log: Some(Vec::new()),
            ..Self::new(seed)
        }
    }

    /// The seed this source was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Draw once and compare against `probability`.
    ///
    /// Probabilities at or above 1 always fire; at or below 0 never fire.
    /// Either way exactly one value is consumed.
    pub fn bernoulli(&mut self, kind: DecisionKind, probability: f32) -> bool {
        let value: f32 = self.rng.gen();
        let fired = value < probability;
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        if let Some(log) = &mut self.log {
            log.push(DrawRecord {
                sequence,
                kind,
                value,
                probability,
                fired,
            });
        }

        fired
    }

    /// Number of draws consumed since creation or the last reset.
    pub fn draws(&self) -> u64 {
        self.next_sequence
    }

    /// Whether draws are being logged.
    pub fn is_logging(&self) -> bool {
        self.log.is_some()
    }

    /// The draw log, if logging is enabled.
    pub fn log(&self) -> Option<&[DrawRecord]> {
        self.log.as_deref()
    }

    /// Drain the draw log.  Empty if logging is disabled.
    pub fn take_log(&mut self) -> Vec<DrawRecord> {
        self.log.as_mut().map(std::mem::take).unwrap_or_default()
    }

    /// Rewind to the seed.  The log, if any, is cleared.
    pub fn reset(&mut self) {
        self.rng = rng_from_seed(self.seed);
        self.next_sequence = 0;
        if let Some(log) = &mut self.log {
            log.clear();
        }
    }

    /// Capture the stream position.
    pub fn snapshot(&self) -> DrawSnapshot {
        DrawSnapshot {
            rng_seed: self.rng.get_seed(),
            rng_stream: self.rng.get_stream(),
            rng_word_pos: self.rng.get_word_pos(),
            next_sequence: self.next_sequence,
        }
    }

    /// Return to a previously captured position.  Logged draws past
    /// that position are dropped.
    pub fn restore(&mut self, snapshot: &DrawSnapshot) {
        self.rng = ChaCha20Rng::from_seed(snapshot.rng_seed);
        self.rng.set_stream(snapshot.rng_stream);
        self.rng.set_word_pos(snapshot.rng_word_pos);
        self.next_sequence = snapshot.next_sequence;
        if let Some(log) = &mut self.log {
            log.retain(|record| record.sequence < snapshot.next_sequence);
        }
    }
}

fn rng_from_seed(seed: u64) -> ChaCha20Rng {
    let mut key = [0u8; 32];
    key[..8].copy_from_slice(&seed.to_le_bytes());
    ChaCha20Rng::from_seed(key)
}

//! Deterministic collaborators for tests and local tooling.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::capabilities::{CardSource, CardSourceError, Clock, RecordSink, SinkError};
use punto_types::GameRecord;

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: u64) -> u64 {
        self.now.fetch_add(delta_ms, Ordering::SeqCst) + delta_ms
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Deals prepared coups in order, then repeats the last one.
///
/// Each coup lists cards in dealing order (Player, Banker, Player, Banker,
/// then any third cards).
pub struct ScriptedCards {
    coups: Mutex<VecDeque<Vec<u8>>>,
    last: Mutex<Vec<u8>>,
}

impl ScriptedCards {
    pub fn new(coups: impl IntoIterator<Item = Vec<u8>>) -> Self {
        let coups: VecDeque<Vec<u8>> = coups.into_iter().collect();
        let last = coups.back().cloned().unwrap_or_default();
        Self {
            coups: Mutex::new(coups),
            last: Mutex::new(last),
        }
    }

    /// Player 9 (9, K) against Banker 5 (2, 3).
    pub fn player_natural() -> Self {
        Self::new([vec![8, 1, 12, 2]])
    }

    /// Banker 8 (6, 2) against Player 0 (K, Q).
    pub fn banker_natural() -> Self {
        Self::new([vec![12, 5, 11, 1]])
    }
}

impl CardSource for ScriptedCards {
    fn shoe(&self) -> Result<Vec<u8>, CardSourceError> {
        let mut coups = self
            .coups
            .lock()
            .map_err(|_| CardSourceError::Unavailable("script poisoned".to_string()))?;
        let mut last = self
            .last
            .lock()
            .map_err(|_| CardSourceError::Unavailable("script poisoned".to_string()))?;
        if let Some(next) = coups.pop_front() {
            *last = next;
        }
        Ok(last.iter().rev().copied().collect())
    }
}

/// Fails the first `failures` deals, then behaves like the wrapped source.
pub struct FailingCards<C> {
    remaining: AtomicU64,
    inner: C,
}

impl<C: CardSource> FailingCards<C> {
    pub fn new(failures: u64, inner: C) -> Self {
        Self {
            remaining: AtomicU64::new(failures),
            inner,
        }
    }

    /// Never deals.
    pub fn always(inner: C) -> Self {
        Self::new(u64::MAX, inner)
    }
}

impl<C: CardSource> CardSource for FailingCards<C> {
    fn shoe(&self) -> Result<Vec<u8>, CardSourceError> {
        let failed = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            return Err(CardSourceError::Unavailable("shuffler offline".to_string()));
        }
        self.inner.shoe()
    }
}

/// Sink that rejects every record.
#[derive(Clone, Copy, Debug, Default)]
pub struct BrokenSink;

impl RecordSink for BrokenSink {
    fn record(&self, _record: &GameRecord) -> Result<(), SinkError> {
        Err(SinkError::Unavailable)
    }
}

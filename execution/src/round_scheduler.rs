//! Phase timing for a chat round.
//!
//! This module answers "is a transition due?" and "when does the next phase
//! end?" without touching any round data, so the rules can be tested in
//! isolation from the state they drive.
//!
//! ## Phases
//!
//! 1. **Betting** - bets accepted until `betting_ends_at`
//! 2. **Processing** - window closed, cards are drawn on the next tick
//! 3. **Revealing** - result visible, held for `reveal_ms`
//! 4. **Finished** - round settled and recorded, held for `cooldown_ms`
//! 5. **Idle** - no round; a start request opens a new one
//!
//! All times are milliseconds from the engine [`Clock`](crate::Clock).

use punto_types::GameState;

use crate::config::ConfigError;

/// Phase durations in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseConfig {
    /// How long bets are accepted after a start.
    pub betting_ms: u64,
    /// How long a dealt result is shown before the round finishes.
    pub reveal_ms: u64,
    /// How long a finished round stays visible before the chat goes idle.
    pub cooldown_ms: u64,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            betting_ms: 30_000,
            reveal_ms: 5_000,
            cooldown_ms: 10_000,
        }
    }
}

impl PhaseConfig {
    pub fn new(betting_ms: u64, reveal_ms: u64, cooldown_ms: u64) -> Self {
        Self {
            betting_ms,
            reveal_ms,
            cooldown_ms,
        }
    }

    /// All durations must be > 0.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.betting_ms == 0 {
            return Err(ConfigError::ZeroDuration { field: "betting_ms" });
        }
        if self.reveal_ms == 0 {
            return Err(ConfigError::ZeroDuration { field: "reveal_ms" });
        }
        if self.cooldown_ms == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "cooldown_ms",
            });
        }
        Ok(())
    }

    /// Duration of a phase; Processing lasts until the next tick.
    pub fn duration_for_phase(&self, phase: GameState) -> u64 {
        match phase {
            GameState::Betting => self.betting_ms,
            GameState::Processing => 0,
            GameState::Revealing => self.reveal_ms,
            GameState::Finished => self.cooldown_ms,
            GameState::Idle => 0,
        }
    }
}

/// Result of a phase transition check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionResult {
    NoTransition,
    TransitionTo {
        phase: GameState,
        phase_ends_at_ms: u64,
    },
}

/// Pure timing rules for the round lifecycle.
#[derive(Clone, Debug)]
pub struct RoundScheduler {
    config: PhaseConfig,
}

impl RoundScheduler {
    pub fn new(config: PhaseConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PhaseConfig {
        &self.config
    }

    /// Phase that follows `phase` on a timed transition.
    ///
    /// Idle has no successor: only a start request leaves it.
    pub fn next_phase(phase: GameState) -> Option<GameState> {
        match phase {
            GameState::Betting => Some(GameState::Processing),
            GameState::Processing => Some(GameState::Revealing),
            GameState::Revealing => Some(GameState::Finished),
            GameState::Finished => Some(GameState::Idle),
            GameState::Idle => None,
        }
    }

    /// Check whether the timer for `current_phase` has run out.
    pub fn check_transition(
        &self,
        current_phase: GameState,
        phase_ends_at_ms: u64,
        now_ms: u64,
    ) -> TransitionResult {
        if now_ms < phase_ends_at_ms {
            return TransitionResult::NoTransition;
        }
        let Some(next_phase) = Self::next_phase(current_phase) else {
            return TransitionResult::NoTransition;
        };
        let next_duration = self.config.duration_for_phase(next_phase);
        TransitionResult::TransitionTo {
            phase: next_phase,
            phase_ends_at_ms: now_ms.saturating_add(next_duration),
        }
    }

    pub fn betting_phase_end_time(&self, start_time_ms: u64) -> u64 {
        start_time_ms.saturating_add(self.config.betting_ms)
    }

    /// Bets are accepted strictly before the window end.
    pub fn is_betting_open(&self, current_phase: GameState, betting_ends_at_ms: u64, now_ms: u64) -> bool {
        matches!(current_phase, GameState::Betting) && now_ms < betting_ends_at_ms
    }

    pub fn can_start_new_round(&self, current_phase: GameState) -> bool {
        !current_phase.is_live()
    }
}

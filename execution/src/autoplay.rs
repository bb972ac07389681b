//! Auto-play: chain rounds for a chat without anyone sending a start.
//!
//! The controller only keeps the schedule. Starting the round is left to
//! the chat's tick operation, which asks [`AutoPlay::take_due`] first.

use tracing::info;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AutoPlay {
    enabled: bool,
    next_start_at: Option<u64>,
    games_in_session: u32,
    delay_ms: u64,
    max_games: Option<u32>,
}

impl AutoPlay {
    pub fn new(delay_ms: u64, max_games: Option<u32>) -> Self {
        Self {
            delay_ms,
            max_games,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn next_start_at(&self) -> Option<u64> {
        self.next_start_at
    }

    pub fn games_in_session(&self) -> u32 {
        self.games_in_session
    }

    /// Turn auto-play on and start a new session count.
    ///
    /// When the chat is between rounds (`round_finished`) the next start is
    /// scheduled right away; otherwise it waits for the current round to
    /// finish. Enabling twice keeps the running session.
    pub fn enable(&mut self, round_finished: bool, now_ms: u64) {
        if self.enabled {
            return;
        }
        self.enabled = true;
        self.games_in_session = 0;
        if round_finished {
            self.next_start_at = Some(now_ms.saturating_add(self.delay_ms));
        }
        info!(next_start_at = ?self.next_start_at, "auto-play enabled");
    }

    /// Turn auto-play off. Any scheduled start is cancelled.
    pub fn disable(&mut self) {
        if !self.enabled && self.next_start_at.is_none() {
            return;
        }
        self.enabled = false;
        let cancelled = self.next_start_at.take();
        info!(
            cancelled = ?cancelled,
            games = self.games_in_session,
            "auto-play disabled"
        );
    }

    /// A round reached Finished. Returns the scheduled start, if any.
    pub fn on_finished(&mut self, finished_at: u64) -> Option<u64> {
        if !self.enabled {
            return None;
        }
        self.games_in_session = self.games_in_session.saturating_add(1);
        if let Some(max) = self.max_games {
            if self.games_in_session >= max {
                self.enabled = false;
                self.next_start_at = None;
                info!(games = self.games_in_session, "auto-play session limit reached");
                return None;
            }
        }
        let start_at = finished_at.saturating_add(self.delay_ms);
        self.next_start_at = Some(start_at);
        Some(start_at)
    }

    /// Drop a pending start without changing the flag, e.g. when a round
    /// was started by hand.
    pub fn cancel_pending(&mut self) {
        self.next_start_at = None;
    }

    /// Consume the scheduled start if its time has come.
    pub fn take_due(&mut self, now_ms: u64) -> bool {
        match self.next_start_at {
            Some(at) if self.enabled && now_ms >= at => {
                self.next_start_at = None;
                true
            }
            _ => false,
        }
    }
}

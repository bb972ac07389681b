//! A single round for one chat: betting window, deal, reveal and finish.
//!
//! `Round` is owned by its chat's queue worker, so nothing here locks. Timed
//! transitions happen only in [`Round::advance`], which the tick operation
//! calls; they follow [`RoundScheduler::check_transition`].

use std::collections::BTreeMap;

use punto_types::{
    BetReceipt, BetTotals, BetType, DealtCards, GameRecord, GameState, LedgerEntry, Payout,
    RoundResult,
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::capabilities::{CardSource, CardSourceError};
use crate::casino::{self, DealError};
use crate::error::EngineError;
use crate::ledger::BetLedger;
use crate::round_scheduler::{RoundScheduler, TransitionResult};

/// Build a 17-digit game number from a millisecond timestamp and a sequence.
pub fn game_number(now_ms: u64, sequence: u64) -> String {
    format!("{:013}{:04}", now_ms % 10_000_000_000_000, sequence % 10_000)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProcessError {
    #[error(transparent)]
    Source(#[from] CardSourceError),
    #[error(transparent)]
    Deal(#[from] DealError),
}

/// What a call to [`Round::advance`] did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// No timer has run out.
    Waiting,
    /// Betting closed; the round is Processing.
    Locked,
    /// Cards dealt and result computed; the round is Revealing.
    Revealed(RoundResult),
    /// The deal failed and will be retried on the next tick.
    DealFailed { attempts: u32 },
    /// Reveal finished; the round is Finished with a result.
    Finished,
    /// The deal kept failing; the round is Finished without a result.
    Aborted { attempts: u32 },
    /// Cooldown over; the owner should drop the round.
    Retired,
}

/// Published copy of a round, read by the status projector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundView {
    pub game_number: String,
    pub state: GameState,
    pub bets: BTreeMap<String, LedgerEntry>,
    pub totals: BetTotals,
    pub betting_end_time: u64,
    pub result: Option<RoundResult>,
    pub auto_played: bool,
}

#[derive(Debug)]
pub struct Round {
    chat_id: String,
    game_number: String,
    state: GameState,
    ledger: BetLedger,
    start_time: u64,
    betting_end_time: u64,
    phase_ends_at: u64,
    end_time: Option<u64>,
    cards: Option<DealtCards>,
    result: Option<RoundResult>,
    payouts: Vec<Payout>,
    locked_totals: Option<BetTotals>,
    process_attempts: u32,
    auto_played: bool,
}

impl Round {
    /// Open a round in Betting.
    pub fn open(
        chat_id: &str,
        game_number: String,
        ledger: BetLedger,
        scheduler: &RoundScheduler,
        now_ms: u64,
        auto_played: bool,
    ) -> Self {
        let betting_end_time = scheduler.betting_phase_end_time(now_ms);
        info!(
            chat_id,
            game_number = %game_number,
            betting_end_time,
            auto_played,
            "round opened"
        );
        Self {
            chat_id: chat_id.to_string(),
            game_number,
            state: GameState::Betting,
            ledger,
            start_time: now_ms,
            betting_end_time,
            phase_ends_at: betting_end_time,
            end_time: None,
            cards: None,
            result: None,
            payouts: Vec::new(),
            locked_totals: None,
            process_attempts: 0,
            auto_played,
        }
    }

    pub fn game_number(&self) -> &str {
        &self.game_number
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn betting_end_time(&self) -> u64 {
        self.betting_end_time
    }

    pub fn result(&self) -> Option<RoundResult> {
        self.result
    }

    pub fn cards(&self) -> Option<&DealtCards> {
        self.cards.as_ref()
    }

    pub fn ledger(&self) -> &BetLedger {
        &self.ledger
    }

    /// Ledger totals frozen when betting closed.
    pub fn locked_totals(&self) -> Option<BetTotals> {
        self.locked_totals
    }

    /// Accept a stake while the betting window is open.
    ///
    /// A bet that arrives at or after the window end fails with
    /// `BettingClosed` even before a tick has moved the round on.
    pub fn place_bet(
        &mut self,
        scheduler: &RoundScheduler,
        user_id: &str,
        user_name: &str,
        bet_type: BetType,
        amount: u64,
        now_ms: u64,
    ) -> Result<BetReceipt, EngineError> {
        if self.state != GameState::Betting {
            return Err(EngineError::InvalidState { state: self.state });
        }
        if !scheduler.is_betting_open(self.state, self.betting_end_time, now_ms) {
            return Err(EngineError::BettingClosed);
        }
        let placement = self.ledger.place(user_id, user_name, bet_type, amount)?;
        Ok(BetReceipt {
            bet_type,
            amount: placement.amount,
            user_name: user_name.to_string(),
            remaining_time: self.betting_end_time.saturating_sub(now_ms),
            totals: placement.totals,
            outcome: placement.outcome,
        })
    }

    /// Run at most one timed transition.
    pub fn advance(
        &mut self,
        scheduler: &RoundScheduler,
        cards: &dyn CardSource,
        max_attempts: u32,
        now_ms: u64,
    ) -> Step {
        let (phase, phase_ends_at_ms) =
            match scheduler.check_transition(self.state, self.phase_ends_at, now_ms) {
                TransitionResult::NoTransition => return Step::Waiting,
                TransitionResult::TransitionTo {
                    phase,
                    phase_ends_at_ms,
                } => (phase, phase_ends_at_ms),
            };

        match phase {
            GameState::Processing => {
                let totals = self.ledger.totals();
                self.locked_totals = Some(totals);
                self.state = GameState::Processing;
                self.phase_ends_at = phase_ends_at_ms;
                info!(
                    chat_id = %self.chat_id,
                    game_number = %self.game_number,
                    total_bets = totals.total_bets,
                    total_amount = totals.total_bets_amount,
                    "betting closed"
                );
                Step::Locked
            }
            GameState::Revealing => match self.deal(cards) {
                Ok(result) => {
                    self.state = GameState::Revealing;
                    self.phase_ends_at = phase_ends_at_ms;
                    info!(
                        chat_id = %self.chat_id,
                        game_number = %self.game_number,
                        banker = result.banker,
                        player = result.player,
                        winner = result.winner.as_str(),
                        "cards revealed"
                    );
                    Step::Revealed(result)
                }
                Err(err) => {
                    self.process_attempts = self.process_attempts.saturating_add(1);
                    let attempts = self.process_attempts;
                    if attempts >= max_attempts {
                        error!(
                            chat_id = %self.chat_id,
                            game_number = %self.game_number,
                            attempts,
                            %err,
                            "deal failed repeatedly; finishing round without a result"
                        );
                        self.finish(scheduler, now_ms);
                        Step::Aborted { attempts }
                    } else {
                        warn!(
                            chat_id = %self.chat_id,
                            game_number = %self.game_number,
                            attempts,
                            %err,
                            "deal failed; retrying on next tick"
                        );
                        Step::DealFailed { attempts }
                    }
                }
            },
            GameState::Finished => {
                self.finish(scheduler, now_ms);
                Step::Finished
            }
            GameState::Idle => Step::Retired,
            GameState::Betting => Step::Waiting,
        }
    }

    /// Draw and score the coup. Cards, result and payouts are committed
    /// together or not at all.
    fn deal(&mut self, cards: &dyn CardSource) -> Result<RoundResult, ProcessError> {
        let mut shoe = cards.shoe()?;
        let (dealt, result) = casino::deal(&mut shoe)?;
        self.payouts = casino::settle(self.ledger.entries(), result.winner);
        self.cards = Some(dealt);
        self.result = Some(result);
        Ok(result)
    }

    fn finish(&mut self, scheduler: &RoundScheduler, now_ms: u64) {
        self.state = GameState::Finished;
        self.end_time = Some(now_ms);
        self.phase_ends_at = now_ms.saturating_add(scheduler.config().cooldown_ms);
        info!(
            chat_id = %self.chat_id,
            game_number = %self.game_number,
            has_result = self.result.is_some(),
            "round finished"
        );
    }

    /// Snapshot handed to the record sink; only available once Finished.
    pub fn record(&self) -> Option<GameRecord> {
        let end_time = self.end_time?;
        if self.state != GameState::Finished {
            return None;
        }
        let totals = self.locked_totals.unwrap_or_else(|| self.ledger.totals());
        Some(GameRecord {
            chat_id: self.chat_id.clone(),
            game_number: self.game_number.clone(),
            start_time: self.start_time,
            betting_end_time: self.betting_end_time,
            end_time,
            bets: self.ledger.entries().clone(),
            cards: self.cards.clone(),
            result: self.result,
            total_bets: totals.total_bets,
            total_amount: totals.total_bets_amount,
            payouts: self.payouts.clone(),
            auto_played: self.auto_played,
        })
    }

    pub fn view(&self) -> RoundView {
        RoundView {
            game_number: self.game_number.clone(),
            state: self.state,
            bets: self.ledger.entries().clone(),
            totals: self.ledger.totals(),
            betting_end_time: self.betting_end_time,
            result: self.result,
            auto_played: self.auto_played,
        }
    }
}

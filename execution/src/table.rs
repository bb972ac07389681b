use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use punto_types::{AutoGameAck, BetReceipt, BetType, GameStarted, GameState};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::autoplay::AutoPlay;
use crate::capabilities::{CardSource, Clock, RecordSink};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::ledger::{BetLedger, BetLimits};
use crate::round::{self, Round, Step};
use crate::round_scheduler::RoundScheduler;
use crate::status::TableView;

/// Shared, read-only inputs for every chat worker.
pub(crate) struct Context {
    pub(crate) config: EngineConfig,
    pub(crate) scheduler: RoundScheduler,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) cards: Arc<dyn CardSource>,
    pub(crate) sink: Arc<dyn RecordSink>,
    sequence: AtomicU64,
}

impl Context {
    pub(crate) fn new(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        cards: Arc<dyn CardSource>,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            scheduler: RoundScheduler::new(config.phases),
            config,
            clock,
            cards,
            sink,
            sequence: AtomicU64::new(0),
        }
    }

    fn next_game_number(&self, now_ms: u64) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        round::game_number(now_ms, sequence)
    }

    fn new_ledger(&self) -> BetLedger {
        BetLedger::new(
            self.config.bet_policy,
            BetLimits {
                min: self.config.min_bet,
                max: self.config.max_bet,
            },
        )
    }
}

/// What a tick did to a chat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// No round and no scheduled start.
    Idle,
    /// A round exists but its timer has not run out.
    Waiting { state: GameState },
    Advanced { from: GameState, to: GameState },
    /// The deal failed and will be retried.
    Retrying { attempts: u32 },
    /// Auto-play opened a new round.
    AutoStarted { game_number: String },
}

/// Everything one chat owns. Lives inside the chat's queue worker.
pub(crate) struct ChatTable {
    chat_id: String,
    round: Option<Round>,
    autoplay: AutoPlay,
    publisher: watch::Sender<TableView>,
    /// Set once the engine has dropped this chat; later operations must not touch it.
    closed: bool,
}

impl ChatTable {
    pub(crate) fn new(chat_id: &str, config: &EngineConfig, publisher: watch::Sender<TableView>) -> Self {
        Self {
            chat_id: chat_id.to_string(),
            round: None,
            autoplay: AutoPlay::new(config.next_game_delay_ms, config.max_games_per_session),
            publisher,
            closed: false,
        }
    }

    pub(crate) fn chat_id(&self) -> &str {
        &self.chat_id
    }

    /// No round, no auto-play and nothing scheduled: the chat holds no state
    /// worth keeping.
    pub(crate) fn is_dormant(&self) -> bool {
        self.round.is_none()
            && !self.autoplay.is_enabled()
            && self.autoplay.next_start_at().is_none()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn close(&mut self) {
        self.closed = true;
    }

    /// Replace the published view with the current state.
    pub(crate) fn publish(&self) {
        self.publisher.send_replace(TableView {
            round: self.round.as_ref().map(Round::view),
            auto_game_enabled: self.autoplay.is_enabled(),
            total_games_in_session: self.autoplay.games_in_session(),
            next_game_at: self.autoplay.next_start_at(),
        });
    }

    pub(crate) fn start(&mut self, ctx: &Context) -> Result<GameStarted, EngineError> {
        if let Some(round) = &self.round {
            if !ctx.scheduler.can_start_new_round(round.state()) {
                return Err(EngineError::AlreadyActive {
                    game_number: round.game_number().to_string(),
                });
            }
        }
        self.autoplay.cancel_pending();
        Ok(self.open_round(ctx, ctx.clock.now_ms(), false))
    }

    fn open_round(&mut self, ctx: &Context, now_ms: u64, auto_played: bool) -> GameStarted {
        let round = Round::open(
            &self.chat_id,
            ctx.next_game_number(now_ms),
            ctx.new_ledger(),
            &ctx.scheduler,
            now_ms,
            auto_played,
        );
        let started = GameStarted {
            game_number: round.game_number().to_string(),
            betting_end_time: round.betting_end_time(),
        };
        self.round = Some(round);
        started
    }

    pub(crate) fn place_bet(
        &mut self,
        ctx: &Context,
        user_id: &str,
        user_name: &str,
        bet_type: BetType,
        amount: u64,
    ) -> Result<BetReceipt, EngineError> {
        let Some(round) = self.round.as_mut() else {
            return Err(EngineError::InvalidState {
                state: GameState::Idle,
            });
        };
        round.place_bet(
            &ctx.scheduler,
            user_id,
            user_name,
            bet_type,
            amount,
            ctx.clock.now_ms(),
        )
    }

    pub(crate) fn enable_auto(&mut self, ctx: &Context) -> AutoGameAck {
        let finished = self
            .round
            .as_ref()
            .is_some_and(|round| round.state() == GameState::Finished);
        self.autoplay.enable(finished, ctx.clock.now_ms());
        AutoGameAck {
            auto_game_enabled: self.autoplay.is_enabled(),
        }
    }

    pub(crate) fn disable_auto(&mut self) -> AutoGameAck {
        self.autoplay.disable();
        AutoGameAck {
            auto_game_enabled: false,
        }
    }

    /// Run due auto-play starts and at most one round transition.
    pub(crate) fn tick(&mut self, ctx: &Context) -> TickOutcome {
        let now_ms = ctx.clock.now_ms();

        if self.autoplay.take_due(now_ms) {
            let live = self
                .round
                .as_ref()
                .is_some_and(|round| round.state().is_live());
            if live {
                warn!(chat_id = %self.chat_id, "auto-play start due while a round is live; skipped");
            } else {
                let started = self.open_round(ctx, now_ms, true);
                return TickOutcome::AutoStarted {
                    game_number: started.game_number,
                };
            }
        }

        let Some(round) = self.round.as_mut() else {
            return TickOutcome::Idle;
        };
        let from = round.state();
        let step = round.advance(
            &ctx.scheduler,
            ctx.cards.as_ref(),
            ctx.config.max_process_attempts,
            now_ms,
        );
        let to = round.state();

        match step {
            Step::Waiting => TickOutcome::Waiting { state: from },
            Step::Locked | Step::Revealed(_) => TickOutcome::Advanced { from, to },
            Step::DealFailed { attempts } => TickOutcome::Retrying { attempts },
            Step::Finished | Step::Aborted { .. } => {
                self.on_finished(ctx, now_ms);
                TickOutcome::Advanced { from, to }
            }
            Step::Retired => {
                self.round = None;
                info!(chat_id = %self.chat_id, "chat idle");
                TickOutcome::Advanced {
                    from,
                    to: GameState::Idle,
                }
            }
        }
    }

    fn on_finished(&mut self, ctx: &Context, now_ms: u64) {
        if let Some(record) = self.round.as_ref().and_then(Round::record) {
            if let Err(err) = ctx.sink.record(&record) {
                warn!(
                    chat_id = %self.chat_id,
                    game_number = %record.game_number,
                    %err,
                    "failed to record round"
                );
            }
        }
        if let Some(start_at) = self.autoplay.on_finished(now_ms) {
            info!(chat_id = %self.chat_id, start_at, "next auto-play round scheduled");
        }
    }
}

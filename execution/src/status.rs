//! Read path for a chat's status.
//!
//! Each chat worker publishes a [`TableView`] after every operation. The
//! projector combines the latest view with the lane counters and the clock;
//! it never enters the operation queue.

use punto_types::{BetView, DebugInfo, GameState, GameStatus};

use crate::queue::QueueStats;
use crate::round::RoundView;

/// Last published state of one chat.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableView {
    pub round: Option<RoundView>,
    pub auto_game_enabled: bool,
    pub total_games_in_session: u32,
    pub next_game_at: Option<u64>,
}

pub fn project(view: &TableView, queue: QueueStats, now_ms: u64) -> GameStatus {
    let state = view
        .round
        .as_ref()
        .map(|round| round.state)
        .unwrap_or(GameState::Idle);
    let debug = DebugInfo {
        queue_length: queue.queue_length,
        queue_processing: queue.queue_processing,
        is_processing: state == GameState::Processing,
        revealing_in_progress: state == GameState::Revealing,
    };
    let mut status = GameStatus {
        state,
        auto_game_enabled: view.auto_game_enabled,
        total_games_in_session: view.total_games_in_session,
        next_game_at: view.next_game_at,
        debug: Some(debug),
        ..GameStatus::default()
    };

    let Some(round) = &view.round else {
        return status;
    };
    let betting = round.state == GameState::Betting;
    let time_remaining = if betting {
        round.betting_end_time.saturating_sub(now_ms)
    } else {
        0
    };
    let bets = round
        .bets
        .iter()
        .filter(|(_, entry)| !entry.is_empty())
        .map(|(user_id, entry)| BetView {
            user_id: user_id.clone(),
            entry: entry.clone(),
        })
        .collect();

    status.game_number = Some(round.game_number.clone());
    status.bets_count = round.totals.total_bets;
    status.total_bets = round.totals.total_bets_amount;
    status.total_bets_count = Some(round.totals.total_bets_count);
    status.users_count = Some(round.totals.total_bets);
    status.bets = Some(bets);
    status.time_remaining = Some(time_remaining);
    status.result = round.result;
    status.needs_processing = Some(betting && now_ms >= round.betting_end_time);
    status.is_auto_mode = Some(round.auto_played);
    status
}

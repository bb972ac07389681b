//! Types shared between the punto round engine and the hosts that drive it.
//!
//! Everything here is plain data with serde support; JSON field names are
//! camelCase to match what chat clients already consume.

pub mod api;
pub mod game;

pub use api::{
    AutoGameAck, AutoGameRequest, BetOutcome, BetReceipt, BetTotals, BetView, DebugInfo,
    ErrorBody, ErrorCode, GameStarted, GameStatus, PlaceBetRequest, Reply, StartGameRequest,
};
pub use game::{
    BetType, DealtCards, GameRecord, GameState, LedgerEntry, ParseBetTypeError, Payout,
    RoundResult, Winner, GAME_NUMBER_LEN,
};

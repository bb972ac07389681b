//! Request and response shapes exchanged with the chat layer.
//!
//! Every response is wrapped in a [`Reply`], which serializes as
//! `{"success": bool, ...data fields..., "error"?: {code, message}}`.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::game::{BetType, GameState, LedgerEntry, RoundResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartGameRequest {
    pub chat_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceBetRequest {
    pub chat_id: String,
    pub user_id: String,
    pub user_name: String,
    pub bet_type: BetType,
    pub amount: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoGameRequest {
    pub chat_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStarted {
    pub game_number: String,
    pub betting_end_time: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoGameAck {
    pub auto_game_enabled: bool,
}

/// How an accepted bet changed the user's ledger entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BetOutcome {
    /// First stake in this category.
    New,
    /// Added to an existing stake in the same category.
    Accumulated {
        previous_amount: u64,
        added_amount: u64,
    },
    /// Cleared a stake in another category and took its place.
    Replaced {
        previous_amount: u64,
        previous_bet_type: BetType,
    },
}

/// Aggregate view of a ledger after a mutation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetTotals {
    /// Distinct users holding a stake.
    pub total_bets: usize,
    pub total_bets_amount: u64,
    /// (user, category) entries.
    pub total_bets_count: usize,
}

/// Successful `PlaceBet` result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BetReceipt {
    pub bet_type: BetType,
    /// Stake now held in `bet_type` after this bet.
    pub amount: u64,
    pub user_name: String,
    /// Milliseconds left in the betting window.
    pub remaining_time: u64,
    pub totals: BetTotals,
    pub outcome: BetOutcome,
}

impl BetReceipt {
    pub fn is_accumulated(&self) -> bool {
        matches!(self.outcome, BetOutcome::Accumulated { .. })
    }

    pub fn is_replaced(&self) -> bool {
        matches!(self.outcome, BetOutcome::Replaced { .. })
    }

    pub fn is_new_bet_type(&self) -> bool {
        matches!(self.outcome, BetOutcome::New)
    }
}

/// Chat clients expect flat flags rather than a tagged outcome, so the
/// outcome is spread into `isAccumulated`/`isReplaced`/`isNewBetType` and the
/// fields that belong to it.
impl Serialize for BetReceipt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("betType", &self.bet_type)?;
        map.serialize_entry("amount", &self.amount)?;
        map.serialize_entry("userName", &self.user_name)?;
        map.serialize_entry("remainingTime", &self.remaining_time)?;
        map.serialize_entry("totalBets", &self.totals.total_bets)?;
        map.serialize_entry("totalBetsAmount", &self.totals.total_bets_amount)?;
        map.serialize_entry("totalBetsCount", &self.totals.total_bets_count)?;
        map.serialize_entry("isAccumulated", &self.is_accumulated())?;
        map.serialize_entry("isReplaced", &self.is_replaced())?;
        map.serialize_entry("isNewBetType", &self.is_new_bet_type())?;
        match self.outcome {
            BetOutcome::New => {}
            BetOutcome::Accumulated {
                previous_amount,
                added_amount,
            } => {
                map.serialize_entry("previousAmount", &previous_amount)?;
                map.serialize_entry("addedAmount", &added_amount)?;
            }
            BetOutcome::Replaced {
                previous_amount,
                previous_bet_type,
            } => {
                map.serialize_entry("previousAmount", &previous_amount)?;
                map.serialize_entry("previousBetType", &previous_bet_type)?;
            }
        }
        map.end()
    }
}

/// Wire error codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidState,
    AlreadyActive,
    InvalidAmount,
    BettingClosed,
    Overloaded,
    NotFound,
    Unavailable,
    /// Bet category the host could not parse.
    InvalidBetType,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidState => "INVALID_STATE",
            ErrorCode::AlreadyActive => "ALREADY_ACTIVE",
            ErrorCode::InvalidAmount => "INVALID_AMOUNT",
            ErrorCode::BettingClosed => "BETTING_CLOSED",
            ErrorCode::Overloaded => "OVERLOADED",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Unavailable => "UNAVAILABLE",
            ErrorCode::InvalidBetType => "INVALID_BET_TYPE",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    /// Current phase, so the caller can resynchronize after `INVALID_STATE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<GameState>,
}

impl ErrorBody {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            state: None,
        }
    }

    pub fn with_state(mut self, state: GameState) -> Self {
        self.state = Some(state);
        self
    }
}

/// Envelope for every operation result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply<T> {
    Ok(T),
    Err(ErrorBody),
}

impl<T> Reply<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Ok(_))
    }
}

impl<T, E: Into<ErrorBody>> From<Result<T, E>> for Reply<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => Reply::Ok(data),
            Err(err) => Reply::Err(err.into()),
        }
    }
}

impl<T: Serialize> Serialize for Reply<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Reply::Ok(data) => {
                #[derive(Serialize)]
                struct Success<'a, T> {
                    success: bool,
                    #[serde(flatten)]
                    data: &'a T,
                }
                Success {
                    success: true,
                    data,
                }
                .serialize(serializer)
            }
            Reply::Err(error) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("success", &false)?;
                map.serialize_entry("error", error)?;
                map.end()
            }
        }
    }
}

/// Per-user stakes as shown in the status view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetView {
    pub user_id: String,
    #[serde(flatten)]
    pub entry: LedgerEntry,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub queue_length: usize,
    pub queue_processing: bool,
    pub is_processing: bool,
    pub revealing_in_progress: bool,
}

/// Read-only projection of a chat's round, queue and auto-play state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_number: Option<String>,
    pub state: GameState,
    /// Distinct users holding a stake.
    pub bets_count: usize,
    /// Sum of all stakes.
    pub total_bets: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_bets_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bets: Option<Vec<BetView>>,
    /// Milliseconds left in the betting window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_remaining: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<RoundResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs_processing: Option<bool>,
    pub auto_game_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_auto_mode: Option<bool>,
    pub total_games_in_session: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_game_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

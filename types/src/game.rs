//! Round data model: phases, bet categories, ledger entries, results and the
//! post-round [`GameRecord`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of a generated game number (13-digit millisecond timestamp plus a
/// 4-digit sequence).
pub const GAME_NUMBER_LEN: usize = 17;

/// Lifecycle phase of a chat's round.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameState {
    #[default]
    Idle,
    Betting,
    Processing,
    Revealing,
    Finished,
}

impl GameState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameState::Idle => "idle",
            GameState::Betting => "betting",
            GameState::Processing => "processing",
            GameState::Revealing => "revealing",
            GameState::Finished => "finished",
        }
    }

    /// Betting, Processing and Revealing rounds block a new start.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            GameState::Betting | GameState::Processing | GameState::Revealing
        )
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three stake categories a user can back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetType {
    Banker,
    Player,
    Tie,
}

impl BetType {
    pub const ALL: [BetType; 3] = [BetType::Banker, BetType::Player, BetType::Tie];

    pub fn as_str(&self) -> &'static str {
        match self {
            BetType::Banker => "banker",
            BetType::Player => "player",
            BetType::Tie => "tie",
        }
    }
}

impl fmt::Display for BetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown bet type: {0}")]
pub struct ParseBetTypeError(pub String);

impl FromStr for BetType {
    type Err = ParseBetTypeError;

    /// Accepts the full names in any case plus the single-letter shorthands
    /// chat users tend to type.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "banker" | "bank" | "b" => Ok(BetType::Banker),
            "player" | "p" => Ok(BetType::Player),
            "tie" | "t" => Ok(BetType::Tie),
            _ => Err(ParseBetTypeError(s.to_string())),
        }
    }
}

/// Winning side of a dealt round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Banker,
    Player,
    Tie,
}

impl Winner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Winner::Banker => "banker",
            Winner::Player => "player",
            Winner::Tie => "tie",
        }
    }
}

/// One user's stakes within a round.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banker: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tie: Option<u64>,
}

impl LedgerEntry {
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            ..Self::default()
        }
    }

    pub fn stake(&self, bet_type: BetType) -> Option<u64> {
        match bet_type {
            BetType::Banker => self.banker,
            BetType::Player => self.player,
            BetType::Tie => self.tie,
        }
    }

    pub fn slot_mut(&mut self, bet_type: BetType) -> &mut Option<u64> {
        match bet_type {
            BetType::Banker => &mut self.banker,
            BetType::Player => &mut self.player,
            BetType::Tie => &mut self.tie,
        }
    }

    /// Categories holding a stake, in `BetType::ALL` order.
    pub fn stakes(&self) -> impl Iterator<Item = (BetType, u64)> + '_ {
        BetType::ALL
            .into_iter()
            .filter_map(|bet_type| self.stake(bet_type).map(|amount| (bet_type, amount)))
    }

    pub fn total(&self) -> u64 {
        self.stakes()
            .fold(0u64, |acc, (_, amount)| acc.saturating_add(amount))
    }

    pub fn entry_count(&self) -> usize {
        self.stakes().count()
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count() == 0
    }
}

/// Card codes dealt to each hand, in draw order.
///
/// Codes are `0..=51`: suit is `code / 13`, rank is `code % 13` with 0 = Ace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealtCards {
    pub banker: Vec<u8>,
    pub player: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResult {
    pub banker: u8,
    pub player: u8,
    pub winner: Winner,
}

/// Settlement of one user's stakes once the winner is known.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payout {
    pub user_id: String,
    pub user_name: String,
    pub staked: u64,
    /// Stake plus winnings; the bare stake on a push; zero on a loss.
    pub returned: u64,
    pub net: i64,
}

/// Immutable summary of a completed round, handed to the record sink.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    pub chat_id: String,
    pub game_number: String,
    pub start_time: u64,
    pub betting_end_time: u64,
    pub end_time: u64,
    pub bets: BTreeMap<String, LedgerEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cards: Option<DealtCards>,
    /// Absent when the round was forced to finish without a deal.
    pub result: Option<RoundResult>,
    /// Distinct users holding a stake.
    pub total_bets: usize,
    pub total_amount: u64,
    #[serde(default)]
    pub payouts: Vec<Payout>,
    #[serde(default)]
    pub auto_played: bool,
}

impl GameRecord {
    pub fn winner(&self) -> Option<Winner> {
        self.result.map(|result| result.winner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bet_type_parsing() {
        assert_eq!("Banker".parse::<BetType>(), Ok(BetType::Banker));
        assert_eq!(" p ".parse::<BetType>(), Ok(BetType::Player));
        assert_eq!("TIE".parse::<BetType>(), Ok(BetType::Tie));
        assert_eq!(
            "dragon".parse::<BetType>(),
            Err(ParseBetTypeError("dragon".to_string()))
        );
    }

    #[test]
    fn test_live_states() {
        assert!(!GameState::Idle.is_live());
        assert!(GameState::Betting.is_live());
        assert!(GameState::Processing.is_live());
        assert!(GameState::Revealing.is_live());
        assert!(!GameState::Finished.is_live());
    }

    #[test]
    fn test_ledger_entry_stakes() {
        let mut entry = LedgerEntry::new("Alice");
        assert!(entry.is_empty());

        *entry.slot_mut(BetType::Tie) = Some(20);
        *entry.slot_mut(BetType::Banker) = Some(100);

        let stakes: Vec<_> = entry.stakes().collect();
        assert_eq!(stakes, vec![(BetType::Banker, 100), (BetType::Tie, 20)]);
        assert_eq!(entry.total(), 120);
        assert_eq!(entry.entry_count(), 2);
    }

    #[test]
    fn test_ledger_entry_json_omits_empty_categories() {
        let mut entry = LedgerEntry::new("Bob");
        entry.player = Some(50);
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value, serde_json::json!({"userName": "Bob", "player": 50}));
    }

    #[test]
    fn test_state_wire_names() {
        assert_eq!(
            serde_json::to_value(GameState::Revealing).unwrap(),
            serde_json::json!("revealing")
        );
        assert_eq!(GameState::Processing.to_string(), "processing");
    }
}

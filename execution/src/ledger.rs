//! Per-round stake book.
//!
//! The ledger only knows about amounts and categories; whether bets are
//! accepted at all is decided by the round that owns it.

use std::collections::BTreeMap;

use punto_types::{BetOutcome, BetTotals, BetType, LedgerEntry};
use tracing::debug;

use crate::config::BetPolicy;
use crate::error::EngineError;

/// Bet size bounds. `min` applies to each bet on its own; `max` applies to
/// the stake a user ends up holding in one category.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BetLimits {
    pub min: u64,
    pub max: Option<u64>,
}

impl Default for BetLimits {
    fn default() -> Self {
        Self { min: 1, max: None }
    }
}

/// Result of an accepted bet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    pub outcome: BetOutcome,
    /// Stake now held in the bet's category.
    pub amount: u64,
    pub totals: BetTotals,
}

#[derive(Clone, Debug, Default)]
pub struct BetLedger {
    policy: BetPolicy,
    limits: BetLimits,
    entries: BTreeMap<String, LedgerEntry>,
}

impl BetLedger {
    pub fn new(policy: BetPolicy, limits: BetLimits) -> Self {
        Self {
            policy,
            limits,
            entries: BTreeMap::new(),
        }
    }

    /// Record a stake for `user_id`.
    ///
    /// Same category accumulates. A different category either replaces the
    /// previous stake or sits beside it, depending on the [`BetPolicy`].
    pub fn place(
        &mut self,
        user_id: &str,
        user_name: &str,
        bet_type: BetType,
        amount: u64,
    ) -> Result<Placement, EngineError> {
        if amount == 0 || amount < self.limits.min {
            return Err(EngineError::InvalidAmount { amount });
        }

        let held = self.entries.get(user_id);
        let existing = held.and_then(|entry| entry.stake(bet_type));
        let Some(new_stake) = existing.unwrap_or(0).checked_add(amount) else {
            return Err(EngineError::InvalidAmount { amount });
        };
        if let Some(max) = self.limits.max {
            if new_stake > max {
                return Err(EngineError::InvalidAmount { amount });
            }
        }
        // Stakes this bet would clear under single-category replacement.
        let released = match (existing, self.policy) {
            (None, BetPolicy::SingleCategory) => held.map_or(0, LedgerEntry::total),
            _ => 0,
        };
        if (self.total_amount() - released).checked_add(amount).is_none() {
            return Err(EngineError::InvalidAmount { amount });
        }

        let policy = self.policy;
        let entry = self
            .entries
            .entry(user_id.to_string())
            .or_insert_with(|| LedgerEntry::new(user_name));
        entry.user_name = user_name.to_string();

        let outcome = match existing {
            Some(previous_amount) => BetOutcome::Accumulated {
                previous_amount,
                added_amount: amount,
            },
            None => {
                let replaced = match policy {
                    BetPolicy::SingleCategory => entry
                        .stakes()
                        .find(|(other, _)| *other != bet_type),
                    BetPolicy::MultiCategory => None,
                };
                match replaced {
                    Some((previous_bet_type, previous_amount)) => {
                        for other in BetType::ALL {
                            if other != bet_type {
                                *entry.slot_mut(other) = None;
                            }
                        }
                        BetOutcome::Replaced {
                            previous_amount,
                            previous_bet_type,
                        }
                    }
                    None => BetOutcome::New,
                }
            }
        };
        *entry.slot_mut(bet_type) = Some(new_stake);

        debug!(
            user_id,
            bet_type = bet_type.as_str(),
            amount,
            stake = new_stake,
            ?outcome,
            "bet recorded"
        );

        Ok(Placement {
            outcome,
            amount: new_stake,
            totals: self.totals(),
        })
    }

    /// Sum of every stake in the book. `place` keeps this within `u64`.
    fn total_amount(&self) -> u64 {
        self.entries.values().map(LedgerEntry::total).sum()
    }

    pub fn totals(&self) -> BetTotals {
        let mut totals = BetTotals::default();
        for entry in self.entries.values().filter(|entry| !entry.is_empty()) {
            totals.total_bets += 1;
            totals.total_bets_amount += entry.total();
            totals.total_bets_count += entry.entry_count();
        }
        totals
    }

    pub fn entries(&self) -> &BTreeMap<String, LedgerEntry> {
        &self.entries
    }

    pub fn get(&self, user_id: &str) -> Option<&LedgerEntry> {
        self.entries.get(user_id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(LedgerEntry::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn single() -> BetLedger {
        BetLedger::new(BetPolicy::SingleCategory, BetLimits::default())
    }

    #[test]
    fn test_first_bet_is_new() {
        let mut ledger = single();
        let placement = ledger.place("u1", "Alice", BetType::Banker, 100).unwrap();
        assert_eq!(placement.outcome, BetOutcome::New);
        assert_eq!(placement.amount, 100);
        assert_eq!(
            placement.totals,
            BetTotals {
                total_bets: 1,
                total_bets_amount: 100,
                total_bets_count: 1,
            }
        );
    }

    #[test]
    fn test_same_category_accumulates() {
        let mut ledger = single();
        ledger.place("u1", "Alice", BetType::Banker, 100).unwrap();
        let placement = ledger.place("u1", "Alice", BetType::Banker, 50).unwrap();
        assert_eq!(
            placement.outcome,
            BetOutcome::Accumulated {
                previous_amount: 100,
                added_amount: 50,
            }
        );
        assert_eq!(placement.amount, 150);
        assert_eq!(placement.totals.total_bets_amount, 150);
        assert_eq!(placement.totals.total_bets_count, 1);
    }

    #[test]
    fn test_other_category_replaces() {
        let mut ledger = single();
        ledger.place("u1", "Alice", BetType::Banker, 100).unwrap();
        let placement = ledger.place("u1", "Alice", BetType::Player, 30).unwrap();
        assert_eq!(
            placement.outcome,
            BetOutcome::Replaced {
                previous_amount: 100,
                previous_bet_type: BetType::Banker,
            }
        );
        let entry = ledger.get("u1").unwrap();
        assert_eq!(entry.banker, None);
        assert_eq!(entry.player, Some(30));
        assert_eq!(placement.totals.total_bets_amount, 30);
    }

    #[test]
    fn test_multi_category_keeps_both() {
        let mut ledger = BetLedger::new(BetPolicy::MultiCategory, BetLimits::default());
        ledger.place("u1", "Alice", BetType::Banker, 100).unwrap();
        let placement = ledger.place("u1", "Alice", BetType::Tie, 10).unwrap();
        assert_eq!(placement.outcome, BetOutcome::New);
        assert_eq!(
            placement.totals,
            BetTotals {
                total_bets: 1,
                total_bets_amount: 110,
                total_bets_count: 2,
            }
        );
    }

    #[test]
    fn test_zero_amount_rejected_without_mutation() {
        let mut ledger = single();
        assert_eq!(
            ledger.place("u1", "Alice", BetType::Tie, 0),
            Err(EngineError::InvalidAmount { amount: 0 })
        );
        assert!(ledger.is_empty());
        assert!(ledger.get("u1").is_none());
    }

    #[test]
    fn test_limits_apply_to_held_stake() {
        let mut ledger = BetLedger::new(
            BetPolicy::SingleCategory,
            BetLimits {
                min: 10,
                max: Some(100),
            },
        );
        assert!(ledger.place("u1", "Alice", BetType::Player, 5).is_err());
        ledger.place("u1", "Alice", BetType::Player, 80).unwrap();
        assert_eq!(
            ledger.place("u1", "Alice", BetType::Player, 30),
            Err(EngineError::InvalidAmount { amount: 30 })
        );
        assert_eq!(ledger.get("u1").unwrap().player, Some(80));
    }

    #[test]
    fn test_min_applies_to_each_bet() {
        let mut ledger = BetLedger::new(
            BetPolicy::SingleCategory,
            BetLimits { min: 10, max: None },
        );
        ledger.place("u1", "Alice", BetType::Player, 80).unwrap();
        assert_eq!(
            ledger.place("u1", "Alice", BetType::Player, 5),
            Err(EngineError::InvalidAmount { amount: 5 })
        );
        let placement = ledger.place("u1", "Alice", BetType::Player, 10).unwrap();
        assert_eq!(placement.amount, 90);
    }

    #[test]
    fn test_stake_overflow_rejected_without_mutation() {
        let mut ledger = single();
        ledger.place("u1", "Alice", BetType::Banker, u64::MAX).unwrap();
        assert_eq!(
            ledger.place("u1", "Alice", BetType::Banker, 5),
            Err(EngineError::InvalidAmount { amount: 5 })
        );
        assert_eq!(ledger.get("u1").unwrap().banker, Some(u64::MAX));
        assert_eq!(ledger.totals().total_bets_amount, u64::MAX);
    }

    #[test]
    fn test_round_total_overflow_rejected_without_mutation() {
        let mut ledger = single();
        ledger.place("u1", "Alice", BetType::Banker, u64::MAX - 10).unwrap();
        assert_eq!(
            ledger.place("u2", "Bob", BetType::Player, 11),
            Err(EngineError::InvalidAmount { amount: 11 })
        );
        assert!(ledger.get("u2").is_none());
        assert_eq!(ledger.totals().total_bets, 1);

        ledger.place("u2", "Bob", BetType::Player, 10).unwrap();
        assert_eq!(ledger.totals().total_bets_amount, u64::MAX);

        // Replacing frees the old stake before the new one is counted.
        let placement = ledger.place("u1", "Alice", BetType::Tie, 20).unwrap();
        assert!(matches!(placement.outcome, BetOutcome::Replaced { .. }));
        assert_eq!(placement.totals.total_bets_amount, 30);
    }

    #[test]
    fn test_display_name_follows_latest_bet() {
        let mut ledger = single();
        ledger.place("u1", "Alice", BetType::Player, 10).unwrap();
        ledger.place("u1", "Alice B.", BetType::Player, 10).unwrap();
        assert_eq!(ledger.get("u1").unwrap().user_name, "Alice B.");
    }

    proptest! {
        #[test]
        fn prop_same_category_sums(amounts in proptest::collection::vec(1u64..10_000, 1..40)) {
            let mut ledger = single();
            for amount in &amounts {
                ledger.place("u1", "Alice", BetType::Banker, *amount).unwrap();
            }
            let expected: u64 = amounts.iter().sum();
            prop_assert_eq!(ledger.get("u1").unwrap().banker, Some(expected));
            prop_assert_eq!(ledger.totals().total_bets_amount, expected);
        }

        #[test]
        fn prop_user_total_only_drops_on_replace(
            bets in proptest::collection::vec((0usize..3, 1u64..1_000), 1..40)
        ) {
            let mut ledger = single();
            let mut previous_total = 0u64;
            for (kind, amount) in bets {
                let bet_type = BetType::ALL[kind];
                let placement = ledger.place("u1", "Alice", bet_type, amount).unwrap();
                let total = ledger.get("u1").unwrap().total();
                if total < previous_total {
                    let is_replaced = matches!(placement.outcome, BetOutcome::Replaced { .. });
                    prop_assert!(is_replaced);
                }
                prop_assert_eq!(ledger.get("u1").unwrap().entry_count(), 1);
                previous_total = total;
            }
        }
    }
}

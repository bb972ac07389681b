//! Punto banco rules: dealing, scoring and settlement.
//!
//! A deal takes cards from the back of a shoe in the order Player, Banker,
//! Player, Banker, then applies the third-card tableau. Totals are the sum of
//! card values mod 10.
//!
//! Settlement (winnings are "X:1", not including the returned stake):
//! - Player bet: 1:1 on a Player win, push on a Tie
//! - Banker bet: 1:1 less 5% commission on a Banker win, push on a Tie
//! - Tie bet: 8:1 on a Tie

use std::collections::BTreeMap;

use punto_types::{BetType, DealtCards, LedgerEntry, Payout, RoundResult, Winner};
use thiserror::Error;

use super::cards;

mod payouts {
    /// Player: 1:1
    pub const PLAYER: u64 = 1;
    /// Banker: 1:1 before commission
    pub const BANKER: u64 = 1;
    /// Banker winnings keep 95 percent (floor).
    pub const BANKER_COMMISSION_KEEP_NUMERATOR: u64 = 95;
    pub const BANKER_COMMISSION_DENOMINATOR: u64 = 100;
    /// Tie: 8:1
    pub const TIE: u64 = 8;
}

/// Eight decks, the usual punto banco shoe.
pub const BACCARAT_DECKS: u8 = 8;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DealError {
    #[error("shoe ran out of cards")]
    ShoeExhausted,
    #[error("card code {0} is out of range")]
    InvalidCard(u8),
}

/// Baccarat value of a card: Ace = 1, 2-9 face value, 10/J/Q/K = 0.
pub fn card_value(card: u8) -> u8 {
    let rank = cards::card_rank_one_based(card); // 1-13
    match rank {
        1 => 1,        // Ace
        2..=9 => rank, // 2-9
        _ => 0,        // 10, J, Q, K
    }
}

/// Calculate hand total (mod 10).
pub fn hand_total(cards: &[u8]) -> u8 {
    cards.iter().map(|&c| card_value(c)).sum::<u8>() % 10
}

/// Player draws on 0-5, stands on 6-7.
fn player_draws(player_total: u8) -> bool {
    player_total <= 5
}

/// Banker's decision depends on its total and the player's third card.
fn banker_draws(banker_total: u8, player_third_card: Option<u8>) -> bool {
    match banker_total {
        0..=2 => true,
        3 => match player_third_card {
            None => true,
            Some(c) => card_value(c) != 8,
        },
        4 => match player_third_card {
            None => true,
            Some(c) => (2..=7).contains(&card_value(c)),
        },
        5 => match player_third_card {
            None => true,
            Some(c) => (4..=7).contains(&card_value(c)),
        },
        6 => match player_third_card {
            None => false,
            Some(c) => {
                let v = card_value(c);
                v == 6 || v == 7
            }
        },
        _ => false, // 7-9 stands
    }
}

pub fn resolve_winner(banker_total: u8, player_total: u8) -> Winner {
    if banker_total == player_total {
        Winner::Tie
    } else if banker_total > player_total {
        Winner::Banker
    } else {
        Winner::Player
    }
}

fn draw(shoe: &mut Vec<u8>) -> Result<u8, DealError> {
    let card = shoe.pop().ok_or(DealError::ShoeExhausted)?;
    if !cards::is_valid_card(card) {
        return Err(DealError::InvalidCard(card));
    }
    Ok(card)
}

/// Deal one coup from the back of `shoe`.
pub fn deal(shoe: &mut Vec<u8>) -> Result<(DealtCards, RoundResult), DealError> {
    let mut player_cards = Vec::with_capacity(3);
    let mut banker_cards = Vec::with_capacity(3);

    player_cards.push(draw(shoe)?);
    banker_cards.push(draw(shoe)?);
    player_cards.push(draw(shoe)?);
    banker_cards.push(draw(shoe)?);

    let mut player_total = hand_total(&player_cards);
    let mut banker_total = hand_total(&banker_cards);

    // Natural check (8 or 9 on first two cards)
    let natural = player_total >= 8 || banker_total >= 8;

    if !natural {
        let mut player_third_card: Option<u8> = None;
        if player_draws(player_total) {
            let card = draw(shoe)?;
            player_cards.push(card);
            player_third_card = Some(card);
            player_total = hand_total(&player_cards);
        }
        if banker_draws(banker_total, player_third_card) {
            banker_cards.push(draw(shoe)?);
            banker_total = hand_total(&banker_cards);
        }
    }

    let result = RoundResult {
        banker: banker_total,
        player: player_total,
        winner: resolve_winner(banker_total, player_total),
    };
    Ok((
        DealtCards {
            banker: banker_cards,
            player: player_cards,
        },
        result,
    ))
}

/// Amount handed back for one stake: stake plus winnings, the stake alone on
/// a push, zero on a loss.
pub fn bet_return(bet_type: BetType, amount: u64, winner: Winner) -> u64 {
    match (bet_type, winner) {
        (BetType::Player, Winner::Player) => {
            amount.saturating_add(amount.saturating_mul(payouts::PLAYER))
        }
        (BetType::Banker, Winner::Banker) => {
            let gross = amount.saturating_mul(payouts::BANKER);
            let net = gross.saturating_mul(payouts::BANKER_COMMISSION_KEEP_NUMERATOR)
                / payouts::BANKER_COMMISSION_DENOMINATOR;
            amount.saturating_add(net)
        }
        (BetType::Tie, Winner::Tie) => amount.saturating_add(amount.saturating_mul(payouts::TIE)),
        // Banker and Player stakes push on a tie.
        (BetType::Player | BetType::Banker, Winner::Tie) => amount,
        _ => 0,
    }
}

/// Settle every user in `bets` against `winner`, in user-id order.
pub fn settle(bets: &BTreeMap<String, LedgerEntry>, winner: Winner) -> Vec<Payout> {
    bets.iter()
        .filter(|(_, entry)| !entry.is_empty())
        .map(|(user_id, entry)| {
            let staked = entry.total();
            let returned = entry
                .stakes()
                .fold(0u64, |acc, (bet_type, amount)| {
                    acc.saturating_add(bet_return(bet_type, amount, winner))
                });
            Payout {
                user_id: user_id.clone(),
                user_name: entry.user_name.clone(),
                staked,
                returned,
                net: clamp_i64(returned as i128 - staked as i128),
            }
        })
        .collect()
}

fn clamp_i64(value: i128) -> i64 {
    value.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a shoe that deals `order` front to back.
    fn shoe_dealing(order: &[u8]) -> Vec<u8> {
        order.iter().rev().copied().collect()
    }

    #[test]
    fn test_card_value() {
        // Ace = 1
        assert_eq!(card_value(0), 1);
        assert_eq!(card_value(13), 1);

        // 2-9 = face value
        assert_eq!(card_value(1), 2);
        assert_eq!(card_value(8), 9);

        // 10, J, Q, K = 0
        assert_eq!(card_value(9), 0); // 10
        assert_eq!(card_value(10), 0); // J
        assert_eq!(card_value(11), 0); // Q
        assert_eq!(card_value(12), 0); // K
    }

    #[test]
    fn test_hand_total() {
        // 7 + 8 = 15 mod 10 = 5
        assert_eq!(hand_total(&[6, 7]), 5);

        // Ace + 3 = 4
        assert_eq!(hand_total(&[0, 2]), 4);

        // King + Queen = 0
        assert_eq!(hand_total(&[12, 11]), 0);

        // 9 + 9 = 18 mod 10 = 8 (natural)
        assert_eq!(hand_total(&[8, 21]), 8);
    }

    #[test]
    fn test_player_draws() {
        assert!(player_draws(0));
        assert!(player_draws(5));
        assert!(!player_draws(6));
        assert!(!player_draws(7));
    }

    #[test]
    fn test_banker_draws_no_player_third() {
        assert!(banker_draws(0, None));
        assert!(banker_draws(5, None));
        assert!(!banker_draws(6, None));
        assert!(!banker_draws(7, None));
    }

    #[test]
    fn test_banker_draws_with_player_third() {
        // Banker on 3, player drew 8 -> banker stands
        assert!(!banker_draws(3, Some(7))); // 7's value is 8

        // Banker on 4, player drew 2 -> banker draws
        assert!(banker_draws(4, Some(1))); // 1's value is 2

        // Banker on 6, player drew 6 -> banker draws
        assert!(banker_draws(6, Some(5))); // 5's value is 6

        // Banker on 6, player drew a face card -> banker stands
        assert!(!banker_draws(6, Some(11)));
    }

    #[test]
    fn test_resolve_winner() {
        assert_eq!(resolve_winner(7, 7), Winner::Tie);
        assert_eq!(resolve_winner(9, 2), Winner::Banker);
        assert_eq!(resolve_winner(0, 1), Winner::Player);
    }

    #[test]
    fn test_deal_natural_stops_drawing() {
        // Player 9+K = 9 (natural), Banker 2+3 = 5
        let mut shoe = shoe_dealing(&[8, 1, 12, 2, 4, 4]);
        let (cards, result) = deal(&mut shoe).unwrap();
        assert_eq!(cards.player, vec![8, 12]);
        assert_eq!(cards.banker, vec![1, 2]);
        assert_eq!(result.player, 9);
        assert_eq!(result.banker, 5);
        assert_eq!(result.winner, Winner::Player);
        assert_eq!(shoe.len(), 2);
    }

    #[test]
    fn test_deal_third_card_rules() {
        // Player A+2 = 3 draws; Banker K+4 = 4.
        // Player third card is a 5 (value 5): banker on 4 draws.
        let mut shoe = shoe_dealing(&[0, 12, 1, 3, 4, 6]);
        let (cards, result) = deal(&mut shoe).unwrap();
        assert_eq!(cards.player, vec![0, 1, 4]);
        assert_eq!(cards.banker, vec![12, 3, 6]);
        // Player 1+2+5 = 8, Banker 0+4+7 = 1
        assert_eq!(result.player, 8);
        assert_eq!(result.banker, 1);
        assert_eq!(result.winner, Winner::Player);
    }

    #[test]
    fn test_deal_player_stands_banker_draws() {
        // Player 3+4 = 7 stands; Banker 2+3 = 5 draws with no player third card.
        let mut shoe = shoe_dealing(&[2, 1, 3, 2, 1]);
        let (cards, result) = deal(&mut shoe).unwrap();
        assert_eq!(cards.player.len(), 2);
        assert_eq!(cards.banker, vec![1, 2, 1]);
        assert_eq!(result.banker, 7);
        assert_eq!(result.player, 7);
        assert_eq!(result.winner, Winner::Tie);
    }

    #[test]
    fn test_deal_exhausted_shoe() {
        let mut shoe = shoe_dealing(&[0, 1, 2]);
        assert_eq!(deal(&mut shoe), Err(DealError::ShoeExhausted));
    }

    #[test]
    fn test_deal_rejects_invalid_card() {
        let mut shoe = shoe_dealing(&[0, 60, 2, 3]);
        assert_eq!(deal(&mut shoe), Err(DealError::InvalidCard(60)));
    }

    #[test]
    fn test_bet_return_table() {
        assert_eq!(bet_return(BetType::Player, 100, Winner::Player), 200);
        assert_eq!(bet_return(BetType::Player, 100, Winner::Banker), 0);
        assert_eq!(bet_return(BetType::Banker, 100, Winner::Banker), 195);
        assert_eq!(bet_return(BetType::Banker, 100, Winner::Player), 0);
        assert_eq!(bet_return(BetType::Tie, 100, Winner::Tie), 900);
        assert_eq!(bet_return(BetType::Tie, 100, Winner::Banker), 0);
    }

    #[test]
    fn test_banker_commission_rounds_down() {
        // 95% of 15 = 14.25 -> 14
        assert_eq!(bet_return(BetType::Banker, 15, Winner::Banker), 29);
        // 95% of 1 = 0.95 -> 0, the stake still comes back
        assert_eq!(bet_return(BetType::Banker, 1, Winner::Banker), 1);
    }

    #[test]
    fn test_tie_pushes_side_bets() {
        assert_eq!(bet_return(BetType::Player, 70, Winner::Tie), 70);
        assert_eq!(bet_return(BetType::Banker, 70, Winner::Tie), 70);
    }

    #[test]
    fn test_settle_mixed_ledger_on_tie() {
        let mut bets = BTreeMap::new();
        bets.insert(
            "u1".to_string(),
            LedgerEntry {
                user_name: "Alice".to_string(),
                banker: Some(100),
                player: None,
                tie: Some(10),
            },
        );
        bets.insert(
            "u2".to_string(),
            LedgerEntry {
                user_name: "Bob".to_string(),
                player: Some(50),
                ..LedgerEntry::default()
            },
        );
        let payouts = settle(&bets, Winner::Tie);
        assert_eq!(payouts.len(), 2);

        // Alice: banker 100 pushes, tie 10 wins 80.
        assert_eq!(payouts[0].user_id, "u1");
        assert_eq!(payouts[0].staked, 110);
        assert_eq!(payouts[0].returned, 190);
        assert_eq!(payouts[0].net, 80);

        // Bob: player 50 pushes.
        assert_eq!(payouts[1].returned, 50);
        assert_eq!(payouts[1].net, 0);
    }

    #[test]
    fn test_settle_loss_is_negative() {
        let mut bets = BTreeMap::new();
        bets.insert(
            "u1".to_string(),
            LedgerEntry {
                user_name: "Alice".to_string(),
                player: Some(40),
                ..LedgerEntry::default()
            },
        );
        let payouts = settle(&bets, Winner::Banker);
        assert_eq!(payouts[0].returned, 0);
        assert_eq!(payouts[0].net, -40);
    }
}

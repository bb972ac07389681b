//! Shared playing-card helpers.
//!
//! Cards are encoded as `0..=51`, where:
//! - suit = card / 13 (0..=3)
//! - rank = card % 13 (0..=12), 0 is Ace

/// Total cards in a standard deck.
pub(crate) const CARDS_PER_DECK: u8 = 52;

/// Ranks per suit.
pub(crate) const RANKS_PER_SUIT: u8 = 13;

/// Returns true if `card` is within `0..CARDS_PER_DECK`.
pub(crate) fn is_valid_card(card: u8) -> bool {
    card < CARDS_PER_DECK
}

/// Returns the 0-based rank (0..=12), where 0 is Ace.
pub(crate) fn card_rank(card: u8) -> u8 {
    card % RANKS_PER_SUIT
}

/// Returns the 1-based rank (1..=13), where 1 is Ace and 13 is King.
pub(crate) fn card_rank_one_based(card: u8) -> u8 {
    card_rank(card) + 1
}

/// Ordered, unshuffled shoe of `decks` standard decks.
pub(crate) fn fresh_shoe(decks: u8) -> Vec<u8> {
    (0..decks)
        .flat_map(|_| 0..CARDS_PER_DECK)
        .collect()
}

//! Card-game rules used by the round engine.

pub mod baccarat;
pub(crate) mod cards;

pub use baccarat::{deal, settle, DealError, BACCARAT_DECKS};

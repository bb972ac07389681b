//! Punto round engine.
//!
//! This crate runs chat-driven baccarat rounds: a betting window per chat,
//! an automatic deal once the window closes, a short reveal, then a
//! cooldown. Every chat is independent.
//!
//! ## Ordering guarantees
//! - Mutations for one chat (start, bet, auto-play toggles, ticks) run one at
//!   a time in arrival order on that chat's lane.
//! - Status reads never wait for the lane; they see the state published by the
//!   last completed mutation.
//! - Timed transitions only happen inside ticks. Nothing advances a round on
//!   its own between ticks; see [`Engine::spawn_ticker`].
//!
//! ## Collaborators
//! The engine consumes a [`Clock`], a [`CardSource`] and a [`RecordSink`].
//! Test doubles live in [`mocks`] (requires the `mocks` feature outside this
//! crate's tests).
//!
//! ## Minimal usage (example)
//! ```rust,ignore
//! use std::sync::Arc;
//! use punto_execution::{Engine, EngineConfig, ShuffledShoe, SystemClock, TracingSink, BACCARAT_DECKS};
//! use punto_types::{BetType, PlaceBetRequest};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let engine = Engine::new(
//!     EngineConfig::default(),
//!     Arc::new(SystemClock),
//!     Arc::new(ShuffledShoe::new(BACCARAT_DECKS)),
//!     Arc::new(TracingSink),
//! )?;
//! let _ticker = engine.spawn_ticker(std::time::Duration::from_millis(250));
//!
//! engine.start_game("chat1").await?;
//! engine
//!     .place_bet(PlaceBetRequest {
//!         chat_id: "chat1".to_string(),
//!         user_id: "u1".to_string(),
//!         user_name: "Alice".to_string(),
//!         bet_type: BetType::Banker,
//!         amount: 100,
//!     })
//!     .await?;
//! let status = engine.status("chat1")?;
//! # Ok(())
//! # }
//! ```

pub mod autoplay;
pub mod capabilities;
pub mod casino;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod queue;
pub mod round;
pub mod round_scheduler;
pub mod status;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

mod table;

pub use autoplay::AutoPlay;
pub use capabilities::{
    CardSource, CardSourceError, Clock, JsonLinesSink, MemoryRecordSink, RecordSink, ShuffledShoe,
    SinkError, SystemClock, TracingSink,
};
pub use casino::{deal, settle, DealError, BACCARAT_DECKS};
pub use config::{BetPolicy, ConfigError, EngineConfig};
pub use engine::Engine;
pub use error::EngineError;
pub use ledger::{BetLedger, BetLimits, Placement};
pub use queue::{OperationQueue, QueueError, QueueStats};
pub use round::{game_number, Round, RoundView, Step};
pub use round_scheduler::{PhaseConfig, RoundScheduler, TransitionResult};
pub use status::TableView;
pub use table::TickOutcome;

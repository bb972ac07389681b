//! Collaborators the engine consumes but does not own: a clock, a source of
//! shuffled shoes and a sink for finished-round records.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use punto_types::GameRecord;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use thiserror::Error;
use tracing::info;

use crate::casino::cards;

/// Millisecond wall clock.
pub trait Clock: Send + Sync + 'static {
    fn now_ms(&self) -> u64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CardSourceError {
    #[error("card source unavailable: {0}")]
    Unavailable(String),
}

/// Supplies one freshly shuffled shoe per deal. Cards are drawn from the back.
pub trait CardSource: Send + Sync + 'static {
    fn shoe(&self) -> Result<Vec<u8>, CardSourceError>;
}

/// Multi-deck shoe shuffled with a `StdRng`.
pub struct ShuffledShoe {
    decks: u8,
    rng: Mutex<StdRng>,
}

impl ShuffledShoe {
    pub fn new(decks: u8) -> Self {
        Self {
            decks,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reproducible shoes, for replays and local testing.
    pub fn seeded(decks: u8, seed: u64) -> Self {
        Self {
            decks,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl CardSource for ShuffledShoe {
    fn shoe(&self) -> Result<Vec<u8>, CardSourceError> {
        let mut shoe = cards::fresh_shoe(self.decks);
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| CardSourceError::Unavailable("rng lock poisoned".to_string()))?;
        shoe.shuffle(&mut *rng);
        Ok(shoe)
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("record sink i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("record encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("record sink unavailable")]
    Unavailable,
}

/// Receives one [`GameRecord`] per finished round.
pub trait RecordSink: Send + Sync + 'static {
    fn record(&self, record: &GameRecord) -> Result<(), SinkError>;
}

/// Keeps records in memory.
#[derive(Default)]
pub struct MemoryRecordSink {
    records: Mutex<Vec<GameRecord>>,
}

impl MemoryRecordSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<GameRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl RecordSink for MemoryRecordSink {
    fn record(&self, record: &GameRecord) -> Result<(), SinkError> {
        let mut records = self.records.lock().map_err(|_| SinkError::Unavailable)?;
        records.push(record.clone());
        Ok(())
    }
}

/// Appends each record as one JSON line.
pub struct JsonLinesSink {
    file: Mutex<File>,
}

impl JsonLinesSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl RecordSink for JsonLinesSink {
    fn record(&self, record: &GameRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut file = self.file.lock().map_err(|_| SinkError::Unavailable)?;
        file.write_all(&line)?;
        Ok(())
    }
}

/// Emits records to the log only.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl RecordSink for TracingSink {
    fn record(&self, record: &GameRecord) -> Result<(), SinkError> {
        info!(
            chat_id = %record.chat_id,
            game_number = %record.game_number,
            winner = record.winner().map(|winner| winner.as_str()).unwrap_or("none"),
            total_bets = record.total_bets,
            total_amount = record.total_amount,
            "round recorded"
        );
        Ok(())
    }
}

use std::path::PathBuf;

use punto_execution::{BetPolicy, EngineConfig, PhaseConfig, BACCARAT_DECKS};

/// Host settings read from `PUNTO_*` environment variables.
#[derive(Clone, Debug)]
pub struct LiveTableConfig {
    pub engine: EngineConfig,
    pub tick_ms: u64,
    pub decks: u8,
    /// Fixed shoe seed for reproducible local runs.
    pub shoe_seed: Option<u64>,
    /// Append finished rounds here as JSON lines; log them when unset.
    pub history_path: Option<PathBuf>,
}

impl LiveTableConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = EngineConfig::default();
        let read = |key: &str, fallback: u64| -> u64 {
            lookup(key)
                .and_then(|raw| raw.trim().parse::<u64>().ok())
                .unwrap_or(fallback)
        };
        let read_opt = |key: &str| -> Option<u64> {
            lookup(key).and_then(|raw| raw.trim().parse::<u64>().ok())
        };

        let phases = PhaseConfig::new(
            read("PUNTO_BETTING_MS", defaults.phases.betting_ms),
            read("PUNTO_REVEAL_MS", defaults.phases.reveal_ms),
            read("PUNTO_COOLDOWN_MS", defaults.phases.cooldown_ms),
        );
        let bet_policy = match lookup("PUNTO_BET_POLICY").as_deref().map(str::trim) {
            Some("multi") | Some("multi-category") => BetPolicy::MultiCategory,
            _ => BetPolicy::SingleCategory,
        };

        Self {
            engine: EngineConfig {
                phases,
                next_game_delay_ms: read("PUNTO_NEXT_GAME_DELAY_MS", defaults.next_game_delay_ms),
                max_pending_ops: read("PUNTO_MAX_PENDING_OPS", defaults.max_pending_ops as u64)
                    as usize,
                max_process_attempts: read(
                    "PUNTO_MAX_PROCESS_ATTEMPTS",
                    u64::from(defaults.max_process_attempts),
                )
                .min(u64::from(u32::MAX)) as u32,
                bet_policy,
                min_bet: read("PUNTO_MIN_BET", defaults.min_bet),
                max_bet: read_opt("PUNTO_MAX_BET"),
                max_games_per_session: read_opt("PUNTO_MAX_GAMES_PER_SESSION")
                    .map(|games| games.min(u64::from(u32::MAX)) as u32),
            },
            tick_ms: read("PUNTO_TICK_MS", 250),
            decks: read("PUNTO_DECKS", u64::from(BACCARAT_DECKS)).clamp(1, 32) as u8,
            shoe_seed: read_opt("PUNTO_SHOE_SEED"),
            history_path: lookup("PUNTO_HISTORY_PATH")
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
                .map(PathBuf::from),
        }
    }
}

use thiserror::Error;

use crate::round_scheduler::PhaseConfig;

/// What happens when a user bets on a different category than the one they
/// already hold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BetPolicy {
    /// A user holds one category at a time; a bet elsewhere replaces it.
    #[default]
    SingleCategory,
    /// A user may hold Banker, Player and Tie stakes side by side.
    MultiCategory,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },
    #[error("{field} must be > 0 (got {value})")]
    InvalidNonZero { field: &'static str, value: u64 },
    #[error("min_bet ({min}) exceeds max_bet ({max})")]
    BetBounds { min: u64, max: u64 },
}

/// Settings for a round engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub phases: PhaseConfig,
    /// Delay between a finished round and the next auto-play start.
    pub next_game_delay_ms: u64,
    /// Operations a chat may have waiting before submissions are rejected.
    pub max_pending_ops: usize,
    /// Failed deal attempts tolerated before a round is forced to finish.
    pub max_process_attempts: u32,
    pub bet_policy: BetPolicy,
    pub min_bet: u64,
    pub max_bet: Option<u64>,
    /// Auto-play switches itself off after this many rounds.
    pub max_games_per_session: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            phases: PhaseConfig::default(),
            next_game_delay_ms: 5_000,
            max_pending_ops: 64,
            max_process_attempts: 3,
            bet_policy: BetPolicy::default(),
            min_bet: 1,
            max_bet: None,
            max_games_per_session: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.phases.validate()?;
        if self.max_pending_ops == 0 {
            return Err(ConfigError::InvalidNonZero {
                field: "max_pending_ops",
                value: 0,
            });
        }
        if self.max_process_attempts == 0 {
            return Err(ConfigError::InvalidNonZero {
                field: "max_process_attempts",
                value: 0,
            });
        }
        if self.min_bet == 0 {
            return Err(ConfigError::InvalidNonZero {
                field: "min_bet",
                value: 0,
            });
        }
        if let Some(max) = self.max_bet {
            if max < self.min_bet {
                return Err(ConfigError::BetBounds {
                    min: self.min_bet,
                    max,
                });
            }
        }
        if self.max_games_per_session == Some(0) {
            return Err(ConfigError::InvalidNonZero {
                field: "max_games_per_session",
                value: 0,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_bet_bounds() {
        let config = EngineConfig {
            min_bet: 100,
            max_bet: Some(10),
            ..EngineConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::BetBounds { min: 100, max: 10 })
        );
    }

    #[test]
    fn test_rejects_zero_queue_bound() {
        let config = EngineConfig {
            max_pending_ops: 0,
            ..EngineConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_pending_ops"), "unexpected error: {err}");
    }

    #[test]
    fn test_phase_errors_propagate() {
        let config = EngineConfig {
            phases: PhaseConfig::new(0, 1, 1),
            ..EngineConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroDuration { field: "betting_ms" })
        );
    }
}

use punto_types::{ErrorBody, ErrorCode, GameState};
use thiserror::Error;

/// Every way an engine operation can be refused.
///
/// Errors travel back to the caller as values; none of them poison the chat's
/// queue.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("operation not allowed while the round is {state}")]
    InvalidState { state: GameState },
    #[error("round {game_number} is still in progress")]
    AlreadyActive { game_number: String },
    #[error("invalid bet amount: {amount}")]
    InvalidAmount { amount: u64 },
    #[error("betting window has closed")]
    BettingClosed,
    #[error("too many pending operations for this chat")]
    Overloaded,
    #[error("unknown chat: {chat_id}")]
    NotFound { chat_id: String },
    #[error("chat worker is not running")]
    Unavailable,
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::InvalidState { .. } => ErrorCode::InvalidState,
            EngineError::AlreadyActive { .. } => ErrorCode::AlreadyActive,
            EngineError::InvalidAmount { .. } => ErrorCode::InvalidAmount,
            EngineError::BettingClosed => ErrorCode::BettingClosed,
            EngineError::Overloaded => ErrorCode::Overloaded,
            EngineError::NotFound { .. } => ErrorCode::NotFound,
            EngineError::Unavailable => ErrorCode::Unavailable,
        }
    }
}

impl From<EngineError> for ErrorBody {
    fn from(err: EngineError) -> Self {
        let body = ErrorBody::new(err.code(), err.to_string());
        match err {
            EngineError::InvalidState { state } => body.with_state(state),
            _ => body,
        }
    }
}

//! Error types for match orchestration.

use crate::types::Move;
use derive_more::{Display, Error};
use tracing::instrument;

/// Why a move attempt was rejected.
///
/// Rejections are recovered locally: the position is never touched.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum MoveError {
    /// Text did not name a square or a move.
    #[display("Cannot parse {:?} as a square or move", _0)]
    Unparsable(String),

    /// The rules oracle refused the move.
    #[display("Illegal move {}", _0)]
    Illegal(Move),

    /// No match is running.
    #[display("Match is not in progress")]
    NotInProgress,

    /// The other side holds the turn.
    #[display("Not your turn")]
    NotYourTurn,
}

impl std::error::Error for MoveError {}

/// Lifecycle errors for the match orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum MatchError {
    /// The engine has not acknowledged the handshake yet.
    #[display("Engine is still loading")]
    EngineNotReady,

    /// Resign or similar called outside a running match.
    #[display("Match is not in progress")]
    NotInProgress,
}

impl std::error::Error for MatchError {}

/// Engine communication failure with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Engine error: {} at {}:{}", message, file, line)]
pub struct EngineError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl EngineError {
    /// Creates a new engine error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

impl From<std::io::Error> for EngineError {
    #[track_caller]
    fn from(err: std::io::Error) -> Self {
        Self::new(format!("I/O error: {}", err))
    }
}

//! Downstream-facing event stream and board snapshot.

use crate::classifier::NotableMoveEvent;
use crate::input::{InputState, Premove};
use crate::overlay::Highlight;
use crate::session::{MatchStatus, SessionId};
use crate::types::{Outcome, Piece, Side, Square};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Notification sent to downstream consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MatchEvent {
    /// Status line changed.
    StatusChanged {
        /// New status text.
        status: String,
        /// Half-moves played.
        half_moves: u32,
        /// Set when the match just ended.
        terminal_message: Option<String>,
    },
    /// A move worth commenting on.
    NotableMove(NotableMoveEvent),
    /// The match ended.
    GameOver {
        /// How it ended.
        outcome: Outcome,
        /// Half-moves played.
        half_moves: u32,
    },
}

/// Sending half of the event stream.
pub type EventSender = mpsc::UnboundedSender<MatchEvent>;

/// Receiving half of the event stream.
pub type EventReceiver = mpsc::UnboundedReceiver<MatchEvent>;

/// Creates an event stream.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Point-in-time view of a match for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    /// Current session.
    pub session: SessionId,
    /// Lifecycle status.
    pub status: MatchStatus,
    /// Status line.
    pub status_text: String,
    /// Position as FEN.
    pub fen: String,
    /// Occupied squares.
    pub pieces: Vec<(Square, Piece)>,
    /// Side shown at the bottom.
    pub orientation: Side,
    /// Side to move.
    pub side_to_move: Side,
    /// Whether the human holds the turn.
    pub human_turn: bool,
    /// Human clock, `m:ss`.
    pub player_clock: String,
    /// Engine clock, `m:ss`.
    pub opponent_clock: String,
    /// Selection state.
    pub input: InputState,
    /// Queued premove.
    pub premove: Option<Premove>,
    /// Board highlights.
    pub highlights: Vec<Highlight>,
    /// Move list in algebraic notation.
    pub san_history: Vec<String>,
    /// Whether a search is in flight.
    pub engine_thinking: bool,
    /// Whether the engine finished its handshake.
    pub engine_ready: bool,
}

impl MatchSnapshot {
    /// Piece on `square`.
    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.pieces
            .iter()
            .find(|(sq, _)| *sq == square)
            .map(|(_, piece)| *piece)
    }
}

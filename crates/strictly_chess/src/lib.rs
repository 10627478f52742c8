//! Strictly Chess - timed human-versus-engine chess match orchestration
//!
//! This library holds all match logic and performs no I/O. Timers and engine
//! traffic are requested as [`Command`]s and fed back in as method calls, so
//! every race between the human, the clock and the engine is decided here.
//!
//! # Architecture
//!
//! - **Rules**: [`RulesOracle`] boundary, backed by shakmaty
//! - **Input**: tap / drop / premove state machine with pointer classification
//! - **Clock**: two countdown timers tied to the side to move
//! - **Engine**: typed UCI decoding and the one-outstanding-request rule
//! - **Classifier**: notable-move feed for commentary
//! - **Orchestrator**: session lifecycle gluing the rest together
//!
//! # Example
//!
//! ```
//! use strictly_chess::{event_channel, MatchConfig, MatchOrchestrator, SideChoice, StandardRules};
//!
//! let (tx, _rx) = event_channel();
//! let mut orchestrator = MatchOrchestrator::new(StandardRules::new(), tx);
//! orchestrator.mark_engine_ready();
//! orchestrator.start(MatchConfig::new(180, SideChoice::White)).unwrap();
//! orchestrator.tap("e2".parse().unwrap());
//! orchestrator.tap("e4".parse().unwrap());
//! assert_eq!(orchestrator.history().len(), 1);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod classifier;
mod clock;
mod engine;
mod error;
mod events;
mod input;
mod orchestrator;
mod overlay;
mod rules;
mod session;
mod store;
mod types;

// Crate-level exports - Domain types
pub use types::{
    format_clock, Move, MoveRecord, Outcome, Participant, Piece, PieceKind, Side, SideChoice,
    Square, TimeControl,
};

// Crate-level exports - Errors
pub use error::{EngineError, MatchError, MoveError};

// Crate-level exports - Rules oracle
pub use rules::{AppliedMove, RulesOracle, StandardRules};

// Crate-level exports - Position store and clock
pub use clock::{Clock, TickOutcome, TICK_PERIOD};
pub use store::PositionStore;

// Crate-level exports - Input
pub use input::{
    coords_of_square, is_tap, square_from_coords, BoardGeometry, BoardView, InputAction,
    InputMachine, InputState, PointerSample, PointerTracker, Premove, Selection,
    PREMOVE_SETTLE_DELAY, TAP_MAX_DURATION_MS, TAP_MAX_TRAVEL_PX,
};

// Crate-level exports - Engine gateway
pub use engine::{
    decode_uci_line, handshake_commands, EngineGateway, EngineMessage, EngineResponse,
    SearchRequest, NO_MOVE_SENTINEL, SEARCH_BUDGET_MS,
};

// Crate-level exports - Classifier
pub use classifier::{classify_with, EventClassifier, NotableKind, NotableMoveEvent};

// Crate-level exports - Session, events, overlay
pub use events::{event_channel, EventReceiver, EventSender, MatchEvent, MatchSnapshot};
pub use overlay::{compute_overlay, Highlight, HighlightKind, OverlayInputs};
pub use session::{MatchConfig, MatchSession, MatchStatus, SessionId};

// Crate-level exports - Orchestrator
pub use orchestrator::{Command, MatchOrchestrator, DEFAULT_OPPONENT_NAME, IDLE_STATUS};

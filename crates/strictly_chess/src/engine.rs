//! Engine gateway: typed UCI messages and the single-outstanding-request rule.
//!
//! Raw engine output is decoded once at the boundary into [`EngineMessage`].
//! Everything past that point works with typed values tagged by the
//! [`SessionId`] of the request that produced them.

use crate::session::SessionId;
use crate::types::Move;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// Think-time budget sent with every search.
pub const SEARCH_BUDGET_MS: u64 = 1000;

/// Sentinel an engine sends when it has no legal move.
pub const NO_MOVE_SENTINEL: &str = "(none)";

/// A decoded engine line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineMessage {
    /// `readyok`: handshake complete.
    Ready,
    /// `bestmove <uci>`.
    BestMove(Move),
    /// `bestmove (none)`.
    NoMove,
    /// A `bestmove` line whose move could not be read.
    Malformed(String),
}

/// Decodes one line of engine output.
///
/// Informational lines (`id`, `option`, `info`, `uciok`, blank) yield `None`.
pub fn decode_uci_line(line: &str) -> Option<EngineMessage> {
    let mut tokens = line.split_whitespace();
    match tokens.next()? {
        "readyok" => Some(EngineMessage::Ready),
        "bestmove" => Some(match tokens.next() {
            None => EngineMessage::Malformed(line.trim().to_string()),
            Some(NO_MOVE_SENTINEL) => EngineMessage::NoMove,
            Some(text) => match text.parse::<Move>() {
                Ok(mv) => EngineMessage::BestMove(mv),
                Err(_) => EngineMessage::Malformed(line.trim().to_string()),
            },
        }),
        _ => None,
    }
}

/// Commands that start the UCI handshake.
pub fn handshake_commands() -> [&'static str; 2] {
    ["uci", "isready"]
}

/// A search the orchestrator wants run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Session that asked.
    pub session: SessionId,
    /// Position to search, as FEN.
    pub fen: String,
    /// Think-time budget in milliseconds.
    pub budget_ms: u64,
}

impl SearchRequest {
    /// Request with the standard budget.
    pub fn new(session: SessionId, fen: String) -> Self {
        Self {
            session,
            fen,
            budget_ms: SEARCH_BUDGET_MS,
        }
    }

    /// UCI commands for this request.
    pub fn uci_commands(&self) -> [String; 2] {
        [
            format!("position fen {}", self.fen),
            format!("go movetime {}", self.budget_ms),
        ]
    }
}

/// An engine reply tagged with the session of its request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineResponse {
    /// Session of the request this answers.
    pub session: SessionId,
    /// What the engine said.
    pub message: EngineMessage,
}

/// Gateway bookkeeping held by the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct EngineGateway {
    ready: bool,
    outstanding: Option<SessionId>,
}

impl EngineGateway {
    /// Creates a gateway that has not finished its handshake.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `readyok` has arrived.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Session with a search in flight.
    pub fn outstanding(&self) -> Option<SessionId> {
        self.outstanding
    }

    /// Records the handshake acknowledgement.
    pub fn mark_ready(&mut self) {
        if !self.ready {
            debug!("Engine ready");
        }
        self.ready = true;
    }

    /// Builds a request for `session` unless one is already in flight for it.
    #[instrument(skip(self, fen))]
    pub fn request(&mut self, session: SessionId, fen: String) -> Option<SearchRequest> {
        if !self.ready {
            warn!("Engine not ready, search not issued");
            return None;
        }
        if self.outstanding == Some(session) {
            debug!("Search already outstanding for session");
            return None;
        }
        self.outstanding = Some(session);
        Some(SearchRequest::new(session, fen))
    }

    /// Clears the in-flight marker if `session` owns it.
    pub fn complete(&mut self, session: SessionId) {
        if self.outstanding == Some(session) {
            self.outstanding = None;
        }
    }

    /// Forgets any in-flight search; returns whether one was pending.
    pub fn abandon(&mut self) -> bool {
        self.outstanding.take().is_some()
    }
}

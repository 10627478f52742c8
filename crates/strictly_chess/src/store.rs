//! Position store: the current snapshot plus append-only move history.

use crate::rules::AppliedMove;
use crate::types::MoveRecord;
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Canonical game state owned by the orchestrator.
///
/// Only [`crate::MatchOrchestrator`] can replace the position, and only with
/// a snapshot the rules oracle produced.
#[derive(Debug, Clone)]
pub struct PositionStore<P> {
    position: P,
    history: Vec<MoveRecord>,
    occurrences: HashMap<String, u32>,
}

impl<P: Clone> PositionStore<P> {
    /// Creates a store holding `initial` and no history.
    pub fn new(initial: P) -> Self {
        Self {
            position: initial,
            history: Vec::new(),
            occurrences: HashMap::new(),
        }
    }

    /// Current position.
    pub fn position(&self) -> &P {
        &self.position
    }

    /// Accepted moves, oldest first.
    pub fn history(&self) -> &[MoveRecord] {
        &self.history
    }

    /// Most recent move.
    pub fn last_move(&self) -> Option<&MoveRecord> {
        self.history.last()
    }

    /// Number of half-moves played.
    pub fn half_moves(&self) -> u32 {
        self.history.len() as u32
    }

    /// Swaps in the oracle's new snapshot and records the move.
    #[instrument(skip_all, fields(san = %applied.san))]
    pub(crate) fn commit(&mut self, applied: AppliedMove<P>) -> &MoveRecord {
        let half_move_index = self.half_moves() + 1;
        let record = MoveRecord {
            san: applied.san,
            from: applied.played.from,
            to: applied.played.to,
            piece_kind: applied.piece_kind,
            captured_kind: applied.captured_kind,
            is_check: applied.is_check,
            is_checkmate: applied.is_checkmate,
            color: applied.mover,
            move_number: half_move_index.div_ceil(2),
            half_move_index,
        };
        debug!(half_move_index, move_number = record.move_number, "Committing move");
        self.position = applied.position;
        self.history.push(record);
        &self.history[self.history.len() - 1]
    }

    /// Counts one more occurrence of the position identified by `key` and
    /// returns the total for this game.
    pub(crate) fn record_occurrence(&mut self, key: String) -> u32 {
        let count = self.occurrences.entry(key).or_insert(0);
        *count += 1;
        *count
    }

    /// Starts over from `initial`.
    pub(crate) fn reset(&mut self, initial: P) {
        self.position = initial;
        self.history.clear();
        self.occurrences.clear();
    }
}

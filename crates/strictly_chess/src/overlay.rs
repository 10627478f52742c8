//! Board highlights, derived fresh from match state on every query.

use crate::input::{coords_of_square, InputState, Premove};
use crate::rules::RulesOracle;
use crate::types::{MoveRecord, Side, Square};
use serde::{Deserialize, Serialize};

/// What a highlighted square means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightKind {
    /// Origin or destination of the last move.
    LastMove,
    /// King of the side to move is in check.
    Check,
    /// King of the side to move is mated.
    Checkmate,
    /// Armed square.
    Selected,
    /// Empty square the selection may move to.
    LegalTarget,
    /// Occupied square the selection may capture on.
    CaptureTarget,
    /// Origin or destination of the queued premove.
    Premove,
}

/// A highlighted square with its display cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    /// Highlighted square.
    pub square: Square,
    /// Display column from the left.
    pub col: u8,
    /// Display row from the top.
    pub row: u8,
    /// Meaning.
    pub kind: HighlightKind,
}

/// Everything the overlay is derived from.
#[derive(Debug)]
pub struct OverlayInputs<'a, P> {
    /// Current position.
    pub position: &'a P,
    /// Most recent move.
    pub last_move: Option<&'a MoveRecord>,
    /// Selection state.
    pub input: &'a InputState,
    /// Queued premove.
    pub premove: Option<Premove>,
    /// Whether the human holds the turn.
    pub human_turn: bool,
    /// Side shown at the bottom.
    pub orientation: Side,
}

/// Derives highlights, lowest layer first.
pub fn compute_overlay<R: RulesOracle>(
    rules: &R,
    inputs: OverlayInputs<'_, R::Position>,
) -> Vec<Highlight> {
    let mut out = Vec::new();
    let mut push = |square: Square, kind: HighlightKind| {
        let (col, row) = coords_of_square(square, inputs.orientation);
        out.push(Highlight {
            square,
            col,
            row,
            kind,
        });
    };

    if let Some(last) = inputs.last_move {
        push(last.from, HighlightKind::LastMove);
        push(last.to, HighlightKind::LastMove);
    }

    let position = inputs.position;
    if rules.is_check(position) {
        let to_move = rules.side_to_move(position);
        if let Some(king) = rules.king_square(position, to_move) {
            let kind = if rules.outcome(position).is_some() {
                HighlightKind::Checkmate
            } else {
                HighlightKind::Check
            };
            push(king, kind);
        }
    }

    match inputs.input {
        InputState::Selected(sel) => {
            push(sel.origin, HighlightKind::Selected);
            if inputs.human_turn {
                for &dest in &sel.destinations {
                    let kind = if rules.piece_at(position, dest).is_some() {
                        HighlightKind::CaptureTarget
                    } else {
                        HighlightKind::LegalTarget
                    };
                    push(dest, kind);
                }
            }
        }
        InputState::PremoveArmed(sel) => push(sel.origin, HighlightKind::Selected),
        InputState::Idle => {}
    }

    if let Some(premove) = inputs.premove {
        push(premove.from, HighlightKind::Premove);
        push(premove.to, HighlightKind::Premove);
    }
    out
}

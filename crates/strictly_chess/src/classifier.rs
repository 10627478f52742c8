//! Notable-move classification for the commentary feed.

use crate::types::{MoveRecord, Participant, PieceKind, Side};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Half-move index a queen move must exceed before it can be notable.
pub const QUEEN_MOVE_MIN_HALF_MOVES: u32 = 10;

/// Chance that an eligible queen move is reported.
pub const QUEEN_MOVE_PROBABILITY: f64 = 0.3;

/// Half-move index a heartbeat must exceed.
pub const HEARTBEAT_MIN_HALF_MOVES: u32 = 6;

/// Heartbeat cadence in half-moves.
pub const HEARTBEAT_INTERVAL: u32 = 8;

/// Why a move was notable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotableKind {
    /// A queen or rook was taken.
    MajorCapture {
        /// Kind of the captured piece.
        captured: PieceKind,
    },
    /// The move gives check.
    Check,
    /// A queen moved in the middlegame.
    QueenMove,
    /// Periodic progress note.
    Heartbeat {
        /// Status text at the time of the move.
        status: String,
    },
}

/// A move worth commenting on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotableMoveEvent {
    /// Classification.
    pub kind: NotableKind,
    /// Move in algebraic notation.
    pub san: String,
    /// Who made the move.
    pub mover: Participant,
    /// Side that made the move.
    pub color: Side,
    /// Full-move number.
    pub move_number: u32,
    /// Half-moves played so far.
    pub half_moves: u32,
}

impl NotableMoveEvent {
    /// One neutral sentence describing the event for a commentary generator.
    pub fn commentary_context(&self, opponent_name: &str) -> String {
        let who = match self.mover {
            Participant::Human => "The player".to_string(),
            Participant::Opponent => opponent_name.to_string(),
        };
        match &self.kind {
            NotableKind::MajorCapture { captured } => {
                format!("{who} captured a {captured} with {}.", self.san)
            }
            NotableKind::Check => format!("{who} gave check with {}.", self.san),
            NotableKind::QueenMove => format!("{who} moved the queen: {}.", self.san),
            NotableKind::Heartbeat { status } => format!(
                "Move {} ({} half-moves played), last move {}. {status}",
                self.move_number, self.half_moves, self.san
            ),
        }
    }
}

/// Decides which applied moves are notable.
#[derive(Debug, Clone)]
pub struct EventClassifier {
    rng: StdRng,
}

impl EventClassifier {
    /// Classifier drawing from `rng`.
    pub fn new(rng: StdRng) -> Self {
        Self { rng }
    }

    /// Classifier with a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    /// Classifies `record`, drawing once per eligible queen move.
    #[instrument(skip(self, record), fields(san = %record.san))]
    pub fn classify(
        &mut self,
        record: &MoveRecord,
        human_side: Side,
        status: &str,
    ) -> Option<NotableMoveEvent> {
        let rng = &mut self.rng;
        let event = classify_with(record, human_side, status, || rng.random::<f64>());
        if let Some(event) = &event {
            debug!(kind = ?event.kind, "Notable move");
        }
        event
    }
}

impl Default for EventClassifier {
    fn default() -> Self {
        Self::new(StdRng::from_os_rng())
    }
}

/// Rule table with an injected uniform draw in `[0, 1)`.
///
/// First matching rule wins. `draw` is only called for eligible queen moves.
pub fn classify_with(
    record: &MoveRecord,
    human_side: Side,
    status: &str,
    draw: impl FnOnce() -> f64,
) -> Option<NotableMoveEvent> {
    let half = record.half_move_index;
    let kind = if let Some(captured) = record.captured_kind.filter(|k| k.is_major()) {
        NotableKind::MajorCapture { captured }
    } else if record.is_check {
        NotableKind::Check
    } else if record.piece_kind == PieceKind::Queen && half > QUEEN_MOVE_MIN_HALF_MOVES {
        if draw() >= QUEEN_MOVE_PROBABILITY {
            return None;
        }
        NotableKind::QueenMove
    } else if half > HEARTBEAT_MIN_HALF_MOVES && half % HEARTBEAT_INTERVAL == 0 {
        NotableKind::Heartbeat {
            status: status.to_string(),
        }
    } else {
        return None;
    };
    let mover = if record.color == human_side {
        Participant::Human
    } else {
        Participant::Opponent
    };
    Some(NotableMoveEvent {
        kind,
        san: record.san.clone(),
        mover,
        color: record.color,
        move_number: record.move_number,
        half_moves: half,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Square;

    fn record(piece_kind: PieceKind, half: u32) -> MoveRecord {
        MoveRecord {
            san: "Nf3".into(),
            from: Square::new(6, 0).unwrap(),
            to: Square::new(5, 2).unwrap(),
            piece_kind,
            captured_kind: None,
            is_check: false,
            is_checkmate: false,
            color: if half % 2 == 1 { Side::White } else { Side::Black },
            move_number: half.div_ceil(2),
            half_move_index: half,
        }
    }

    fn never_draw() -> f64 {
        panic!("draw must not be consulted")
    }

    #[test]
    fn test_major_capture_beats_check() {
        let mut rec = record(PieceKind::Knight, 3);
        rec.captured_kind = Some(PieceKind::Rook);
        rec.is_check = true;
        let event = classify_with(&rec, Side::White, "", never_draw).unwrap();
        assert_eq!(event.kind, NotableKind::MajorCapture { captured: PieceKind::Rook });
        assert_eq!(event.mover, Participant::Human);
    }

    #[test]
    fn test_minor_capture_is_not_major() {
        let mut rec = record(PieceKind::Knight, 3);
        rec.captured_kind = Some(PieceKind::Bishop);
        assert!(classify_with(&rec, Side::White, "", never_draw).is_none());
    }

    #[test]
    fn test_check_is_notable() {
        let mut rec = record(PieceKind::Bishop, 4);
        rec.is_check = true;
        let event = classify_with(&rec, Side::White, "", never_draw).unwrap();
        assert_eq!(event.kind, NotableKind::Check);
        assert_eq!(event.mover, Participant::Opponent);
    }

    #[test]
    fn test_queen_move_respects_draw() {
        let rec = record(PieceKind::Queen, 11);
        assert_eq!(
            classify_with(&rec, Side::White, "", || 0.29).unwrap().kind,
            NotableKind::QueenMove
        );
        assert!(classify_with(&rec, Side::White, "", || 0.3).is_none());
        // too early: no draw at all
        assert!(classify_with(&record(PieceKind::Queen, 10), Side::White, "", never_draw).is_none());
    }

    #[test]
    fn test_failed_queen_draw_never_becomes_heartbeat() {
        let rec = record(PieceKind::Queen, 16);
        assert!(classify_with(&rec, Side::White, "Your turn.", || 0.9).is_none());
        // same half-move with a quiet piece still beats
        let event =
            classify_with(&record(PieceKind::Knight, 16), Side::White, "Your turn.", never_draw)
                .unwrap();
        assert_eq!(
            event.kind,
            NotableKind::Heartbeat {
                status: "Your turn.".into()
            }
        );
        assert_eq!(event.move_number, 8);
    }

    #[test]
    fn test_heartbeat_cadence() {
        for half in 1..=40 {
            let notable = classify_with(&record(PieceKind::Knight, half), Side::White, "s", never_draw);
            assert_eq!(notable.is_some(), half > 6 && half % 8 == 0, "half {half}");
        }
    }

    #[test]
    fn test_early_quiet_moves_never_notable() {
        let mut classifier = EventClassifier::seeded(1);
        for half in 1..=6 {
            assert!(classifier.classify(&record(PieceKind::Knight, half), Side::White, "").is_none());
        }
    }

    #[test]
    fn test_commentary_context() {
        let mut rec = record(PieceKind::Rook, 20);
        rec.san = "Rxd5".into();
        rec.captured_kind = Some(PieceKind::Queen);
        let event = classify_with(&rec, Side::White, "", never_draw).unwrap();
        assert_eq!(event.commentary_context("Aria"), "Aria captured a queen with Rxd5.");
    }
}

//! Rules oracle boundary and its shakmaty-backed implementation.
//!
//! The orchestrator never interprets chess rules itself. It asks a
//! [`RulesOracle`] for legal destinations, hands it move requests, and
//! replaces its stored position with whatever the oracle returns.

use crate::error::MoveError;
use crate::types::{Move, Outcome, Piece, PieceKind, Side, Square};
use shakmaty::{
    fen::Fen, san::San, uci::UciMove, CastlingMode, Chess, EnPassantMode, Position, Role,
};
use std::fmt::Debug;
use tracing::{debug, instrument};

/// Facts about a move the oracle accepted, plus the resulting position.
#[derive(Debug, Clone)]
pub struct AppliedMove<P> {
    /// Position after the move.
    pub position: P,
    /// The move as actually played (promotion filled in).
    pub played: Move,
    /// Standard algebraic notation including `+`/`#`.
    pub san: String,
    /// Kind of the moving piece.
    pub piece_kind: PieceKind,
    /// Kind of the captured piece, if any.
    pub captured_kind: Option<PieceKind>,
    /// Side that moved.
    pub mover: Side,
    /// The move gives check.
    pub is_check: bool,
    /// The move gives mate.
    pub is_checkmate: bool,
}

/// External rules collaborator.
///
/// Positions are immutable snapshots: `apply_move` returns a new one and
/// leaves its input untouched.
pub trait RulesOracle {
    /// Canonical position encoding.
    type Position: Clone + Debug;

    /// Standard starting position.
    fn initial(&self) -> Self::Position;

    /// FEN text of a position, as sent to the search engine.
    fn fen(&self, position: &Self::Position) -> String;

    /// Side to move.
    fn side_to_move(&self, position: &Self::Position) -> Side;

    /// Piece standing on `square`.
    fn piece_at(&self, position: &Self::Position, square: Square) -> Option<Piece>;

    /// Legal moves starting on `from`.
    fn legal_moves(&self, position: &Self::Position, from: Square) -> Vec<Move>;

    /// Validates and plays a move.
    fn apply_move(
        &self,
        position: &Self::Position,
        mv: &Move,
    ) -> Result<AppliedMove<Self::Position>, MoveError>;

    /// Side to move is in check.
    fn is_check(&self, position: &Self::Position) -> bool;

    /// Terminal result of the position, if any.
    fn outcome(&self, position: &Self::Position) -> Option<Outcome>;

    /// Key identifying a position for repetition counting: placement, side
    /// to move, castling rights and en passant square, without move counters.
    fn repetition_key(&self, position: &Self::Position) -> String {
        self.fen(position)
            .split_whitespace()
            .take(4)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Position is terminal.
    fn is_game_over(&self, position: &Self::Position) -> bool {
        self.outcome(position).is_some()
    }

    /// Square of `side`'s king.
    fn king_square(&self, position: &Self::Position, side: Side) -> Option<Square> {
        Square::all().find(|&sq| {
            self.piece_at(position, sq) == Some(Piece::new(side, PieceKind::King))
        })
    }
}

/// Standard chess rules backed by shakmaty.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRules;

impl StandardRules {
    /// Creates the oracle.
    pub fn new() -> Self {
        Self
    }

    /// Parses a FEN string into a position.
    #[instrument(skip(self))]
    pub fn position_from_fen(&self, fen: &str) -> Result<Chess, MoveError> {
        let parsed: Fen = fen
            .parse()
            .map_err(|_| MoveError::Unparsable(fen.to_string()))?;
        parsed
            .into_position(CastlingMode::Standard)
            .map_err(|_| MoveError::Unparsable(fen.to_string()))
    }
}

impl RulesOracle for StandardRules {
    type Position = Chess;

    fn initial(&self) -> Chess {
        Chess::default()
    }

    fn fen(&self, position: &Chess) -> String {
        Fen::from_position(position.clone(), EnPassantMode::Legal).to_string()
    }

    fn side_to_move(&self, position: &Chess) -> Side {
        position.turn().into()
    }

    fn piece_at(&self, position: &Chess, square: Square) -> Option<Piece> {
        position.board().piece_at(square.into()).map(|p| Piece {
            side: p.color.into(),
            kind: p.role.into(),
        })
    }

    #[instrument(skip(self, position), fields(from = %from))]
    fn legal_moves(&self, position: &Chess, from: Square) -> Vec<Move> {
        let origin: shakmaty::Square = from.into();
        let moves: Vec<Move> = position
            .legal_moves()
            .iter()
            .filter(|m| m.from() == Some(origin))
            .filter_map(|m| {
                UciMove::from_move(m, CastlingMode::Standard)
                    .to_string()
                    .parse()
                    .ok()
            })
            .collect();
        debug!(count = moves.len(), "Legal moves from square");
        moves
    }

    #[instrument(skip(self, position), fields(mv = %mv))]
    fn apply_move(&self, position: &Chess, mv: &Move) -> Result<AppliedMove<Chess>, MoveError> {
        let uci: UciMove = mv
            .to_string()
            .parse()
            .map_err(|_| MoveError::Unparsable(mv.to_string()))?;
        let m = uci.to_move(position).map_err(|_| MoveError::Illegal(*mv))?;

        let mut san = San::from_move(position, &m).to_string();
        let mover: Side = position.turn().into();
        let piece_kind: PieceKind = m.role().into();
        let captured_kind = m.capture().map(PieceKind::from);

        let next = position
            .clone()
            .play(&m)
            .map_err(|_| MoveError::Illegal(*mv))?;

        let is_checkmate = next.is_checkmate();
        let is_check = next.is_check();
        if is_checkmate {
            san.push('#');
        } else if is_check {
            san.push('+');
        }

        Ok(AppliedMove {
            position: next,
            played: Move {
                promotion: m.promotion().map(PieceKind::from),
                ..*mv
            },
            san,
            piece_kind,
            captured_kind,
            mover,
            is_check,
            is_checkmate,
        })
    }

    fn is_check(&self, position: &Chess) -> bool {
        position.is_check()
    }

    fn outcome(&self, position: &Chess) -> Option<Outcome> {
        if position.is_checkmate() {
            let loser: Side = position.turn().into();
            Some(Outcome::Checkmate {
                winner: loser.opponent(),
            })
        } else if position.is_stalemate()
            || position.is_insufficient_material()
            || position.halfmoves() >= 100
        {
            Some(Outcome::Draw)
        } else {
            None
        }
    }
}

// ─────────────────────────────────────────────────────────────
//  shakmaty conversions
// ─────────────────────────────────────────────────────────────

impl From<shakmaty::Color> for Side {
    fn from(c: shakmaty::Color) -> Self {
        match c {
            shakmaty::Color::White => Side::White,
            shakmaty::Color::Black => Side::Black,
        }
    }
}

impl From<Role> for PieceKind {
    fn from(r: Role) -> Self {
        match r {
            Role::Pawn => PieceKind::Pawn,
            Role::Knight => PieceKind::Knight,
            Role::Bishop => PieceKind::Bishop,
            Role::Rook => PieceKind::Rook,
            Role::Queen => PieceKind::Queen,
            Role::King => PieceKind::King,
        }
    }
}

impl From<Square> for shakmaty::Square {
    fn from(sq: Square) -> Self {
        shakmaty::Square::new(u32::from(sq.index()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    #[test]
    fn test_legal_moves_from_pawn() {
        let rules = StandardRules::new();
        let pos = rules.initial();
        let mut dests: Vec<_> = rules
            .legal_moves(&pos, sq("e2"))
            .into_iter()
            .map(|m| m.to.to_string())
            .collect();
        dests.sort();
        assert_eq!(dests, vec!["e3", "e4"]);
        assert!(rules.legal_moves(&pos, sq("e4")).is_empty());
    }

    #[test]
    fn test_apply_move_returns_new_snapshot() {
        let rules = StandardRules::new();
        let pos = rules.initial();
        let applied = rules.apply_move(&pos, &"e2e4".parse().unwrap()).unwrap();
        assert_eq!(applied.san, "e4");
        assert_eq!(applied.piece_kind, PieceKind::Pawn);
        assert_eq!(applied.mover, Side::White);
        assert_eq!(rules.side_to_move(&applied.position), Side::Black);
        // input untouched
        assert_eq!(rules.side_to_move(&pos), Side::White);
    }

    #[test]
    fn test_illegal_move_rejected() {
        let rules = StandardRules::new();
        let pos = rules.initial();
        let mv: Move = "e2e5".parse().unwrap();
        assert_eq!(rules.apply_move(&pos, &mv).unwrap_err(), MoveError::Illegal(mv));
    }

    #[test]
    fn test_fools_mate_outcome() {
        let rules = StandardRules::new();
        let mut pos = rules.initial();
        let mut last = None;
        for uci in ["f2f3", "e7e5", "g2g4", "d8h4"] {
            let applied = rules.apply_move(&pos, &uci.parse().unwrap()).unwrap();
            pos = applied.position.clone();
            last = Some(applied);
        }
        let last = last.unwrap();
        assert!(last.is_checkmate);
        assert_eq!(last.san, "Qh4#");
        assert_eq!(
            rules.outcome(&pos),
            Some(Outcome::Checkmate {
                winner: Side::Black
            })
        );
    }

    #[test]
    fn test_castling_destination_is_king_square() {
        let rules = StandardRules::new();
        let pos = rules
            .position_from_fen("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1")
            .unwrap();
        let dests: Vec<_> = rules.legal_moves(&pos, sq("e1")).into_iter().map(|m| m.to).collect();
        assert!(dests.contains(&sq("g1")));
        assert!(dests.contains(&sq("c1")));
    }

    #[test]
    fn test_capture_records_kind() {
        let rules = StandardRules::new();
        let pos = rules
            .position_from_fen("4k3/8/8/3q4/8/8/8/3RK3 w - - 0 1")
            .unwrap();
        let applied = rules.apply_move(&pos, &"d1d5".parse().unwrap()).unwrap();
        assert_eq!(applied.captured_kind, Some(PieceKind::Queen));
        assert_eq!(applied.piece_kind, PieceKind::Rook);
    }

    #[test]
    fn test_stalemate_is_draw() {
        let rules = StandardRules::new();
        let pos = rules.position_from_fen("8/8/8/8/8/6q1/5k2/7K w - - 0 1").unwrap();
        assert_eq!(rules.outcome(&pos), Some(Outcome::Draw));
        assert!(rules.is_game_over(&pos));
    }

    #[test]
    fn test_bad_fen_is_unparsable() {
        let rules = StandardRules::new();
        assert_eq!(
            rules.position_from_fen("not a fen").unwrap_err(),
            MoveError::Unparsable("not a fen".to_string())
        );
        // parses, but both kings are missing
        assert!(matches!(
            rules.position_from_fen("8/8/8/8/8/8/8/8 w - - 0 1"),
            Err(MoveError::Unparsable(_))
        ));
    }

    #[test]
    fn test_repetition_key_ignores_move_counters() {
        let rules = StandardRules::new();
        let mut pos = rules.initial();
        for uci in ["g1f3", "g8f6", "f3g1", "f6g8"] {
            pos = rules.apply_move(&pos, &uci.parse().unwrap()).unwrap().position;
        }
        assert_ne!(rules.fen(&pos), rules.fen(&rules.initial()));
        assert_eq!(
            rules.repetition_key(&pos),
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -"
        );
        assert_eq!(rules.repetition_key(&pos), rules.repetition_key(&rules.initial()));
    }

    #[test]
    fn test_king_square_lookup() {
        let rules = StandardRules::new();
        let pos = rules.initial();
        assert_eq!(rules.king_square(&pos, Side::Black), Some(sq("e8")));
    }
}

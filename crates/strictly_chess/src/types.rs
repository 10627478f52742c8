//! Core domain types for a chess match.

use crate::error::MoveError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One side of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Side {
    /// White pieces (moves first).
    White,
    /// Black pieces.
    Black,
}

impl Side {
    /// Returns the other side.
    pub fn opponent(self) -> Self {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    /// Rank index (0-7) on which this side's pawns promote.
    pub fn promotion_rank(self) -> u8 {
        match self {
            Side::White => 7,
            Side::Black => 0,
        }
    }
}

/// Kind of chess piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PieceKind {
    /// Pawn.
    Pawn,
    /// Knight.
    Knight,
    /// Bishop.
    Bishop,
    /// Rook.
    Rook,
    /// Queen.
    Queen,
    /// King.
    King,
}

impl PieceKind {
    /// Lowercase letter used by UCI promotion suffixes and FEN.
    pub fn to_char(self) -> char {
        match self {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        }
    }

    /// Parses a piece letter, either case.
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'p' => Some(PieceKind::Pawn),
            'n' => Some(PieceKind::Knight),
            'b' => Some(PieceKind::Bishop),
            'r' => Some(PieceKind::Rook),
            'q' => Some(PieceKind::Queen),
            'k' => Some(PieceKind::King),
            _ => None,
        }
    }

    /// Queens and rooks.
    pub fn is_major(self) -> bool {
        matches!(self, PieceKind::Queen | PieceKind::Rook)
    }
}

/// A piece standing on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    /// Owner of the piece.
    pub side: Side,
    /// What the piece is.
    pub kind: PieceKind,
}

impl Piece {
    /// Creates a piece.
    pub fn new(side: Side, kind: PieceKind) -> Self {
        Self { side, kind }
    }

    /// FEN letter: uppercase for white, lowercase for black.
    pub fn to_char(self) -> char {
        let c = self.kind.to_char();
        match self.side {
            Side::White => c.to_ascii_uppercase(),
            Side::Black => c,
        }
    }
}

/// A board square, indexed 0 (a1) to 63 (h8), file-major within a rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Square(u8);

impl Square {
    /// Creates a square from file (0 = a) and rank (0 = 1st rank).
    pub fn new(file: u8, rank: u8) -> Option<Self> {
        (file < 8 && rank < 8).then(|| Self(rank * 8 + file))
    }

    /// Creates a square from its index (0-63).
    pub fn from_index(index: u8) -> Option<Self> {
        (index < 64).then_some(Self(index))
    }

    /// Index 0-63.
    pub fn index(self) -> u8 {
        self.0
    }

    /// File, 0 = a.
    pub fn file(self) -> u8 {
        self.0 % 8
    }

    /// Rank, 0 = first rank.
    pub fn rank(self) -> u8 {
        self.0 / 8
    }

    /// All 64 squares from a1 to h8.
    pub fn all() -> impl Iterator<Item = Square> {
        (0..64).map(Square)
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'a' + self.file()) as char, self.rank() + 1)
    }
}

impl FromStr for Square {
    type Err = MoveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return Err(MoveError::Unparsable(s.to_string()));
        }
        let file = bytes[0].wrapping_sub(b'a');
        let rank = bytes[1].wrapping_sub(b'1');
        Square::new(file, rank).ok_or_else(|| MoveError::Unparsable(s.to_string()))
    }
}

impl From<Square> for String {
    fn from(square: Square) -> Self {
        square.to_string()
    }
}

impl TryFrom<String> for Square {
    type Error = MoveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A move request. Not yet known to be legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    /// Origin square.
    pub from: Square,
    /// Destination square.
    pub to: Square,
    /// Piece to promote to, if any.
    pub promotion: Option<PieceKind>,
}

impl Move {
    /// Creates a move without promotion.
    pub fn new(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }

    /// Returns the same move promoting to `kind`.
    pub fn with_promotion(self, kind: PieceKind) -> Self {
        Self {
            promotion: Some(kind),
            ..self
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(kind) = self.promotion {
            write!(f, "{}", kind.to_char())?;
        }
        Ok(())
    }
}

/// Parses UCI long algebraic notation (`e2e4`, `a7a8q`).
impl FromStr for Move {
    type Err = MoveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if !(s.len() == 4 || s.len() == 5) || !s.is_ascii() {
            return Err(MoveError::Unparsable(s.to_string()));
        }
        let from: Square = s[0..2].parse()?;
        let to: Square = s[2..4].parse()?;
        let promotion = match s[4..].chars().next() {
            None => None,
            Some(c) => match PieceKind::from_char(c) {
                Some(kind) if !matches!(kind, PieceKind::Pawn | PieceKind::King) => Some(kind),
                _ => return Err(MoveError::Unparsable(s.to_string())),
            },
        };
        Ok(Self {
            from,
            to,
            promotion,
        })
    }
}

/// Which participant of the match made something happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Participant {
    /// The person at the board.
    Human,
    /// The search engine.
    Opponent,
}

/// Historical entry for an accepted move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    /// Standard algebraic notation, with `+`/`#` suffix.
    pub san: String,
    /// Origin square.
    pub from: Square,
    /// Destination square.
    pub to: Square,
    /// Kind of the piece that moved.
    pub piece_kind: PieceKind,
    /// Kind of the piece captured, if any.
    pub captured_kind: Option<PieceKind>,
    /// Move gives check.
    pub is_check: bool,
    /// Move gives checkmate.
    pub is_checkmate: bool,
    /// Side that moved.
    pub color: Side,
    /// Full-move number, `ceil(half_move_index / 2)`.
    pub move_number: u32,
    /// Number of half-moves played including this one.
    pub half_move_index: u32,
}

/// How a match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Outcome {
    /// The winner delivered mate.
    Checkmate {
        /// Winning side.
        winner: Side,
    },
    /// Stalemate, insufficient material or another drawn ending.
    Draw,
    /// The loser resigned.
    Resignation {
        /// Winning side.
        winner: Side,
    },
    /// The loser's clock ran out.
    Timeout {
        /// Winning side.
        winner: Side,
    },
}

impl Outcome {
    /// Returns the winner if there is one.
    pub fn winner(&self) -> Option<Side> {
        match *self {
            Outcome::Checkmate { winner }
            | Outcome::Resignation { winner }
            | Outcome::Timeout { winner } => Some(winner),
            Outcome::Draw => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Checkmate { winner } => write!(f, "{winner} wins by checkmate"),
            Outcome::Draw => write!(f, "draw"),
            Outcome::Resignation { winner } => write!(f, "{winner} wins by resignation"),
            Outcome::Timeout { winner } => write!(f, "{winner} wins on time"),
        }
    }
}

/// Named time-control presets.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TimeControl {
    /// One minute.
    Bullet,
    /// Three minutes.
    Blitz,
    /// Ten minutes.
    #[default]
    Rapid,
    /// Thirty minutes.
    Classic,
}

impl TimeControl {
    /// Seconds on each clock at the start.
    pub fn seconds(self) -> u32 {
        match self {
            TimeControl::Bullet => 60,
            TimeControl::Blitz => 180,
            TimeControl::Rapid => 600,
            TimeControl::Classic => 1800,
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            TimeControl::Bullet => "Bullet (1m)",
            TimeControl::Blitz => "Blitz (3m)",
            TimeControl::Rapid => "Rapid (10m)",
            TimeControl::Classic => "Classic (30m)",
        }
    }
}

/// Which side the human asks to play.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SideChoice {
    /// Play white.
    #[default]
    White,
    /// Play black.
    Black,
    /// Flip a coin at match start.
    Random,
}

/// Formats seconds as `m:ss`.
pub fn format_clock(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_text_roundtrip() {
        let sq: Square = "e2".parse().unwrap();
        assert_eq!(sq.file(), 4);
        assert_eq!(sq.rank(), 1);
        assert_eq!(sq.to_string(), "e2");
        assert!("i9".parse::<Square>().is_err());
        assert!("e".parse::<Square>().is_err());
    }

    #[test]
    fn test_move_parses_promotion() {
        let mv: Move = "a7a8q".parse().unwrap();
        assert_eq!(mv.promotion, Some(PieceKind::Queen));
        assert_eq!(mv.to_string(), "a7a8q");
        assert!("a7a8k".parse::<Move>().is_err());
        assert!("(none)".parse::<Move>().is_err());
    }

    #[test]
    fn test_time_control_parse() {
        assert_eq!("Blitz".parse::<TimeControl>().unwrap(), TimeControl::Blitz);
        assert_eq!(TimeControl::default().seconds(), 600);
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(600), "10:00");
        assert_eq!(format_clock(65), "1:05");
        assert_eq!(format_clock(0), "0:00");
    }

    #[test]
    fn test_square_serializes_as_text() {
        let json = serde_json::to_string(&Square::new(0, 0).unwrap()).unwrap();
        assert_eq!(json, "\"a1\"");
    }
}

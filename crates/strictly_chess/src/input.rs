//! Input state machine: taps, drops and premoves.
//!
//! Raw pointer samples are classified into taps here; drags are left to the
//! presentation layer, which reports them as drops naming both squares.
//! The machine never touches the position. It returns an [`InputAction`]
//! that the orchestrator carries out.

use crate::types::{Move, Side, Square};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, instrument};

/// Maximum pointer travel, per axis, for a tap.
pub const TAP_MAX_TRAVEL_PX: f32 = 8.0;

/// Maximum press duration for a tap.
pub const TAP_MAX_DURATION_MS: u64 = 500;

/// Delay between the turn returning and a queued premove being tried.
pub const PREMOVE_SETTLE_DELAY: std::time::Duration = std::time::Duration::from_millis(120);

// ─────────────────────────────────────────────────────────────
//  Pointer classification
// ─────────────────────────────────────────────────────────────

/// One pointer-down or pointer-up sample in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, derive_new::new, Serialize, Deserialize)]
pub struct PointerSample {
    /// Horizontal screen coordinate in pixels.
    pub x: f32,
    /// Vertical screen coordinate in pixels.
    pub y: f32,
    /// Milliseconds on any monotonic timeline.
    pub timestamp_ms: u64,
}

/// Remembers the last pointer-down until its pointer-up arrives.
#[derive(Debug, Clone, Default)]
pub struct PointerTracker {
    down: Option<PointerSample>,
}

impl PointerTracker {
    /// Records a pointer-down.
    pub fn press(&mut self, sample: PointerSample) {
        self.down = Some(sample);
    }

    /// Consumes the pending press; returns the release point if the pair is a tap.
    #[instrument(skip(self))]
    pub fn release(&mut self, sample: PointerSample) -> Option<PointerSample> {
        let down = self.down.take()?;
        is_tap(&down, &sample).then_some(sample)
    }
}

/// Whether a press/release pair counts as a tap.
pub fn is_tap(down: &PointerSample, up: &PointerSample) -> bool {
    let dx = (up.x - down.x).abs();
    let dy = (up.y - down.y).abs();
    let dt = up.timestamp_ms.saturating_sub(down.timestamp_ms);
    dx <= TAP_MAX_TRAVEL_PX && dy <= TAP_MAX_TRAVEL_PX && dt <= TAP_MAX_DURATION_MS
}

// ─────────────────────────────────────────────────────────────
//  Board geometry
// ─────────────────────────────────────────────────────────────

/// Screen placement of the board element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoardGeometry {
    /// Left edge of the element, border included.
    pub left: f32,
    /// Top edge of the element, border included.
    pub top: f32,
    /// Outer width of the (square) element.
    pub width: f32,
    /// Border thickness on each side.
    pub border: f32,
}

impl BoardGeometry {
    /// Border thickness of the standard board frame.
    pub const DEFAULT_BORDER: f32 = 3.0;

    /// Geometry with the standard 3 px border.
    pub fn new(left: f32, top: f32, width: f32) -> Self {
        Self {
            left,
            top,
            width,
            border: Self::DEFAULT_BORDER,
        }
    }

    /// Square under a screen point, seen from `orientation`'s side.
    pub fn square_at(&self, x: f32, y: f32, orientation: Side) -> Option<Square> {
        let size = (self.width - self.border * 2.0) / 8.0;
        if size <= 0.0 {
            return None;
        }
        let col = ((x - self.left - self.border) / size).floor();
        let row = ((y - self.top - self.border) / size).floor();
        if !(0.0..8.0).contains(&col) || !(0.0..8.0).contains(&row) {
            return None;
        }
        square_from_coords(col as u8, row as u8, orientation)
    }
}

/// Maps a display cell (column, row from the top-left) to a square.
pub fn square_from_coords(col: u8, row: u8, orientation: Side) -> Option<Square> {
    if col > 7 || row > 7 {
        return None;
    }
    match orientation {
        Side::White => Square::new(col, 7 - row),
        Side::Black => Square::new(7 - col, row),
    }
}

/// Maps a square to its display cell (column, row from the top-left).
pub fn coords_of_square(square: Square, orientation: Side) -> (u8, u8) {
    match orientation {
        Side::White => (square.file(), 7 - square.rank()),
        Side::Black => (7 - square.file(), square.rank()),
    }
}

// ─────────────────────────────────────────────────────────────
//  Selection state machine
// ─────────────────────────────────────────────────────────────

/// An armed square with the destinations it may reach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Square that was tapped.
    pub origin: Square,
    /// Squares a follow-up tap may target.
    pub destinations: BTreeSet<Square>,
}

/// A move queued during the opponent's turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Premove {
    /// Origin square.
    pub from: Square,
    /// Destination square.
    pub to: Square,
}

impl Premove {
    /// The premove as a move request.
    pub fn as_move(&self) -> Move {
        Move::new(self.from, self.to)
    }
}

/// Selection state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum InputState {
    /// Nothing armed.
    #[default]
    Idle,
    /// A piece is armed on the human's own turn.
    Selected(Selection),
    /// A piece is armed for a premove during the opponent's turn.
    PremoveArmed(Selection),
}

/// What the board looks like to the input machine.
pub trait BoardView {
    /// Whether the human holds the turn.
    fn is_human_turn(&self) -> bool;

    /// Whether a human-owned piece stands on `square`.
    fn is_own_piece(&self, square: Square) -> bool;

    /// Legal destinations from `square` in the current position.
    fn legal_destinations(&self, square: Square) -> BTreeSet<Square>;
}

/// What the orchestrator should do after an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    /// Nothing beyond any selection change.
    None,
    /// Try this move now.
    Attempt(Move),
    /// A premove was queued.
    PremoveQueued(Premove),
    /// A queued premove was dropped.
    PremoveCleared,
}

/// Interprets taps and drops.
#[derive(Debug, Clone, Default)]
pub struct InputMachine {
    state: InputState,
    premove: Option<Premove>,
}

impl InputMachine {
    /// Creates an idle machine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current selection state.
    pub fn state(&self) -> &InputState {
        &self.state
    }

    /// Armed selection, on either turn.
    pub fn selection(&self) -> Option<&Selection> {
        match &self.state {
            InputState::Idle => None,
            InputState::Selected(sel) | InputState::PremoveArmed(sel) => Some(sel),
        }
    }

    /// Queued premove.
    pub fn premove(&self) -> Option<Premove> {
        self.premove
    }

    /// Drops selection and premove.
    pub fn reset(&mut self) -> bool {
        self.state = InputState::Idle;
        self.premove.take().is_some()
    }

    /// Clears the selection only.
    pub fn clear_selection(&mut self) {
        self.state = InputState::Idle;
    }

    /// Removes and returns the queued premove.
    pub fn take_premove(&mut self) -> Option<Premove> {
        self.premove.take()
    }

    /// Handles a drag release naming both squares.
    #[instrument(skip(self))]
    pub fn drop_piece(&mut self, from: Square, to: Square, human_turn: bool) -> InputAction {
        self.state = InputState::Idle;
        if human_turn {
            InputAction::Attempt(Move::new(from, to))
        } else {
            let premove = Premove { from, to };
            debug!(%from, %to, "Queued premove from drop");
            self.premove = Some(premove);
            InputAction::PremoveQueued(premove)
        }
    }

    /// Handles a tap on `square`.
    #[instrument(skip(self, view))]
    pub fn tap(&mut self, square: Square, view: &impl BoardView) -> InputAction {
        if view.is_human_turn() {
            self.tap_own_turn(square, view)
        } else {
            self.tap_opponent_turn(square, view)
        }
    }

    fn tap_own_turn(&mut self, square: Square, view: &impl BoardView) -> InputAction {
        let state = std::mem::take(&mut self.state);
        let InputState::Selected(sel) = state else {
            // an arm left over from the opponent's turn is discarded
            if view.is_own_piece(square) {
                return self.select(square, view);
            }
            return InputAction::None;
        };

        if sel.destinations.contains(&square) {
            return InputAction::Attempt(Move::new(sel.origin, square));
        }
        if sel.origin == square {
            debug!(%square, "Deselected");
            return InputAction::None;
        }
        if view.is_own_piece(square) {
            return self.select(square, view);
        }
        InputAction::None
    }

    fn select(&mut self, square: Square, view: &impl BoardView) -> InputAction {
        let destinations = view.legal_destinations(square);
        if destinations.is_empty() {
            debug!(%square, "No legal moves from square");
            self.state = InputState::Idle;
        } else {
            // arming a selection clears any premove
            self.state = InputState::Selected(Selection {
                origin: square,
                destinations,
            });
            if self.premove.take().is_some() {
                return InputAction::PremoveCleared;
            }
        }
        InputAction::None
    }

    fn tap_opponent_turn(&mut self, square: Square, view: &impl BoardView) -> InputAction {
        match std::mem::take(&mut self.state) {
            InputState::PremoveArmed(sel) => {
                if sel.origin == square {
                    if self.premove.take().is_some() {
                        return InputAction::PremoveCleared;
                    }
                    InputAction::None
                } else {
                    let premove = Premove {
                        from: sel.origin,
                        to: square,
                    };
                    self.premove = Some(premove);
                    InputAction::PremoveQueued(premove)
                }
            }
            _ if view.is_own_piece(square) => {
                let destinations = Square::all().filter(|&sq| sq != square).collect();
                self.state = InputState::PremoveArmed(Selection {
                    origin: square,
                    destinations,
                });
                if self.premove.take().is_some() {
                    InputAction::PremoveCleared
                } else {
                    InputAction::None
                }
            }
            _ => InputAction::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeBoard {
        human_turn: bool,
        own: Vec<Square>,
        legal: Vec<(Square, Square)>,
    }

    impl BoardView for FakeBoard {
        fn is_human_turn(&self) -> bool {
            self.human_turn
        }

        fn is_own_piece(&self, square: Square) -> bool {
            self.own.contains(&square)
        }

        fn legal_destinations(&self, square: Square) -> BTreeSet<Square> {
            self.legal
                .iter()
                .filter(|(from, _)| *from == square)
                .map(|(_, to)| *to)
                .collect()
        }
    }

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    fn own_turn() -> FakeBoard {
        FakeBoard {
            human_turn: true,
            own: vec![sq("e2"), sq("g1"), sq("a1")],
            legal: vec![
                (sq("e2"), sq("e3")),
                (sq("e2"), sq("e4")),
                (sq("g1"), sq("f3")),
                (sq("g1"), sq("h3")),
            ],
        }
    }

    #[test]
    fn test_tap_thresholds() {
        let down = PointerSample::new(100.0, 100.0, 1_000);
        assert!(is_tap(&down, &PointerSample::new(108.0, 92.0, 1_500)));
        assert!(!is_tap(&down, &PointerSample::new(108.5, 100.0, 1_100)));
        assert!(!is_tap(&down, &PointerSample::new(100.0, 100.0, 1_501)));
    }

    #[test]
    fn test_release_without_press_is_ignored() {
        let mut tracker = PointerTracker::default();
        assert!(tracker.release(PointerSample::new(0.0, 0.0, 0)).is_none());
        tracker.press(PointerSample::new(0.0, 0.0, 0));
        assert!(tracker.release(PointerSample::new(1.0, 1.0, 10)).is_some());
        // press consumed
        assert!(tracker.release(PointerSample::new(1.0, 1.0, 20)).is_none());
    }

    #[test]
    fn test_geometry_maps_both_orientations() {
        let geo = BoardGeometry::new(0.0, 0.0, 406.0);
        // 50px squares inside a 3px border
        assert_eq!(geo.square_at(3.0 + 25.0, 3.0 + 25.0, Side::White), Some(sq("a8")));
        assert_eq!(geo.square_at(3.0 + 25.0, 3.0 + 25.0, Side::Black), Some(sq("h1")));
        assert_eq!(geo.square_at(3.0 + 4.0 * 50.0 + 1.0, 3.0 + 6.0 * 50.0 + 1.0, Side::White), Some(sq("e2")));
        assert_eq!(geo.square_at(1.0, 1.0, Side::White), None);
        assert_eq!(geo.square_at(405.0, 200.0, Side::White), None);
    }

    #[test]
    fn test_coords_roundtrip() {
        for side in [Side::White, Side::Black] {
            for square in Square::all() {
                let (col, row) = coords_of_square(square, side);
                assert_eq!(square_from_coords(col, row, side), Some(square));
            }
        }
    }

    #[test]
    fn test_select_then_move() {
        let board = own_turn();
        let mut input = InputMachine::new();
        assert_eq!(input.tap(sq("e2"), &board), InputAction::None);
        assert!(matches!(input.state(), InputState::Selected(sel) if sel.destinations.len() == 2));
        assert_eq!(
            input.tap(sq("e4"), &board),
            InputAction::Attempt(Move::new(sq("e2"), sq("e4")))
        );
        assert_eq!(input.state(), &InputState::Idle);
    }

    #[test]
    fn test_tap_same_square_deselects() {
        let board = own_turn();
        let mut input = InputMachine::new();
        input.tap(sq("e2"), &board);
        input.tap(sq("e2"), &board);
        assert_eq!(input.state(), &InputState::Idle);
    }

    #[test]
    fn test_tap_other_own_piece_reselects() {
        let board = own_turn();
        let mut input = InputMachine::new();
        input.tap(sq("e2"), &board);
        input.tap(sq("g1"), &board);
        assert_eq!(input.selection().unwrap().origin, sq("g1"));
        // own piece without moves clears the selection
        input.tap(sq("a1"), &board);
        assert_eq!(input.state(), &InputState::Idle);
    }

    #[test]
    fn test_tap_elsewhere_clears() {
        let board = own_turn();
        let mut input = InputMachine::new();
        input.tap(sq("e2"), &board);
        assert_eq!(input.tap(sq("d5"), &board), InputAction::None);
        assert_eq!(input.state(), &InputState::Idle);
    }

    #[test]
    fn test_piece_without_moves_stays_idle() {
        let board = own_turn();
        let mut input = InputMachine::new();
        input.tap(sq("a1"), &board);
        assert_eq!(input.state(), &InputState::Idle);
    }

    #[test]
    fn test_premove_arm_and_queue() {
        let board = FakeBoard {
            human_turn: false,
            ..own_turn()
        };
        let mut input = InputMachine::new();
        input.tap(sq("e2"), &board);
        match input.state() {
            InputState::PremoveArmed(sel) => {
                assert_eq!(sel.destinations.len(), 63);
                assert!(!sel.destinations.contains(&sq("e2")));
            }
            other => panic!("expected armed premove, got {other:?}"),
        }
        let action = input.tap(sq("e5"), &board);
        assert_eq!(
            action,
            InputAction::PremoveQueued(Premove {
                from: sq("e2"),
                to: sq("e5")
            })
        );
        assert_eq!(input.state(), &InputState::Idle);
        assert!(input.premove().is_some());
    }

    #[test]
    fn test_premove_same_square_cancels() {
        let board = FakeBoard {
            human_turn: false,
            ..own_turn()
        };
        let mut input = InputMachine::new();
        input.drop_piece(sq("g1"), sq("f3"), false);
        // arming a new premove clears the queued one
        assert_eq!(input.tap(sq("e2"), &board), InputAction::PremoveCleared);
        assert_eq!(input.tap(sq("e2"), &board), InputAction::None);
        assert_eq!(input.state(), &InputState::Idle);
        assert!(input.premove().is_none());
    }

    #[test]
    fn test_opponent_square_without_arm_is_noop() {
        let board = FakeBoard {
            human_turn: false,
            ..own_turn()
        };
        let mut input = InputMachine::new();
        input.drop_piece(sq("g1"), sq("f3"), false);
        assert_eq!(input.tap(sq("e7"), &board), InputAction::None);
        assert!(input.premove().is_some());
    }

    #[test]
    fn test_selection_clears_premove() {
        let board = own_turn();
        let mut input = InputMachine::new();
        input.drop_piece(sq("g1"), sq("f3"), false);
        assert_eq!(input.tap(sq("e2"), &board), InputAction::PremoveCleared);
        assert!(input.premove().is_none());
    }

    #[test]
    fn test_drop_on_own_turn_attempts() {
        let mut input = InputMachine::new();
        assert_eq!(
            input.drop_piece(sq("e2"), sq("e4"), true),
            InputAction::Attempt(Move::new(sq("e2"), sq("e4")))
        );
        assert!(input.premove().is_none());
    }
}

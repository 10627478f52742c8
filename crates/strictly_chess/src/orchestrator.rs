//! Match orchestration between the human and the engine.
//!
//! [`MatchOrchestrator`] is the only component that replaces the stored
//! position. It performs no I/O: timers and engine traffic are requested by
//! queuing [`Command`]s, which the runtime drains with
//! [`MatchOrchestrator::take_commands`] and answers by calling back in with
//! the session id the command carried.

use crate::classifier::EventClassifier;
use crate::clock::{Clock, TickOutcome};
use crate::engine::{EngineGateway, EngineMessage, EngineResponse, SearchRequest};
use crate::error::{MatchError, MoveError};
use crate::events::{EventSender, MatchEvent, MatchSnapshot};
use crate::input::{
    BoardGeometry, BoardView, InputAction, InputMachine, InputState, PointerSample,
    PointerTracker, Premove, Selection, PREMOVE_SETTLE_DELAY,
};
use crate::overlay::{compute_overlay, OverlayInputs};
use crate::rules::{AppliedMove, RulesOracle};
use crate::session::{MatchConfig, MatchSession, MatchStatus, SessionId};
use crate::store::PositionStore;
use crate::types::{Move, MoveRecord, Outcome, PieceKind, Side, Square};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Display name used when none is configured.
pub const DEFAULT_OPPONENT_NAME: &str = "Aria";

/// Status line shown before the first match.
pub const IDLE_STATUS: &str = "Select Time & Start";

const THREEFOLD: u32 = 3;

/// Side effect requested by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send a search to the engine.
    RequestSearch(SearchRequest),
    /// Tell the engine to abandon its current search.
    StopSearch,
    /// Call [`MatchOrchestrator::premove_due`] after `delay`.
    SchedulePremove {
        /// Session the premove belongs to.
        session: SessionId,
        /// Settle delay.
        delay: Duration,
    },
    /// Drop any scheduled premove callback.
    CancelPremove,
    /// Restart the one-second tick phase and call
    /// [`MatchOrchestrator::tick`] with `session` on every period.
    StartClock {
        /// Session the ticks belong to.
        session: SessionId,
    },
    /// Stop delivering ticks.
    StopClock,
}

/// Read-only board seen from the human's seat.
struct SeatView<'a, R: RulesOracle> {
    rules: &'a R,
    position: &'a R::Position,
    human_side: Side,
}

impl<R: RulesOracle> BoardView for SeatView<'_, R> {
    fn is_human_turn(&self) -> bool {
        self.rules.side_to_move(self.position) == self.human_side
    }

    fn is_own_piece(&self, square: Square) -> bool {
        self.rules
            .piece_at(self.position, square)
            .is_some_and(|p| p.side == self.human_side)
    }

    fn legal_destinations(&self, square: Square) -> BTreeSet<Square> {
        self.rules
            .legal_moves(self.position, square)
            .into_iter()
            .map(|m| m.to)
            .collect()
    }
}

/// Composes position store, clock, input machine, engine gateway and
/// classifier into one match.
pub struct MatchOrchestrator<R: RulesOracle> {
    rules: R,
    store: PositionStore<R::Position>,
    clock: Clock,
    input: InputMachine,
    pointer: PointerTracker,
    gateway: EngineGateway,
    classifier: EventClassifier,
    session: MatchSession,
    side_rng: StdRng,
    opponent_name: String,
    status_text: String,
    premove_scheduled: bool,
    events: EventSender,
    commands: Vec<Command>,
}

impl<R: RulesOracle> std::fmt::Debug for MatchOrchestrator<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchOrchestrator")
            .field("session", &self.session)
            .field("status_text", &self.status_text)
            .field("half_moves", &self.store.half_moves())
            .field("clock", &self.clock)
            .field("input", &self.input)
            .field("gateway", &self.gateway)
            .finish_non_exhaustive()
    }
}

impl<R: RulesOracle> MatchOrchestrator<R> {
    /// Creates an orchestrator with no match running.
    pub fn new(rules: R, events: EventSender) -> Self {
        let store = PositionStore::new(rules.initial());
        Self {
            rules,
            store,
            clock: Clock::new(*MatchConfig::default().time_control_seconds(), Side::White),
            input: InputMachine::new(),
            pointer: PointerTracker::default(),
            gateway: EngineGateway::new(),
            classifier: EventClassifier::default(),
            session: MatchSession::default(),
            side_rng: StdRng::from_os_rng(),
            opponent_name: DEFAULT_OPPONENT_NAME.to_string(),
            status_text: IDLE_STATUS.to_string(),
            premove_scheduled: false,
            events,
            commands: Vec::new(),
        }
    }

    /// Sets the engine's display name.
    pub fn with_opponent_name(mut self, name: impl Into<String>) -> Self {
        self.opponent_name = name.into();
        self
    }

    /// Makes side coin flips and classifier draws reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.side_rng = StdRng::seed_from_u64(seed);
        self.classifier = EventClassifier::seeded(seed.wrapping_add(1));
        self
    }

    // ─────────────────────────────────────────────────────────────
    //  Accessors
    // ─────────────────────────────────────────────────────────────

    /// Rules oracle.
    pub fn rules(&self) -> &R {
        &self.rules
    }

    /// Current position.
    pub fn position(&self) -> &R::Position {
        self.store.position()
    }

    /// Current position as FEN.
    pub fn fen(&self) -> String {
        self.rules.fen(self.store.position())
    }

    /// Accepted moves, oldest first.
    pub fn history(&self) -> &[MoveRecord] {
        self.store.history()
    }

    /// Current session.
    pub fn session(&self) -> &MatchSession {
        &self.session
    }

    /// Current session id.
    pub fn session_id(&self) -> SessionId {
        self.session.id()
    }

    /// Lifecycle status.
    pub fn status(&self) -> MatchStatus {
        self.session.status()
    }

    /// Status line.
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// Match clock.
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Selection state.
    pub fn input_state(&self) -> &InputState {
        self.input.state()
    }

    /// Armed selection.
    pub fn selection(&self) -> Option<&Selection> {
        self.input.selection()
    }

    /// Queued premove.
    pub fn premove(&self) -> Option<Premove> {
        self.input.premove()
    }

    /// Side the human plays.
    pub fn human_side(&self) -> Side {
        self.session.human_side()
    }

    /// Engine display name.
    pub fn opponent_name(&self) -> &str {
        &self.opponent_name
    }

    /// Whether the engine finished its handshake.
    pub fn engine_ready(&self) -> bool {
        self.gateway.is_ready()
    }

    /// Session with a search in flight.
    pub fn outstanding_search(&self) -> Option<SessionId> {
        self.gateway.outstanding()
    }

    /// Whether a match is running and the human holds the turn.
    pub fn is_human_turn(&self) -> bool {
        self.session.is_in_progress() && self.side_to_move() == self.human_side()
    }

    /// Drains queued side effects, oldest first.
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    fn side_to_move(&self) -> Side {
        self.rules.side_to_move(self.store.position())
    }

    fn seat_view(&self) -> SeatView<'_, R> {
        SeatView {
            rules: &self.rules,
            position: self.store.position(),
            human_side: self.human_side(),
        }
    }

    // ─────────────────────────────────────────────────────────────
    //  Lifecycle
    // ─────────────────────────────────────────────────────────────

    /// Starts a new match, superseding any previous session.
    pub fn start(&mut self, config: MatchConfig) -> Result<SessionId, MatchError> {
        let initial = self.rules.initial();
        self.start_from(config, initial)
    }

    /// Starts a new match from an arbitrary position.
    #[instrument(skip(self, position))]
    pub fn start_from(
        &mut self,
        config: MatchConfig,
        position: R::Position,
    ) -> Result<SessionId, MatchError> {
        if !self.gateway.is_ready() {
            warn!("Start requested before engine is ready");
            return Err(MatchError::EngineNotReady);
        }
        if self.gateway.abandon() {
            self.commands.push(Command::StopSearch);
        }
        self.cancel_scheduled_premove();
        self.input.reset();

        let human_side = config.resolve_side(&mut self.side_rng);
        self.store.reset(position);
        let key = self.rules.repetition_key(self.store.position());
        self.store.record_occurrence(key);
        let session = self.session.begin(config, human_side);
        let first = self.side_to_move();
        self.clock
            .start(*config.time_control_seconds(), human_side, first);
        self.commands.push(Command::StartClock { session });
        info!(%session, %human_side, seconds = *config.time_control_seconds(), "Match started");

        self.refresh_status();
        if first != human_side {
            self.request_search();
        }
        Ok(session)
    }

    /// Human resigns the running match.
    #[instrument(skip(self))]
    pub fn resign(&mut self) -> Result<(), MatchError> {
        if !self.session.is_in_progress() {
            return Err(MatchError::NotInProgress);
        }
        info!("Human resigned");
        let winner = self.human_side().opponent();
        self.finish(Outcome::Resignation { winner });
        Ok(())
    }

    fn finish(&mut self, outcome: Outcome) {
        self.session.finish(outcome);
        self.clock.stop();
        self.commands.push(Command::StopClock);
        self.cancel_scheduled_premove();
        self.input.reset();
        if self.gateway.abandon() {
            self.commands.push(Command::StopSearch);
        }
        let message = self.terminal_text(outcome);
        self.status_text = message.clone();
        let half_moves = self.store.half_moves();
        self.emit(MatchEvent::StatusChanged {
            status: message.clone(),
            half_moves,
            terminal_message: Some(message),
        });
        self.emit(MatchEvent::GameOver {
            outcome,
            half_moves,
        });
    }

    fn terminal_text(&self, outcome: Outcome) -> String {
        let human_won = outcome.winner() == Some(self.human_side());
        let opponent = &self.opponent_name;
        match (outcome, human_won) {
            (Outcome::Checkmate { .. }, true) => "Game over! You win by checkmate!".to_string(),
            (Outcome::Checkmate { .. }, false) => {
                format!("Game over! {opponent} wins by checkmate!")
            }
            (Outcome::Draw, _) => "Game over! Draw.".to_string(),
            (Outcome::Resignation { .. }, false) => {
                format!("Game over! You resigned. {opponent} wins!")
            }
            (Outcome::Resignation { .. }, true) => {
                format!("Game over! {opponent} resigned. You win!")
            }
            (Outcome::Timeout { .. }, true) => "Game over! You win on time!".to_string(),
            (Outcome::Timeout { .. }, false) => format!("Game over! {opponent} wins on time!"),
        }
    }

    fn refresh_status(&mut self) {
        self.status_text = if self.is_human_turn() {
            "Your turn.".to_string()
        } else {
            format!("{} is thinking...", self.opponent_name)
        };
        self.emit(MatchEvent::StatusChanged {
            status: self.status_text.clone(),
            half_moves: self.store.half_moves(),
            terminal_message: None,
        });
    }

    fn emit(&self, event: MatchEvent) {
        if self.events.send(event).is_err() {
            debug!("Event receiver dropped");
        }
    }

    // ─────────────────────────────────────────────────────────────
    //  Clock
    // ─────────────────────────────────────────────────────────────

    /// One clock period elapsed for `session`.
    #[instrument(skip(self))]
    pub fn tick(&mut self, session: SessionId) -> TickOutcome {
        if !self.session.accepts(session) {
            debug!("Tick for inactive session ignored");
            return TickOutcome::Idle;
        }
        let outcome = self.clock.tick();
        if let TickOutcome::Expired { loser } = outcome {
            self.finish(Outcome::Timeout {
                winner: loser.opponent(),
            });
        }
        outcome
    }

    // ─────────────────────────────────────────────────────────────
    //  Human input
    // ─────────────────────────────────────────────────────────────

    /// Pointer pressed on the board.
    pub fn pointer_down(&mut self, sample: PointerSample) {
        self.pointer.press(sample);
    }

    /// Pointer released; taps are mapped to a square and handled.
    #[instrument(skip(self, geometry))]
    pub fn pointer_up(&mut self, sample: PointerSample, geometry: &BoardGeometry) {
        let Some(release) = self.pointer.release(sample) else {
            debug!("Pointer release is not a tap");
            return;
        };
        match geometry.square_at(release.x, release.y, self.human_side()) {
            Some(square) => self.tap(square),
            None => debug!("Tap outside the board"),
        }
    }

    /// Tap on `square`.
    #[instrument(skip(self))]
    pub fn tap(&mut self, square: Square) {
        if !self.session.is_in_progress() {
            debug!("Tap ignored, match not in progress");
            return;
        }
        let view = SeatView {
            rules: &self.rules,
            position: self.store.position(),
            human_side: self.session.human_side(),
        };
        let action = self.input.tap(square, &view);
        self.handle_input_action(action);
    }

    /// Drag released from `from` onto `to`. Returns whether it was accepted.
    #[instrument(skip(self))]
    pub fn drop_piece(&mut self, from: Square, to: Square) -> bool {
        if !self.session.is_in_progress() {
            debug!("Drop ignored, match not in progress");
            self.input.clear_selection();
            return false;
        }
        let human_turn = self.is_human_turn();
        let action = self.input.drop_piece(from, to, human_turn);
        self.handle_input_action(action)
    }

    fn handle_input_action(&mut self, action: InputAction) -> bool {
        match action {
            InputAction::None => true,
            InputAction::Attempt(mv) => self.attempt_human_move(mv).is_ok(),
            InputAction::PremoveQueued(premove) => {
                debug!(from = %premove.from, to = %premove.to, "Premove queued");
                true
            }
            InputAction::PremoveCleared => {
                self.cancel_scheduled_premove();
                true
            }
        }
    }

    /// Attempts a move for the human.
    #[instrument(skip(self), fields(mv = %mv))]
    pub fn attempt_human_move(&mut self, mv: Move) -> Result<(), MoveError> {
        if !self.session.is_in_progress() {
            return Err(MoveError::NotInProgress);
        }
        if !self.is_human_turn() {
            return Err(MoveError::NotYourTurn);
        }
        let mv = self.with_auto_queen(mv);
        match self.rules.apply_move(self.store.position(), &mv) {
            Ok(applied) => {
                self.accept(applied);
                Ok(())
            }
            Err(e) => {
                debug!(error = %e, "Human move rejected");
                Err(e)
            }
        }
    }

    fn with_auto_queen(&self, mv: Move) -> Move {
        let human = self.human_side();
        let is_own_pawn = self
            .rules
            .piece_at(self.store.position(), mv.from)
            .is_some_and(|p| p.side == human && p.kind == PieceKind::Pawn);
        if mv.promotion.is_none() && is_own_pawn && mv.to.rank() == human.promotion_rank() {
            mv.with_promotion(PieceKind::Queen)
        } else {
            mv
        }
    }

    // ─────────────────────────────────────────────────────────────
    //  Premove
    // ─────────────────────────────────────────────────────────────

    /// The premove settle delay for `session` elapsed.
    #[instrument(skip(self))]
    pub fn premove_due(&mut self, session: SessionId) {
        self.premove_scheduled = false;
        if !self.session.accepts(session) {
            debug!("Stale premove callback discarded");
            return;
        }
        if !self.is_human_turn() {
            return;
        }
        let Some(premove) = self.input.take_premove() else {
            debug!("Premove was cleared before it fired");
            return;
        };
        let mv = self.with_auto_queen(premove.as_move());
        match self.rules.apply_move(self.store.position(), &mv) {
            Ok(applied) => {
                info!(mv = %mv, "Premove executed");
                self.accept(applied);
            }
            Err(e) => debug!(error = %e, "Premove illegal, discarded"),
        }
    }

    fn cancel_scheduled_premove(&mut self) {
        if self.premove_scheduled {
            self.premove_scheduled = false;
            self.commands.push(Command::CancelPremove);
        }
    }

    // ─────────────────────────────────────────────────────────────
    //  Engine
    // ─────────────────────────────────────────────────────────────

    /// Handles a decoded engine message.
    #[instrument(skip(self, response), fields(session = %response.session))]
    pub fn on_engine_response(&mut self, response: EngineResponse) {
        let EngineResponse { session, message } = response;
        if message == EngineMessage::Ready {
            self.gateway.mark_ready();
            return;
        }
        self.gateway.complete(session);
        if !self.session.accepts(session) {
            debug!(current = %self.session.id(), "Stale engine response discarded");
            return;
        }
        if self.is_human_turn() {
            warn!("Engine answered on the human's turn, discarded");
            return;
        }
        match message {
            EngineMessage::BestMove(mv) => {
                match self.rules.apply_move(self.store.position(), &mv) {
                    Ok(applied) => {
                        debug!(mv = %mv, "Engine move applied");
                        self.accept(applied);
                    }
                    Err(e) => warn!(error = %e, "Engine move rejected; turn stays with engine"),
                }
            }
            EngineMessage::NoMove => warn!("Engine reported no move"),
            EngineMessage::Malformed(line) => warn!(%line, "Malformed engine reply"),
            EngineMessage::Ready => {}
        }
    }

    /// Records the engine handshake acknowledgement.
    pub fn mark_engine_ready(&mut self) {
        self.gateway.mark_ready();
    }

    fn request_search(&mut self) {
        let session = self.session.id();
        let fen = self.fen();
        if let Some(request) = self.gateway.request(session, fen) {
            debug!(fen = %request.fen, "Requesting engine search");
            self.commands.push(Command::RequestSearch(request));
        }
    }

    // ─────────────────────────────────────────────────────────────
    //  Move acceptance
    // ─────────────────────────────────────────────────────────────

    fn accept(&mut self, applied: AppliedMove<R::Position>) {
        self.input.clear_selection();
        if applied.mover == self.human_side() {
            // a manual move supersedes whatever was queued
            self.input.take_premove();
            self.cancel_scheduled_premove();
        }
        let record = self.store.commit(applied).clone();
        let to_move = self.side_to_move();
        self.clock.switch_to(to_move);

        if let Some(outcome) = self.adjudicate() {
            self.status_text = self.terminal_text(outcome);
            self.classify(&record);
            self.finish(outcome);
            return;
        }

        self.refresh_status();
        self.classify(&record);

        if to_move == self.human_side() {
            if self.input.premove().is_some() {
                self.premove_scheduled = true;
                self.commands.push(Command::SchedulePremove {
                    session: self.session.id(),
                    delay: PREMOVE_SETTLE_DELAY,
                });
            }
        } else {
            self.request_search();
        }
    }

    /// Oracle outcome, or a draw once the position has occurred three times.
    fn adjudicate(&mut self) -> Option<Outcome> {
        let position = self.store.position();
        let outcome = self.rules.outcome(position);
        let key = self.rules.repetition_key(position);
        let occurrences = self.store.record_occurrence(key);
        if outcome.is_none() && occurrences >= THREEFOLD {
            info!(occurrences, "Threefold repetition");
            return Some(Outcome::Draw);
        }
        outcome
    }

    fn classify(&mut self, record: &MoveRecord) {
        let human_side = self.human_side();
        if let Some(event) = self
            .classifier
            .classify(record, human_side, &self.status_text)
        {
            self.emit(MatchEvent::NotableMove(event));
        }
    }

    // ─────────────────────────────────────────────────────────────
    //  Snapshot
    // ─────────────────────────────────────────────────────────────

    /// Point-in-time view for rendering.
    pub fn snapshot(&self) -> MatchSnapshot {
        let position = self.store.position();
        let orientation = self.human_side();
        let human_turn = self.is_human_turn();
        let highlights = compute_overlay(
            &self.rules,
            OverlayInputs {
                position,
                last_move: self.store.last_move(),
                input: self.input.state(),
                premove: self.input.premove(),
                human_turn,
                orientation,
            },
        );
        MatchSnapshot {
            session: self.session.id(),
            status: self.session.status(),
            status_text: self.status_text.clone(),
            fen: self.rules.fen(position),
            pieces: Square::all()
                .filter_map(|sq| self.rules.piece_at(position, sq).map(|p| (sq, p)))
                .collect(),
            orientation,
            side_to_move: self.rules.side_to_move(position),
            human_turn,
            player_clock: self.clock.player_display(),
            opponent_clock: self.clock.opponent_display(),
            input: self.input.state().clone(),
            premove: self.input.premove(),
            highlights,
            san_history: self.store.history().iter().map(|r| r.san.clone()).collect(),
            engine_thinking: self.gateway.outstanding() == Some(self.session.id())
                && self.session.is_in_progress(),
            engine_ready: self.gateway.is_ready(),
        }
    }

    /// Legal destinations for a human piece on `square`.
    pub fn legal_destinations(&self, square: Square) -> BTreeSet<Square> {
        self.seat_view().legal_destinations(square)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::event_channel;
    use crate::rules::StandardRules;
    use crate::types::SideChoice;

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    fn ready() -> MatchOrchestrator<StandardRules> {
        let (tx, _rx) = event_channel();
        let mut orch = MatchOrchestrator::new(StandardRules::new(), tx).with_seed(3);
        orch.mark_engine_ready();
        orch
    }

    #[test]
    fn test_start_requires_ready_engine() {
        let (tx, _rx) = event_channel();
        let mut orch = MatchOrchestrator::new(StandardRules::new(), tx);
        assert_eq!(orch.status_text(), IDLE_STATUS);
        assert_eq!(
            orch.start(MatchConfig::default()),
            Err(MatchError::EngineNotReady)
        );
        assert_eq!(orch.status(), MatchStatus::NotStarted);
    }

    #[test]
    fn test_black_side_asks_engine_first() {
        let mut orch = ready();
        let session = orch
            .start(MatchConfig::new(60, SideChoice::Black))
            .unwrap();
        let commands = orch.take_commands();
        assert_eq!(commands[0], Command::StartClock { session });
        assert!(matches!(&commands[1], Command::RequestSearch(req) if req.session == session));
        assert_eq!(orch.status_text(), "Aria is thinking...");
    }

    #[test]
    fn test_auto_queen_promotion() {
        let mut orch = ready();
        let pos = orch
            .rules()
            .position_from_fen("8/4P3/8/8/8/8/k7/4K3 w - - 0 1")
            .unwrap();
        orch.start_from(MatchConfig::new(60, SideChoice::White), pos)
            .unwrap();
        assert!(orch.drop_piece(sq("e7"), sq("e8")));
        assert_eq!(orch.history()[0].san, "e8=Q");
        let piece = orch.rules().piece_at(orch.position(), sq("e8")).unwrap();
        assert_eq!(piece.kind, PieceKind::Queen);
    }

    #[test]
    fn test_tap_outside_match_is_ignored() {
        let mut orch = ready();
        orch.tap(sq("e2"));
        assert_eq!(orch.input_state(), &InputState::Idle);
        assert!(!orch.drop_piece(sq("e2"), sq("e4")));
    }

    #[test]
    fn test_resign_outside_match_errors() {
        let mut orch = ready();
        assert_eq!(orch.resign(), Err(MatchError::NotInProgress));
    }
}

//! The control task: owns the orchestrator and turns its commands into
//! timers and engine traffic.

use crate::search_engine::{ResponseReceiver, SearchEngine};
use std::time::Duration;
use strictly_chess::{
    BoardGeometry, Command, MatchConfig, MatchOrchestrator, MatchSnapshot, Move, PointerSample,
    SessionId, Square, StandardRules, TICK_PERIOD,
};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

/// Front-end input delivered to the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum UserInput {
    /// Start a new match.
    Start(MatchConfig),
    /// Tap on a square.
    Tap(Square),
    /// Drag released from one square onto another.
    Drop {
        /// Origin square.
        from: Square,
        /// Target square.
        to: Square,
    },
    /// Explicit move, including an underpromotion suffix.
    Move(Move),
    /// Pointer pressed.
    PointerDown(PointerSample),
    /// Pointer released over a board at `geometry`.
    PointerUp {
        /// Release sample.
        sample: PointerSample,
        /// Board placement at release time.
        geometry: BoardGeometry,
    },
    /// Resign the running match.
    Resign,
    /// Shut down.
    Quit,
}

/// Sending half for front-end input.
pub type InputSender = mpsc::UnboundedSender<UserInput>;

/// Drives one orchestrator against one engine.
pub struct MatchDriver<E: SearchEngine> {
    orchestrator: MatchOrchestrator<StandardRules>,
    engine: E,
    responses: ResponseReceiver,
    snapshots: watch::Sender<MatchSnapshot>,
}

impl<E: SearchEngine> MatchDriver<E> {
    /// Creates a driver and the snapshot feed it publishes to.
    pub fn new(
        orchestrator: MatchOrchestrator<StandardRules>,
        engine: E,
        responses: ResponseReceiver,
    ) -> (Self, watch::Receiver<MatchSnapshot>) {
        let (snapshots, snapshot_rx) = watch::channel(orchestrator.snapshot());
        (
            Self {
                orchestrator,
                engine,
                responses,
                snapshots,
            },
            snapshot_rx,
        )
    }

    /// Runs until `Quit` arrives or the input channel closes.
    #[instrument(skip_all, fields(engine = %self.engine.name()))]
    pub async fn run(mut self, mut inputs: mpsc::UnboundedReceiver<UserInput>) -> anyhow::Result<()> {
        info!("Starting match driver");
        self.engine.initialize().await?;

        let mut ticker = interval(TICK_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut clock_session: Option<SessionId> = None;

        let premove_timer = sleep(Duration::ZERO);
        tokio::pin!(premove_timer);
        let mut premove_session: Option<SessionId> = None;

        loop {
            tokio::select! {
                input = inputs.recv() => match input {
                    None | Some(UserInput::Quit) => {
                        info!("Driver shutting down");
                        break;
                    }
                    Some(input) => self.handle_input(input),
                },
                Some(response) = self.responses.recv() => {
                    self.orchestrator.on_engine_response(response);
                }
                _ = ticker.tick(), if clock_session.is_some() => {
                    if let Some(session) = clock_session {
                        self.orchestrator.tick(session);
                    }
                }
                _ = &mut premove_timer, if premove_session.is_some() => {
                    if let Some(session) = premove_session.take() {
                        self.orchestrator.premove_due(session);
                    }
                }
            }

            for command in self.orchestrator.take_commands() {
                match command {
                    Command::StartClock { session } => {
                        ticker.reset();
                        clock_session = Some(session);
                    }
                    Command::StopClock => clock_session = None,
                    Command::SchedulePremove { session, delay } => {
                        premove_timer.as_mut().reset(Instant::now() + delay);
                        premove_session = Some(session);
                    }
                    Command::CancelPremove => premove_session = None,
                    Command::RequestSearch(request) => {
                        if let Err(e) = self.engine.submit(&request).await {
                            warn!(error = %e, "Search request failed; turn stays pending");
                        }
                    }
                    Command::StopSearch => {
                        if let Err(e) = self.engine.stop().await {
                            warn!(error = %e, "Failed to stop search");
                        }
                    }
                }
            }
            self.snapshots.send_replace(self.orchestrator.snapshot());
        }
        Ok(())
    }

    fn handle_input(&mut self, input: UserInput) {
        debug!(?input, "User input");
        match input {
            UserInput::Start(config) => {
                if let Err(e) = self.orchestrator.start(config) {
                    warn!(error = %e, "Cannot start match");
                }
            }
            UserInput::Tap(square) => self.orchestrator.tap(square),
            UserInput::Drop { from, to } => {
                self.orchestrator.drop_piece(from, to);
            }
            UserInput::Move(mv) => {
                if let Err(e) = self.orchestrator.attempt_human_move(mv) {
                    warn!(error = %e, "Move rejected");
                }
            }
            UserInput::PointerDown(sample) => self.orchestrator.pointer_down(sample),
            UserInput::PointerUp { sample, geometry } => {
                self.orchestrator.pointer_up(sample, &geometry)
            }
            UserInput::Resign => {
                if let Err(e) = self.orchestrator.resign() {
                    warn!(error = %e, "Cannot resign");
                }
            }
            UserInput::Quit => {}
        }
    }
}

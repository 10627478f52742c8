//! Driver tests against a scripted engine with paused time.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strictly_chess::{
    EngineError, EngineMessage, EngineResponse, EventReceiver, MatchConfig, MatchOrchestrator,
    MatchSnapshot, MatchStatus, Outcome, SearchRequest, SessionId, Side, SideChoice, Square,
    StandardRules, event_channel,
};
use strictly_chess_arena::{InputSender, MatchDriver, ResponseSender, SearchEngine, UserInput};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
struct EngineLog {
    requests: Vec<SearchRequest>,
    stops: usize,
}

/// Replies with pre-recorded moves after a fixed delay, like a UCI engine
/// that still answers after `stop`.
struct ScriptedEngine {
    script: VecDeque<&'static str>,
    delay: Duration,
    responses: ResponseSender,
    log: Arc<Mutex<EngineLog>>,
}

#[async_trait::async_trait]
impl SearchEngine for ScriptedEngine {
    async fn initialize(&mut self) -> Result<(), EngineError> {
        self.responses
            .send(EngineResponse {
                session: SessionId::default(),
                message: EngineMessage::Ready,
            })
            .map_err(|_| EngineError::new("closed"))
    }

    async fn submit(&mut self, request: &SearchRequest) -> Result<(), EngineError> {
        self.log.lock().unwrap().requests.push(request.clone());
        let message = match self.script.pop_front() {
            Some(uci) => EngineMessage::BestMove(uci.parse().unwrap()),
            None => EngineMessage::NoMove,
        };
        let responses = self.responses.clone();
        let session = request.session;
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = responses.send(EngineResponse { session, message });
        });
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), EngineError> {
        self.log.lock().unwrap().stops += 1;
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct Harness {
    inputs: InputSender,
    snapshots: watch::Receiver<MatchSnapshot>,
    log: Arc<Mutex<EngineLog>>,
    task: JoinHandle<anyhow::Result<()>>,
    _events: EventReceiver,
}

impl Harness {
    async fn new(script: &[&'static str], delay: Duration) -> Self {
        let (event_tx, events) = event_channel();
        let orchestrator = MatchOrchestrator::new(StandardRules::new(), event_tx).with_seed(9);
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        let log = Arc::new(Mutex::new(EngineLog::default()));
        let engine = ScriptedEngine {
            script: script.iter().copied().collect(),
            delay,
            responses: response_tx,
            log: log.clone(),
        };
        let (driver, snapshots) = MatchDriver::new(orchestrator, engine, response_rx);
        let (inputs, input_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(driver.run(input_rx));
        let mut harness = Self {
            inputs,
            snapshots,
            log,
            task,
            _events: events,
        };
        harness.wait_until(|s| s.engine_ready).await;
        harness
    }

    fn send(&self, input: UserInput) {
        self.inputs.send(input).unwrap();
    }

    fn tap(&self, square: &str) {
        self.send(UserInput::Tap(square.parse::<Square>().unwrap()));
    }

    async fn wait_until(&mut self, predicate: impl FnMut(&MatchSnapshot) -> bool) -> MatchSnapshot {
        tokio::time::timeout(Duration::from_secs(60), self.snapshots.wait_for(predicate))
            .await
            .expect("condition never reached")
            .expect("driver stopped")
            .clone()
    }

    async fn settle(&mut self, duration: Duration) -> MatchSnapshot {
        tokio::time::sleep(duration).await;
        self.snapshots.borrow().clone()
    }

    async fn shutdown(self) {
        self.send(UserInput::Quit);
        self.task.await.unwrap().unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn test_engine_reply_flows_through_driver() {
    let mut h = Harness::new(&["e7e5"], Duration::from_millis(200)).await;
    h.send(UserInput::Start(MatchConfig::new(60, SideChoice::White)));
    h.tap("e2");
    h.tap("e4");

    let snapshot = h.wait_until(|s| s.san_history.len() == 2).await;
    assert_eq!(snapshot.san_history, vec!["e4", "e5"]);
    assert!(snapshot.human_turn);
    assert_eq!(snapshot.status_text, "Your turn.");

    let requests = h.log.lock().unwrap().requests.clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].fen,
        "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"
    );
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_clock_flags_idle_human() {
    let mut h = Harness::new(&[], Duration::from_millis(200)).await;
    let started = tokio::time::Instant::now();
    h.send(UserInput::Start(MatchConfig::new(2, SideChoice::White)));

    let snapshot = h
        .wait_until(|s| matches!(s.status, MatchStatus::Over(_)))
        .await;
    assert_eq!(
        snapshot.status,
        MatchStatus::Over(Outcome::Timeout {
            winner: Side::Black
        })
    );
    assert_eq!(snapshot.status_text, "Game over! Aria wins on time!");
    assert_eq!(snapshot.player_clock, "0:00");
    assert_eq!(snapshot.opponent_clock, "0:02");
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(2), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "{elapsed:?}");
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_premove_fires_after_engine_reply() {
    let mut h = Harness::new(&["e7e5", "b8c6"], Duration::from_millis(300)).await;
    h.send(UserInput::Start(MatchConfig::new(60, SideChoice::White)));
    h.tap("e2");
    h.tap("e4");
    h.tap("g1");
    h.tap("f3");

    let queued = h.wait_until(|s| s.premove.is_some()).await;
    assert_eq!(queued.san_history.len(), 1);

    let snapshot = h.wait_until(|s| s.san_history.len() >= 3).await;
    assert_eq!(snapshot.san_history[..3], ["e4", "e5", "Nf3"]);
    assert!(snapshot.premove.is_none());
    assert_eq!(h.log.lock().unwrap().requests.len(), 2);
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_resignation_discards_late_reply() {
    let mut h = Harness::new(&["e7e5"], Duration::from_millis(500)).await;
    h.send(UserInput::Start(MatchConfig::new(60, SideChoice::White)));
    h.send(UserInput::Drop {
        from: "e2".parse().unwrap(),
        to: "e4".parse().unwrap(),
    });
    h.wait_until(|s| s.engine_thinking).await;
    h.send(UserInput::Resign);

    let over = h
        .wait_until(|s| matches!(s.status, MatchStatus::Over(_)))
        .await;
    assert_eq!(over.status_text, "Game over! You resigned. Aria wins!");

    let later = h.settle(Duration::from_secs(2)).await;
    assert_eq!(later.san_history, vec!["e4"]);
    assert_eq!(later.player_clock, over.player_clock);
    assert_eq!(h.log.lock().unwrap().stops, 1);
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_restart_discards_stale_search() {
    let mut h = Harness::new(&["e2e4"], Duration::from_millis(500)).await;
    h.send(UserInput::Start(MatchConfig::new(60, SideChoice::Black)));
    h.wait_until(|s| s.engine_thinking).await;
    let first = h.snapshots.borrow().session;

    h.send(UserInput::Start(MatchConfig::new(60, SideChoice::White)));
    let restarted = h.wait_until(|s| s.session != first).await;
    assert!(restarted.human_turn);

    let later = h.settle(Duration::from_secs(2)).await;
    assert!(later.san_history.is_empty());
    assert!(later.human_turn);
    assert_eq!(h.log.lock().unwrap().stops, 1);
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_explicit_move_input_reaches_board() {
    let mut h = Harness::new(&["a7a6"], Duration::from_millis(200)).await;
    h.send(UserInput::Start(MatchConfig::new(60, SideChoice::White)));
    h.send(UserInput::Move("e2e4".parse().unwrap()));
    let snapshot = h.wait_until(|s| s.san_history.len() == 2).await;
    assert_eq!(snapshot.san_history, vec!["e4", "a6"]);
    h.shutdown().await;
}

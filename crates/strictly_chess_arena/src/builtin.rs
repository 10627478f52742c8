//! In-process engine that plays a random legal move.
//!
//! Used when no UCI binary is installed, and by tests.

use crate::search_engine::{ResponseSender, SearchEngine};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use std::time::Duration;
use strictly_chess::{
    EngineError, EngineMessage, EngineResponse, Move, RulesOracle, SearchRequest, SessionId,
    Square, StandardRules,
};
use tokio::task::JoinHandle;
use tracing::{debug, instrument};

/// Engine that answers each search with a uniformly random legal move.
pub struct SimpleEngine {
    name: String,
    think_time: Duration,
    rng: StdRng,
    responses: ResponseSender,
    search: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for SimpleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleEngine")
            .field("name", &self.name)
            .field("think_time", &self.think_time)
            .finish_non_exhaustive()
    }
}

impl SimpleEngine {
    /// Creates the engine; replies are sent on `responses`.
    pub fn new(name: impl Into<String>, responses: ResponseSender) -> Self {
        Self {
            name: name.into(),
            think_time: Duration::from_millis(500),
            rng: StdRng::from_os_rng(),
            responses,
            search: None,
        }
    }

    /// Overrides the simulated think time.
    pub fn with_think_time(mut self, think_time: Duration) -> Self {
        self.think_time = think_time;
        self
    }

    /// Makes move choice reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }
}

/// Picks a random legal move for the side to move in `fen`.
pub fn choose_move(fen: &str, rng: &mut StdRng) -> EngineMessage {
    let rules = StandardRules::new();
    let Ok(position) = rules.position_from_fen(fen) else {
        return EngineMessage::Malformed(fen.to_string());
    };
    let moves: Vec<Move> = Square::all()
        .flat_map(|sq| rules.legal_moves(&position, sq))
        .collect();
    match moves.choose(rng) {
        Some(mv) => EngineMessage::BestMove(*mv),
        None => EngineMessage::NoMove,
    }
}

#[async_trait::async_trait]
impl SearchEngine for SimpleEngine {
    async fn initialize(&mut self) -> Result<(), EngineError> {
        self.responses
            .send(EngineResponse {
                session: SessionId::default(),
                message: EngineMessage::Ready,
            })
            .map_err(|_| EngineError::new("Response receiver dropped"))
    }

    #[instrument(skip(self, request), fields(ai = %self.name, session = %request.session))]
    async fn submit(&mut self, request: &SearchRequest) -> Result<(), EngineError> {
        let message = choose_move(&request.fen, &mut self.rng);
        debug!(?message, "AI chose move");
        let session = request.session;
        let delay = self.think_time.min(Duration::from_millis(request.budget_ms));
        let responses = self.responses.clone();
        self.search = Some(tokio::spawn(async move {
            // simulated thinking
            tokio::time::sleep(delay).await;
            let _ = responses.send(EngineResponse { session, message });
        }));
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), EngineError> {
        if let Some(search) = self.search.take() {
            search.abort();
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

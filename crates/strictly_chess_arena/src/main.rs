//! Strictly Chess - terminal front end
//!
//! Plays timed matches against a UCI engine, or the built-in random mover.

#![warn(missing_docs)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use std::path::Path;
use strictly_chess::{event_channel, MatchOrchestrator, StandardRules};
use strictly_chess_arena::{
    init_file_tracing, print_events, run_console, ArenaConfig, ConfigOverrides, MatchDriver,
    SearchEngine, SimpleEngine, UciEngine,
};
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let overrides = cli.command.overrides();

    match cli.command {
        Command::Play { config, .. } => run_play(&config, overrides).await,
    }
}

/// Loads configuration and plays matches until the user quits.
#[instrument(skip_all, fields(config_path = %config_path.display()))]
async fn run_play(config_path: &Path, overrides: ConfigOverrides) -> Result<()> {
    let (config, source) = ArenaConfig::load_or_default(config_path)?;
    let config = config.with_overrides(overrides);
    init_file_tracing(config.log_file())
        .with_context(|| format!("Failed to create log file {}", config.log_file().display()))?;
    info!(%source, engine = %config.engine(), time_control = %config.time_control(), "Config loaded");
    info!(?config, "Starting Strictly Chess");

    let (event_tx, event_rx) = event_channel();
    let mut orchestrator =
        MatchOrchestrator::new(StandardRules::new(), event_tx).with_opponent_name(config.opponent_name());
    if let Some(seed) = config.seed() {
        orchestrator = orchestrator.with_seed(*seed);
    }

    let (response_tx, response_rx) = mpsc::unbounded_channel();
    if config.uses_builtin_engine() {
        let mut engine = SimpleEngine::new(config.opponent_name(), response_tx);
        if let Some(seed) = config.seed() {
            engine = engine.with_seed(*seed);
        }
        play(config, orchestrator, engine, response_rx, event_rx).await
    } else {
        let engine = UciEngine::spawn(&config.engine_command(), response_tx)
            .context("Failed to start engine; try --engine builtin")?;
        play(config, orchestrator, engine, response_rx, event_rx).await
    }
}

/// Runs the driver, event printer and console together.
async fn play<E: SearchEngine + 'static>(
    config: ArenaConfig,
    orchestrator: MatchOrchestrator<StandardRules>,
    engine: E,
    responses: strictly_chess_arena::ResponseReceiver,
    events: strictly_chess::EventReceiver,
) -> Result<()> {
    let (driver, snapshots) = MatchDriver::new(orchestrator, engine, responses);
    let (input_tx, input_rx) = mpsc::unbounded_channel();

    let driver_task = tokio::spawn(driver.run(input_rx));
    let printer = tokio::spawn(print_events(
        events,
        config.opponent_name().clone(),
        *config.json_events(),
    ));

    let console = run_console(
        BufReader::new(tokio::io::stdin()),
        input_tx.clone(),
        snapshots,
        config.match_config(),
    );
    tokio::select! {
        result = console => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            let _ = input_tx.send(strictly_chess_arena::UserInput::Quit);
        }
    }

    match driver_task.await {
        Ok(result) => result?,
        Err(e) => warn!(error = %e, "Driver task failed"),
    }
    printer.abort();
    info!("Goodbye");
    Ok(())
}

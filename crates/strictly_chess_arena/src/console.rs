//! Plain-text front end: command parsing and board rendering.

use crate::config::TimeSetting;
use crate::driver::{InputSender, UserInput};
use derive_more::Display;
use std::fmt::Write as _;
use std::str::FromStr;
use strictly_chess::{
    square_from_coords, HighlightKind, MatchConfig, MatchEvent, MatchSnapshot, Move, SideChoice,
    Square,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, instrument};

/// Help text for the console.
pub const HELP: &str = "\
Commands:
  start [bullet|blitz|rapid|classic|SECONDS] [white|black|random]
  tap <square>          select a piece or a destination (e.g. tap e2)
  drop <from> <to>      drag a piece (e.g. drop e2 e4)
  move <uci>            same as drop (e.g. move e2e4); a suffix picks the
                        promotion piece (e.g. move a7a8n)
  resign                give up the current match
  board                 show the board
  help                  show this text
  quit                  leave";

/// A parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    /// Forward to the driver.
    Input(UserInput),
    /// Print the board.
    Board,
    /// Print help.
    Help,
    /// Leave.
    Quit,
}

/// Why a console line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum CommandError {
    /// Unrecognized command word.
    #[display("Unknown command {:?}; type help", _0)]
    Unknown(String),

    /// A required argument was missing.
    #[display("Missing {}", _0)]
    MissingArgument(&'static str),

    /// An argument could not be read.
    #[display("Cannot read {:?}", _0)]
    BadArgument(String),
}

impl std::error::Error for CommandError {}

fn square_arg<'a>(
    words: &mut impl Iterator<Item = &'a str>,
    name: &'static str,
) -> Result<Square, CommandError> {
    let word = words.next().ok_or(CommandError::MissingArgument(name))?;
    word.parse()
        .map_err(|_| CommandError::BadArgument(word.to_string()))
}

/// Parses one console line; `defaults` fills in omitted start options.
#[instrument]
pub fn parse_command(line: &str, defaults: &MatchConfig) -> Result<ConsoleCommand, CommandError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(ConsoleCommand::Help);
    };
    let command = match head.to_ascii_lowercase().as_str() {
        "start" | "new" => {
            let mut seconds = *defaults.time_control_seconds();
            let mut side = *defaults.side();
            for word in words {
                if let Ok(choice) = SideChoice::from_str(word) {
                    side = choice;
                } else {
                    seconds = TimeSetting::from_str(word)
                        .map_err(|_| CommandError::BadArgument(word.to_string()))?
                        .seconds();
                }
            }
            ConsoleCommand::Input(UserInput::Start(MatchConfig::new(seconds, side)))
        }
        "tap" | "t" => ConsoleCommand::Input(UserInput::Tap(square_arg(&mut words, "square")?)),
        "drop" | "d" => {
            let from = square_arg(&mut words, "origin square")?;
            let to = square_arg(&mut words, "target square")?;
            ConsoleCommand::Input(UserInput::Drop { from, to })
        }
        "move" | "m" => {
            let word = words.next().ok_or(CommandError::MissingArgument("move"))?;
            let mv: Move = word
                .parse()
                .map_err(|_| CommandError::BadArgument(word.to_string()))?;
            match mv.promotion {
                Some(_) => ConsoleCommand::Input(UserInput::Move(mv)),
                None => ConsoleCommand::Input(UserInput::Drop {
                    from: mv.from,
                    to: mv.to,
                }),
            }
        }
        "resign" => ConsoleCommand::Input(UserInput::Resign),
        "board" | "b" => ConsoleCommand::Board,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(command)
}

/// Draws the board from the human's side with highlight markers.
///
/// `[x]` marks the selection, `*` legal targets, `x` captures,
/// `+`/`#` check and mate, `~` premove squares and `'` the last move.
pub fn render_board(snapshot: &MatchSnapshot) -> String {
    let mut out = String::new();
    let files: Vec<char> = (0..8)
        .filter_map(|col| square_from_coords(col, 0, snapshot.orientation))
        .map(|sq| (b'a' + sq.file()) as char)
        .collect();

    for row in 0..8u8 {
        let rank_label = square_from_coords(0, row, snapshot.orientation)
            .map(|sq| sq.rank() + 1)
            .unwrap_or_default();
        let _ = write!(out, "{rank_label} ");
        for col in 0..8u8 {
            let Some(square) = square_from_coords(col, row, snapshot.orientation) else {
                continue;
            };
            let piece = snapshot
                .piece_at(square)
                .map(|p| p.to_char())
                .unwrap_or('.');
            let marker = snapshot
                .highlights
                .iter()
                .filter(|h| h.square == square)
                .map(|h| h.kind)
                .max_by_key(|kind| marker_priority(*kind))
                .map(marker_char)
                .unwrap_or(' ');
            if marker == '[' {
                let _ = write!(out, "[{piece}]");
            } else {
                let _ = write!(out, " {piece}{marker}");
            }
        }
        out.push('\n');
    }
    out.push_str("  ");
    for file in files {
        let _ = write!(out, " {file} ");
    }
    out.push('\n');
    let _ = writeln!(
        out,
        "You {}  |  Opponent {}  |  {}",
        snapshot.player_clock, snapshot.opponent_clock, snapshot.status_text
    );
    if !snapshot.san_history.is_empty() {
        let moves: Vec<String> = snapshot
            .san_history
            .chunks(2)
            .enumerate()
            .map(|(i, pair)| format!("{}. {}", i + 1, pair.join(" ")))
            .collect();
        let _ = writeln!(out, "{}", moves.join(" "));
    }
    out
}

fn marker_priority(kind: HighlightKind) -> u8 {
    match kind {
        HighlightKind::LastMove => 0,
        HighlightKind::Premove => 1,
        HighlightKind::LegalTarget => 2,
        HighlightKind::CaptureTarget => 3,
        HighlightKind::Check => 4,
        HighlightKind::Checkmate => 5,
        HighlightKind::Selected => 6,
    }
}

fn marker_char(kind: HighlightKind) -> char {
    match kind {
        HighlightKind::LastMove => '\'',
        HighlightKind::Premove => '~',
        HighlightKind::LegalTarget => '*',
        HighlightKind::CaptureTarget => 'x',
        HighlightKind::Check => '+',
        HighlightKind::Checkmate => '#',
        HighlightKind::Selected => '[',
    }
}

/// Renders a match event as a console line.
pub fn describe_event(event: &MatchEvent, opponent_name: &str) -> String {
    match event {
        MatchEvent::StatusChanged { status, .. } => status.clone(),
        MatchEvent::NotableMove(notable) => {
            format!("> {}", notable.commentary_context(opponent_name))
        }
        MatchEvent::GameOver { outcome, half_moves } => {
            format!("Result: {outcome} after {half_moves} half-moves")
        }
    }
}

/// Prints match events until the stream ends.
pub async fn print_events(
    mut events: mpsc::UnboundedReceiver<MatchEvent>,
    opponent_name: String,
    json: bool,
) {
    while let Some(event) = events.recv().await {
        if json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => debug!(error = %e, "Failed to encode event"),
            }
        } else {
            println!("{}", describe_event(&event, &opponent_name));
        }
    }
}

/// Reads commands from `reader` and forwards them to the driver.
#[instrument(skip_all)]
pub async fn run_console<R>(
    reader: R,
    inputs: InputSender,
    snapshots: watch::Receiver<MatchSnapshot>,
    defaults: MatchConfig,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    println!("{HELP}");
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        match parse_command(&line, &defaults) {
            Ok(ConsoleCommand::Input(UserInput::Start(config))) => {
                if !snapshots.borrow().engine_ready {
                    println!("Loading engine... try again in a moment.");
                    continue;
                }
                inputs.send(UserInput::Start(config))?;
            }
            Ok(ConsoleCommand::Input(input)) => inputs.send(input)?,
            Ok(ConsoleCommand::Board) => print!("{}", render_board(&snapshots.borrow())),
            Ok(ConsoleCommand::Help) => println!("{HELP}"),
            Ok(ConsoleCommand::Quit) => break,
            Err(e) => println!("{e}"),
        }
    }
    let _ = inputs.send(UserInput::Quit);
    Ok(())
}

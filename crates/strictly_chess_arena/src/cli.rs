//! Command-line interface for strictly_chess.

use strictly_chess_arena::{ConfigOverrides, TimeSetting, DEFAULT_CONFIG_FILE};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use strictly_chess::SideChoice;

/// Strictly Chess - timed matches against a UCI engine
#[derive(Parser, Debug)]
#[command(name = "strictly_chess")]
#[command(about = "Play timed chess against a UCI engine", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play a match in the terminal
    Play {
        /// Path to the TOML config file
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Engine command line, or "builtin" for the random mover
        #[arg(short, long)]
        engine: Option<String>,

        /// Time control: bullet, blitz, rapid, classic or seconds
        #[arg(short, long)]
        time_control: Option<TimeSetting>,

        /// Side to play: white, black or random
        #[arg(short, long)]
        side: Option<SideChoice>,

        /// Display name of the engine
        #[arg(long)]
        opponent: Option<String>,

        /// Where to write logs
        #[arg(long)]
        log_file: Option<PathBuf>,

        /// Print match events as JSON lines
        #[arg(long)]
        json_events: bool,
    },
}

impl Command {
    /// Command-line values that override the config file.
    pub fn overrides(&self) -> ConfigOverrides {
        match self {
            Command::Play {
                engine,
                time_control,
                side,
                opponent,
                log_file,
                json_events,
                ..
            } => ConfigOverrides {
                engine: engine.clone(),
                time_control: *time_control,
                side: *side,
                opponent_name: opponent.clone(),
                log_file: log_file.clone(),
                json_events: *json_events,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strictly_chess::TimeControl;

    #[test]
    fn test_play_flags() {
        let cli = Cli::try_parse_from([
            "strictly_chess",
            "play",
            "--engine",
            "builtin",
            "--time-control",
            "blitz",
            "--side",
            "random",
            "--json-events",
        ])
        .unwrap();
        let overrides = cli.command.overrides();
        assert_eq!(overrides.engine.as_deref(), Some("builtin"));
        assert_eq!(
            overrides.time_control,
            Some(TimeSetting::Preset(TimeControl::Blitz))
        );
        assert_eq!(overrides.side, Some(SideChoice::Random));
        assert!(overrides.json_events);
        let Command::Play { config, .. } = cli.command;
        assert_eq!(config, PathBuf::from("strictly_chess.toml"));
    }

    #[test]
    fn test_custom_seconds_flag() {
        let cli = Cli::try_parse_from(["strictly_chess", "play", "-t", "45"]).unwrap();
        assert_eq!(cli.command.overrides().time_control, Some(TimeSetting::Seconds(45)));
    }

    #[test]
    fn test_bad_side_rejected() {
        assert!(Cli::try_parse_from(["strictly_chess", "play", "--side", "green"]).is_err());
    }
}
